// src/scheduler.rs
// Owns the agent registry, the global outbox, the wake set and the main
// loop; drives the Clock and the Router between activations.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::agent::{Agent, AgentContext, AgentResult, Lifecycle, NewAlarm, SubOp};
use crate::alarm::{AlarmHeap, AlarmId};
use crate::clock::{Clock, ClockMode};
use crate::error::KernelError;
use crate::message::{AgentId, Message, Receiver};
use crate::router::{RouteOutcome, Router};
use crate::telemetry::{EventListener, KernelEvent, Telemetry};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const CLOCK_SPEED_TOPIC: &str = "__clock_speed_change__";

struct AgentSlot {
    id: AgentId,
    agent: Box<dyn Agent>,
    inbox: VecDeque<Message>,
    keep_awake: bool,
    lifecycle: Lifecycle,
}

/// Construction parameters for a [`Scheduler`], mirroring the
/// plain-struct-with-`Default`-impl configuration style used elsewhere
/// in this codebase (`MarketMakerConfig`, `VaraConfig`).
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub mode: ClockMode,
    pub initial_time: f64,
    pub speed: Option<f64>,
    /// Re-raise `AgentFault` from `run`/`add`/`remove` instead of
    /// retiring the offending agent and continuing.
    pub strict: bool,
    /// Turn an unknown-receiver routing warning into a hard error
    /// instead of logging at debug and dropping the message.
    pub strict_routing: bool,
    /// `0` (default) activates every hot agent in-process, in
    /// registration order. A positive value fans distinct agents of the
    /// same cycle out across a rayon thread pool (requires the
    /// `parallel` feature; otherwise it is accepted but inert).
    pub number_of_multiprocessors: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: ClockMode::Real,
            initial_time: 0.0,
            speed: Some(1.0),
            strict: false,
            strict_routing: false,
            number_of_multiprocessors: 0,
        }
    }
}

/// Bounds for one [`Scheduler::run`] call. Exactly one termination
/// condition fires first.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub seconds: Option<f64>,
    pub iterations: Option<usize>,
    pub pause_if_idle: bool,
    /// `Some(speed)` adopts a new clock speed for the duration of this
    /// run; `None` leaves whatever speed is already set.
    pub clock_speed: Option<Option<f64>>,
}

pub struct Scheduler {
    config: SchedulerConfig,
    clock: Clock,
    router: Router,
    alarms: AlarmHeap,
    alarm_ids: AtomicU64,
    outbox: Vec<Message>,
    slots: Vec<AgentSlot>,
    index: HashMap<AgentId, usize>,
    telemetry: Telemetry,
    cycle: u64,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let clock = Clock::new(config.mode, config.initial_time, config.speed);
        Self {
            router: Router::new(config.strict_routing),
            clock,
            alarms: AlarmHeap::new(),
            alarm_ids: AtomicU64::new(0),
            outbox: Vec::new(),
            slots: Vec::new(),
            index: HashMap::new(),
            telemetry: Telemetry::new(),
            cycle: 0,
            config,
        }
    }

    fn system_agent_id() -> AgentId {
        AgentId::from_uuid(Uuid::nil())
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Read-only view of every registered identity, live or retired.
    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.slots.iter().map(|s| s.id)
    }

    pub fn lifecycle_of(&self, id: AgentId) -> Option<Lifecycle> {
        self.index.get(&id).map(|&idx| self.slots[idx].lifecycle)
    }

    pub fn subscribe_telemetry(&mut self, listener: Box<dyn EventListener>) {
        self.telemetry.subscribe(listener);
    }

    /// Model a mid-run speed change as a timed control event: when it
    /// fires, the clock re-anchors `(start_wall, start_virtual)` to that
    /// moment and adopts `new_speed`.
    pub fn set_new_clock_speed_as_timed_event(&mut self, at: f64, new_speed: Option<f64>) -> AlarmId {
        let id = AlarmId(self.alarm_ids.fetch_add(1, Ordering::Relaxed));
        let msg = Message::new(None, Receiver::Agent(Self::system_agent_id()), CLOCK_SPEED_TOPIC, new_speed)
            .expect("control message is always well-formed");
        self.alarms.insert(id, Self::system_agent_id(), at, msg, None);
        id
    }

    pub fn cancel_alarm(&mut self, id: AlarmId) -> bool {
        self.alarms.cancel(id)
    }

    pub fn list_alarms(&self, owner: Option<AgentId>) -> Vec<f64> {
        self.alarms.list(owner).into_iter().map(|(t, _)| t).collect()
    }

    /// Validate, assign an identity if needed, run `setup`, auto-
    /// subscribe `{uuid, class_tag}` and register the agent.
    pub fn add(&mut self, agent: Box<dyn Agent>) -> Result<AgentId, KernelError> {
        let id = agent.preferred_uuid().unwrap_or_default();
        if self.index.contains_key(&id) {
            return Err(KernelError::DuplicateAgent(id));
        }
        let class_tag = agent.class_tag().to_string();
        self.router.subscribe(id, id.to_string());
        self.router.subscribe(id, class_tag);

        let idx = self.slots.len();
        self.slots.push(AgentSlot {
            id,
            agent,
            inbox: VecDeque::new(),
            keep_awake: false,
            lifecycle: Lifecycle::SetupPending,
        });
        self.index.insert(id, idx);

        self.run_hook(idx, "setup", |agent, ctx| agent.setup(ctx))?;
        if self.slots[idx].lifecycle == Lifecycle::SetupPending {
            self.slots[idx].lifecycle = Lifecycle::Live;
        }
        Ok(id)
    }

    /// Run `teardown`, drop all subscriptions, discard pending alarms,
    /// and delete the registry entry.
    pub fn remove(&mut self, id: AgentId) -> Result<(), KernelError> {
        let idx = *self.index.get(&id).ok_or_else(|| KernelError::Registration {
            uuid: id,
            reason: "agent not registered".into(),
        })?;
        if self.slots[idx].lifecycle != Lifecycle::Retired {
            self.slots[idx].lifecycle = Lifecycle::TeardownPending;
            self.run_hook(idx, "teardown", |agent, ctx| agent.teardown(ctx))?;
        }
        self.router.unsubscribe_all(id);
        self.alarms.retain_not_owned_by(id);
        self.slots.remove(idx);
        self.index.remove(&id);
        for (i, slot) in self.slots.iter().enumerate().skip(idx) {
            self.index.insert(slot.id, i);
        }
        Ok(())
    }

    /// Tear down every live agent in reverse registration order, then
    /// discard the registry.
    pub fn stop(&mut self) {
        let live_indices: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.lifecycle == Lifecycle::Live)
            .map(|(i, _)| i)
            .rev()
            .collect();

        for idx in live_indices {
            let id = self.slots[idx].id;
            let now = self.clock.now();
            let (result, effects) = {
                let slot = &mut self.slots[idx];
                let mut ctx = AgentContext::new(id, &mut slot.inbox, now, &mut slot.keep_awake, &self.alarms, &self.alarm_ids);
                let result = slot.agent.teardown(&mut ctx);
                (result, ctx.into_effects())
            };
            self.merge_effects(id, effects);
            if let Err(e) = result {
                tracing::error!(agent = %id, error = %e, "teardown failed during stop");
            }
            self.slots[idx].lifecycle = Lifecycle::Retired;
        }

        self.router = Router::new(self.router.strict());
        self.slots.clear();
        self.index.clear();
        self.outbox.clear();
        self.alarms = AlarmHeap::new();
    }

    /// Loop cycles until the first of `iterations`, `seconds` elapsed
    /// (virtual time), or idle-with-`pause_if_idle` fires. With neither
    /// bound set, idle still ends the run — otherwise a scheduler with
    /// nothing left to do would spin forever.
    pub fn run(&mut self, opts: RunOptions) -> Result<(), KernelError> {
        if let Some(speed) = opts.clock_speed {
            self.clock.set_speed(speed);
        }
        let start_time = self.clock.now();
        let mut iterations_done = 0usize;
        let force_pause_on_idle = opts.pause_if_idle || (opts.seconds.is_none() && opts.iterations.is_none());

        loop {
            if let Some(iters) = opts.iterations {
                if iterations_done >= iters {
                    break;
                }
            }
            if let Some(secs) = opts.seconds {
                if self.clock.now() - start_time >= secs {
                    break;
                }
            }

            let idle = self.cycle_once()?;
            iterations_done += 1;
            self.cycle += 1;

            if force_pause_on_idle && idle {
                break;
            }
        }
        Ok(())
    }

    /// One full scheduler cycle: clock advance, alarm firing, outbox
    /// flush, activation pass, idle detection. Returns whether the
    /// cycle was idle.
    fn cycle_once(&mut self) -> Result<bool, KernelError> {
        // Step 1: clock advance, based on state carried over from the
        // previous cycle.
        let outbox_empty = self.outbox.is_empty();
        let wake_set_empty = !self.any_live_hot();
        let next_alarm = self.alarms.peek_fire_time();
        self.clock.advance(outbox_empty, wake_set_empty, next_alarm);
        let now = self.clock.now();

        // Step 2: fire alarms due at or before `now`.
        let fired = self.alarms.pop_fireable(now);
        for alarm in fired {
            if alarm.owner == Self::system_agent_id() {
                if let Some(speed) = alarm.payload.payload().as_any().downcast_ref::<Option<f64>>() {
                    self.clock.set_speed(*speed);
                }
                continue;
            }
            if let Some(predicate) = &alarm.ignore_predicate {
                if predicate() {
                    continue;
                }
            }
            self.telemetry.emit(KernelEvent::AlarmFired {
                cycle: self.cycle,
                time: now,
                owner: alarm.owner,
            });
            self.deliver_resolved(vec![alarm.owner], alarm.payload)?;
        }

        // Step 3: outbox flush through the router.
        let outbox = std::mem::take(&mut self.outbox);
        let known: HashSet<AgentId> = self
            .slots
            .iter()
            .filter(|s| s.lifecycle == Lifecycle::Live)
            .map(|s| s.id)
            .collect();
        for msg in outbox {
            match self.router.route(&msg, &known) {
                RouteOutcome::Delivered(recipients) => {
                    let count = recipients.len();
                    let topic = msg.topic.clone();
                    let from = msg.sender;
                    self.deliver_resolved(recipients, msg)?;
                    self.telemetry.emit(KernelEvent::Routed {
                        cycle: self.cycle,
                        time: now,
                        topic,
                        from,
                        recipients: count,
                    });
                }
                RouteOutcome::Unknown => {
                    tracing::debug!(cycle = self.cycle, time = now, topic = %msg.topic, "unknown receiver, message dropped");
                    self.telemetry.emit(KernelEvent::RoutingDropped {
                        cycle: self.cycle,
                        time: now,
                        topic: msg.topic.clone(),
                    });
                    if self.router.strict() {
                        return Err(KernelError::MessageContract(format!(
                            "unknown receiver for topic '{}'",
                            msg.topic
                        )));
                    }
                }
            }
        }

        // Step 4: activation pass over the union of newly/still-hot
        // agents and keep_awake agents, in registration order.
        let hot: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.lifecycle == Lifecycle::Live && (s.keep_awake || !s.inbox.is_empty()))
            .map(|(i, _)| i)
            .collect();
        self.activate_hot(&hot)?;

        // Step 5: idle detection.
        let idle = self.outbox.is_empty() && !self.any_live_hot() && self.alarms.peek_fire_time().map_or(true, |t| t > self.clock.now());
        if idle {
            self.telemetry.emit(KernelEvent::Idle {
                cycle: self.cycle,
                time: self.clock.now(),
            });
        }
        Ok(idle)
    }

    fn any_live_hot(&self) -> bool {
        self.slots
            .iter()
            .any(|s| s.lifecycle == Lifecycle::Live && (s.keep_awake || !s.inbox.is_empty()))
    }

    /// Deliver a resolved message to `recipients`: the first live
    /// recipient gets `original`, every subsequent one gets an
    /// independent `copy()`.
    fn deliver_resolved(&mut self, recipients: Vec<AgentId>, original: Message) -> Result<(), KernelError> {
        let live: Vec<usize> = recipients
            .into_iter()
            .filter_map(|id| self.index.get(&id).copied())
            .filter(|&idx| self.slots[idx].lifecycle == Lifecycle::Live)
            .collect();

        let mut iter = live.into_iter();
        let Some(first_idx) = iter.next() else {
            return Ok(());
        };
        for idx in iter {
            let copy = original.copy()?;
            self.slots[idx].inbox.push_back(copy);
        }
        self.slots[first_idx].inbox.push_back(original);
        Ok(())
    }

    fn activate_hot(&mut self, hot: &[usize]) -> Result<(), KernelError> {
        #[cfg(feature = "parallel")]
        {
            if self.config.number_of_multiprocessors > 0 && hot.len() > 1 {
                return self.activate_parallel(hot);
            }
        }
        self.activate_sequential(hot)
    }

    fn activate_sequential(&mut self, hot: &[usize]) -> Result<(), KernelError> {
        for &idx in hot {
            self.run_hook(idx, "update", |agent, ctx| agent.update(ctx))?;
        }
        Ok(())
    }

    #[cfg(feature = "parallel")]
    fn activate_parallel(&mut self, hot: &[usize]) -> Result<(), KernelError> {
        let now = self.clock.now();
        let alarms = &self.alarms;
        let alarm_ids = &self.alarm_ids;

        let mut remaining: Vec<Option<&mut AgentSlot>> = self.slots.iter_mut().map(Some).collect();
        let hot_slots: Vec<&mut AgentSlot> = hot
            .iter()
            .map(|&idx| remaining[idx].take().expect("each hot index appears once"))
            .collect();

        type Outcome = (AgentId, AgentResult, (Vec<Message>, Vec<SubOp>, Vec<NewAlarm>, Vec<AlarmId>));
        let outcomes: Vec<Outcome> = hot_slots
            .into_par_iter()
            .map(|slot| {
                let id = slot.id;
                let mut ctx = AgentContext::new(id, &mut slot.inbox, now, &mut slot.keep_awake, alarms, alarm_ids);
                let result = slot.agent.update(&mut ctx);
                (id, result, ctx.into_effects())
            })
            .collect();

        drop(remaining);

        for (idx, (id, result, effects)) in hot.iter().copied().zip(outcomes) {
            self.merge_effects(id, effects);
            if let Err(source) = result {
                self.handle_fault(idx, "update", source)?;
            }
        }
        Ok(())
    }

    fn run_hook(
        &mut self,
        idx: usize,
        hook: &'static str,
        f: impl FnOnce(&mut dyn Agent, &mut AgentContext) -> AgentResult,
    ) -> Result<(), KernelError> {
        let id = self.slots[idx].id;
        let now = self.clock.now();
        let (result, effects) = {
            let slot = &mut self.slots[idx];
            let mut ctx = AgentContext::new(id, &mut slot.inbox, now, &mut slot.keep_awake, &self.alarms, &self.alarm_ids);
            let result = f(slot.agent.as_mut(), &mut ctx);
            (result, ctx.into_effects())
        };
        self.merge_effects(id, effects);
        match result {
            Ok(()) => Ok(()),
            Err(source) => self.handle_fault(idx, hook, source),
        }
    }

    fn merge_effects(&mut self, owner: AgentId, effects: (Vec<Message>, Vec<SubOp>, Vec<NewAlarm>, Vec<AlarmId>)) {
        let (outgoing, sub_ops, new_alarms, alarm_cancellations) = effects;
        self.outbox.extend(outgoing);
        for op in sub_ops {
            match op {
                SubOp::Subscribe(t) => self.router.subscribe(owner, t),
                SubOp::Unsubscribe(t) => self.router.unsubscribe(owner, &t),
            }
        }
        for na in new_alarms {
            self.alarms.insert(na.id, owner, na.fire_time, na.payload, na.ignore_predicate);
        }
        for cid in alarm_cancellations {
            self.alarms.cancel(cid);
        }
    }

    fn handle_fault(
        &mut self,
        idx: usize,
        hook: &'static str,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    ) -> Result<(), KernelError> {
        let id = self.slots[idx].id;
        let now = self.clock.now();
        if self.config.strict {
            return Err(KernelError::AgentFault { uuid: id, hook, source });
        }
        tracing::error!(cycle = self.cycle, time = now, agent = %id, hook, error = %source, "agent fault");
        self.telemetry.emit(KernelEvent::AgentFaulted {
            cycle: self.cycle,
            time: now,
            uuid: id,
            hook,
        });
        self.retire(idx, hook != "teardown");
        Ok(())
    }

    fn retire(&mut self, idx: usize, attempt_teardown: bool) {
        let id = self.slots[idx].id;
        if attempt_teardown {
            let now = self.clock.now();
            let (result, effects) = {
                let slot = &mut self.slots[idx];
                let mut ctx = AgentContext::new(id, &mut slot.inbox, now, &mut slot.keep_awake, &self.alarms, &self.alarm_ids);
                let result = slot.agent.teardown(&mut ctx);
                (result, ctx.into_effects())
            };
            self.merge_effects(id, effects);
            if let Err(e) = result {
                tracing::error!(agent = %id, error = %e, "teardown failed while retiring agent");
            }
        }
        self.router.unsubscribe_all(id);
        self.alarms.retain_not_owned_by(id);
        self.slots[idx].lifecycle = Lifecycle::Retired;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::message::Receiver;

    /// Shared with the test after `run()` returns, since a registered
    /// agent is boxed into the scheduler with no read-back accessor —
    /// this is how each §8 scenario below observes actual delivery
    /// instead of only checking that `run` returned `Ok`.
    type Log<T> = Arc<Mutex<Vec<T>>>;

    struct Echo {
        peer: AgentId,
        id: AgentId,
        received: Log<u32>,
    }

    impl Echo {
        fn new(id: AgentId, peer: AgentId, received: Log<u32>) -> Self {
            Self { id, peer, received }
        }
    }

    impl Agent for Echo {
        fn class_tag(&self) -> &str {
            "echo"
        }

        fn preferred_uuid(&self) -> Option<AgentId> {
            Some(self.id)
        }

        fn update(&mut self, ctx: &mut AgentContext) -> AgentResult {
            while let Some(msg) = ctx.receive() {
                let n = *msg.payload().as_any().downcast_ref::<u32>().unwrap();
                self.received.lock().unwrap().push(n);
                if n < 3 {
                    ctx.send(Receiver::Agent(self.peer), "ping", n + 1)?;
                }
            }
            Ok(())
        }
    }

    struct Kicker {
        target: AgentId,
    }

    impl Agent for Kicker {
        fn class_tag(&self) -> &str {
            "kicker"
        }

        fn setup(&mut self, ctx: &mut AgentContext) -> AgentResult {
            ctx.send(Receiver::Agent(self.target), "ping", 0u32)?;
            Ok(())
        }
    }

    #[test]
    fn ping_pong_bounces_between_two_agents() {
        let mut scheduler = Scheduler::new(SchedulerConfig {
            mode: ClockMode::Simulated,
            strict: true,
            ..Default::default()
        });
        let a_id = AgentId::new();
        let b_id = AgentId::new();
        let a_received: Log<u32> = Arc::new(Mutex::new(Vec::new()));
        let b_received: Log<u32> = Arc::new(Mutex::new(Vec::new()));
        scheduler.add(Box::new(Echo::new(a_id, b_id, a_received.clone()))).unwrap();
        scheduler.add(Box::new(Echo::new(b_id, a_id, b_received.clone()))).unwrap();
        scheduler.add(Box::new(Kicker { target: a_id })).unwrap();

        scheduler
            .run(RunOptions {
                iterations: Some(10),
                ..Default::default()
            })
            .unwrap();

        // Kicker -> A:0 -> B:1 -> A:2 -> B:3, then B stops (3 is not < 3).
        // One cycle of delay per hop, so A receives the even bounces and
        // B the odd ones; no alarms were set, so virtual time is static.
        assert_eq!(*a_received.lock().unwrap(), vec![0, 2]);
        assert_eq!(*b_received.lock().unwrap(), vec![1, 3]);
        assert_eq!(scheduler.now(), 0.0);
    }

    struct BroadcastSource;
    impl Agent for BroadcastSource {
        fn class_tag(&self) -> &str {
            "source"
        }
        fn setup(&mut self, ctx: &mut AgentContext) -> AgentResult {
            ctx.send(Receiver::Broadcast, "tick", 7u32)?;
            Ok(())
        }
    }

    struct BroadcastSink {
        seen: Log<u32>,
    }
    impl BroadcastSink {
        fn new(seen: Log<u32>) -> Self {
            Self { seen }
        }
    }
    impl Agent for BroadcastSink {
        fn class_tag(&self) -> &str {
            "sink"
        }
        fn setup(&mut self, ctx: &mut AgentContext) -> AgentResult {
            ctx.subscribe("tick");
            Ok(())
        }
        fn update(&mut self, ctx: &mut AgentContext) -> AgentResult {
            while let Some(msg) = ctx.receive() {
                self.seen.lock().unwrap().push(*msg.payload().as_any().downcast_ref::<u32>().unwrap());
            }
            Ok(())
        }
    }

    #[test]
    fn broadcast_fans_out_to_every_subscriber() {
        let mut scheduler = Scheduler::new(SchedulerConfig {
            mode: ClockMode::Simulated,
            strict: true,
            ..Default::default()
        });
        let seen_a: Log<u32> = Arc::new(Mutex::new(Vec::new()));
        let seen_b: Log<u32> = Arc::new(Mutex::new(Vec::new()));
        scheduler.add(Box::new(BroadcastSink::new(seen_a.clone()))).unwrap();
        scheduler.add(Box::new(BroadcastSink::new(seen_b.clone()))).unwrap();
        scheduler.add(Box::new(BroadcastSource)).unwrap();

        scheduler
            .run(RunOptions {
                iterations: Some(4),
                ..Default::default()
            })
            .unwrap();

        // Each of the 2 subscribers sees exactly the one broadcast tick,
        // one as the routed original and one as an independent copy().
        assert_eq!(*seen_a.lock().unwrap(), vec![7]);
        assert_eq!(*seen_b.lock().unwrap(), vec![7]);
    }

    struct AlarmOnce {
        fired: Log<f64>,
    }
    impl Agent for AlarmOnce {
        fn class_tag(&self) -> &str {
            "alarm-once"
        }
        fn setup(&mut self, ctx: &mut AgentContext) -> AgentResult {
            ctx.set_alarm(500.0, (), true, None)?;
            Ok(())
        }
        fn update(&mut self, ctx: &mut AgentContext) -> AgentResult {
            while ctx.receive().is_some() {
                self.fired.lock().unwrap().push(ctx.now());
            }
            Ok(())
        }
    }

    #[test]
    fn simulated_time_jumps_straight_to_the_alarm() {
        let mut scheduler = Scheduler::new(SchedulerConfig {
            mode: ClockMode::Simulated,
            strict: true,
            ..Default::default()
        });
        let fired: Log<f64> = Arc::new(Mutex::new(Vec::new()));
        scheduler.add(Box::new(AlarmOnce { fired: fired.clone() })).unwrap();
        scheduler
            .run(RunOptions {
                iterations: Some(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(scheduler.now(), 500.0);
        // The agent actually received the alarm payload, at the jumped time.
        assert_eq!(*fired.lock().unwrap(), vec![500.0]);
    }

    struct ClassWorker {
        got: Log<u32>,
    }
    impl ClassWorker {
        fn new(got: Log<u32>) -> Self {
            Self { got }
        }
    }
    impl Agent for ClassWorker {
        fn class_tag(&self) -> &str {
            "class-worker"
        }
        fn update(&mut self, ctx: &mut AgentContext) -> AgentResult {
            while let Some(msg) = ctx.receive() {
                self.got.lock().unwrap().push(*msg.payload().as_any().downcast_ref::<u32>().unwrap());
            }
            Ok(())
        }
    }
    struct ClassSender;
    impl Agent for ClassSender {
        fn class_tag(&self) -> &str {
            "class-sender"
        }
        fn setup(&mut self, ctx: &mut AgentContext) -> AgentResult {
            ctx.send(Receiver::Class("class-worker".into()), "job", 9u32)?;
            Ok(())
        }
    }

    #[test]
    fn class_tag_multicast_reaches_every_member() {
        let mut scheduler = Scheduler::new(SchedulerConfig {
            mode: ClockMode::Simulated,
            strict: true,
            ..Default::default()
        });
        let got_a: Log<u32> = Arc::new(Mutex::new(Vec::new()));
        let got_b: Log<u32> = Arc::new(Mutex::new(Vec::new()));
        scheduler.add(Box::new(ClassWorker::new(got_a.clone()))).unwrap();
        scheduler.add(Box::new(ClassWorker::new(got_b.clone()))).unwrap();
        scheduler.add(Box::new(ClassSender)).unwrap();
        scheduler
            .run(RunOptions {
                iterations: Some(3),
                ..Default::default()
            })
            .unwrap();

        // Both workers share the "class-worker" tag, so both receive the
        // one dispatched job — one as the original, one as a copy().
        assert_eq!(*got_a.lock().unwrap(), vec![9]);
        assert_eq!(*got_b.lock().unwrap(), vec![9]);
    }

    struct Uncopyable;
    impl std::fmt::Debug for Uncopyable {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Uncopyable")
        }
    }
    impl crate::message::Payload for Uncopyable {
        fn copy(&self) -> Result<Box<dyn crate::message::Payload>, KernelError> {
            Err(KernelError::MessageContract("no copy".into()))
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    struct BadSender;
    impl Agent for BadSender {
        fn class_tag(&self) -> &str {
            "bad-sender"
        }
        fn setup(&mut self, ctx: &mut AgentContext) -> AgentResult {
            ctx.send(Receiver::Broadcast, "bad", Uncopyable)?;
            Ok(())
        }
    }

    #[test]
    fn copy_required_payload_rejected_at_send() {
        let mut scheduler = Scheduler::new(SchedulerConfig {
            mode: ClockMode::Simulated,
            strict: true,
            ..Default::default()
        });
        let err = scheduler.add(Box::new(BadSender)).unwrap_err();
        assert!(matches!(err, KernelError::AgentFault { .. }));
    }

    struct Noop;
    impl Agent for Noop {
        fn class_tag(&self) -> &str {
            "noop"
        }
        fn preferred_uuid(&self) -> Option<AgentId> {
            Some(AgentId::from_uuid(Uuid::from_u128(42)))
        }
    }

    #[test]
    fn duplicate_preferred_uuid_is_rejected_at_registration() {
        let mut scheduler = Scheduler::new(SchedulerConfig::default());
        scheduler.add(Box::new(Noop)).unwrap();
        let err = scheduler.add(Box::new(Noop)).unwrap_err();
        assert!(matches!(err, KernelError::DuplicateAgent(_)));
    }
}
