// src/agent.rs
// The Agent trait, the capability handle (AgentContext) the scheduler
// hands to its lifecycle hooks, and the typed operations-table helper
// that replaces the source's dynamic topic->handler mapping (see
// SPEC_FULL.md's Agent module note).
//
// AgentContext buffers every side effect (outgoing messages,
// subscription changes, alarm requests) locally instead of mutating the
// scheduler's shared Router/AlarmHeap/outbox directly. The scheduler
// merges those buffers back in after the hook returns. This is what
// lets the exact same Agent code run under the sequential activation
// loop or the optional rayon-parallel one (SPEC_FULL.md's "Optional
// parallel activation" section) without agents ever touching shared
// mutable state concurrently.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::alarm::{AlarmHeap, AlarmId, IgnorePredicate};
use crate::error::{ClockError, KernelError};
use crate::message::{AgentId, Message, Payload, Receiver};

/// Where an agent's lifecycle currently stands. Owned by the scheduler,
/// not by the agent itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unregistered,
    SetupPending,
    Live,
    TeardownPending,
    Retired,
}

pub type AgentResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;

/// User-authored unit of computation. Reacts to messages and timed
/// alarms; never touches the scheduler directly except through the
/// [`AgentContext`] passed into these hooks.
pub trait Agent: Send {
    /// Explicit routing tag for this agent type, auto-subscribed at
    /// registration (replaces the source's class-name-as-routing-key
    /// leak with a declared string).
    fn class_tag(&self) -> &str;

    /// A caller-chosen stable identity; `None` lets the scheduler
    /// assign a fresh one at registration.
    fn preferred_uuid(&self) -> Option<AgentId> {
        None
    }

    /// Called once after registration; may send messages and subscribe.
    fn setup(&mut self, _ctx: &mut AgentContext) -> AgentResult {
        Ok(())
    }

    /// Called whenever the inbox is non-empty, an alarm fired, or
    /// `keep_awake` is set. Must not block on unbounded external I/O.
    fn update(&mut self, _ctx: &mut AgentContext) -> AgentResult {
        Ok(())
    }

    /// Called on removal or scheduler shutdown.
    fn teardown(&mut self, _ctx: &mut AgentContext) -> AgentResult {
        Ok(())
    }
}

pub(crate) enum SubOp {
    Subscribe(String),
    Unsubscribe(String),
}

pub(crate) struct NewAlarm {
    pub id: AlarmId,
    pub fire_time: f64,
    pub payload: Message,
    pub ignore_predicate: Option<IgnorePredicate>,
}

/// Capability handle passed into every lifecycle hook. Reads are
/// answered from a read-only snapshot of scheduler-owned state (the
/// clock's current time, the alarm heap as of cycle start); writes are
/// buffered locally and merged back into the scheduler after the hook
/// returns.
pub struct AgentContext<'a> {
    uuid: AgentId,
    inbox: &'a mut VecDeque<Message>,
    now: f64,
    keep_awake: &'a mut bool,
    alarms_snapshot: &'a AlarmHeap,
    alarm_ids: &'a AtomicU64,
    pub(crate) outgoing: Vec<Message>,
    pub(crate) sub_ops: Vec<SubOp>,
    pub(crate) new_alarms: Vec<NewAlarm>,
    pub(crate) alarm_cancellations: Vec<AlarmId>,
}

impl<'a> AgentContext<'a> {
    pub(crate) fn new(
        uuid: AgentId,
        inbox: &'a mut VecDeque<Message>,
        now: f64,
        keep_awake: &'a mut bool,
        alarms_snapshot: &'a AlarmHeap,
        alarm_ids: &'a AtomicU64,
    ) -> Self {
        Self {
            uuid,
            inbox,
            now,
            keep_awake,
            alarms_snapshot,
            alarm_ids,
            outgoing: Vec::new(),
            sub_ops: Vec::new(),
            new_alarms: Vec::new(),
            alarm_cancellations: Vec::new(),
        }
    }

    pub fn uuid(&self) -> AgentId {
        self.uuid
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Enqueue a message for delivery next cycle. Accumulates locally
    /// and is merged into the global outbox once this hook returns;
    /// messages produced during this call are never observed by their
    /// recipients until a later cycle.
    pub fn send(&mut self, receiver: Receiver, topic: impl Into<String>, payload: impl Payload) -> Result<(), KernelError> {
        let msg = Message::new(Some(self.uuid), receiver, topic, payload)?;
        self.outgoing.push(msg);
        Ok(())
    }

    /// Pop the oldest message from this agent's inbox (FIFO).
    pub fn receive(&mut self) -> Option<Message> {
        self.inbox.pop_front()
    }

    pub fn has_messages(&self) -> bool {
        !self.inbox.is_empty()
    }

    pub fn subscribe(&mut self, topic: impl Into<String>) {
        self.sub_ops.push(SubOp::Subscribe(topic.into()));
    }

    pub fn unsubscribe(&mut self, topic: impl Into<String>) {
        self.sub_ops.push(SubOp::Unsubscribe(topic.into()));
    }

    /// `relative = true` adds `now()` to `t` before scheduling;
    /// `relative = false` treats `t` as an absolute virtual time.
    pub fn set_alarm(
        &mut self,
        t: f64,
        payload: impl Payload,
        relative: bool,
        ignore_predicate: Option<IgnorePredicate>,
    ) -> Result<AlarmId, KernelError> {
        if relative && t < 0.0 {
            return Err(KernelError::Clock(ClockError::NegativeInterval(t)));
        }
        let fire_time = if relative { self.now + t } else { t };
        let msg = Message::new(Some(self.uuid), Receiver::Agent(self.uuid), "alarm", payload)?;
        let id = AlarmId(self.alarm_ids.fetch_add(1, Ordering::Relaxed));
        self.new_alarms.push(NewAlarm {
            id,
            fire_time,
            payload: msg,
            ignore_predicate,
        });
        Ok(id)
    }

    pub fn cancel_alarm(&mut self, id: AlarmId) {
        self.alarm_cancellations.push(id);
    }

    /// O(#alarms) as of the start of this cycle; intended for
    /// cooperative dedup ("don't set another alarm if one is pending").
    /// Does not see alarms requested earlier in this same call.
    pub fn list_alarms(&self, owner: Option<AgentId>) -> Vec<f64> {
        self.alarms_snapshot
            .list(owner.or(Some(self.uuid)))
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    pub fn keep_awake(&self) -> bool {
        *self.keep_awake
    }

    pub fn set_keep_awake(&mut self, value: bool) {
        *self.keep_awake = value;
    }

    /// Drain the buffered side effects for the scheduler to merge back
    /// into the shared outbox/router/alarm heap.
    pub(crate) fn into_effects(self) -> (Vec<Message>, Vec<SubOp>, Vec<NewAlarm>, Vec<AlarmId>) {
        (self.outgoing, self.sub_ops, self.new_alarms, self.alarm_cancellations)
    }
}

/// Typed `topic -> handler` registration table an [`Agent`] impl may
/// embed to dispatch its own `update` by topic, instead of a raw
/// runtime-mutable mapping. `S` is whatever state the handlers need;
/// the table itself holds no agent state, so it sidesteps the
/// self-borrow issue of a handler closing over `&mut self`.
pub struct HandlerTable<S> {
    handlers: HashMap<String, Box<dyn Fn(&mut S, &mut AgentContext, &Message) + Send>>,
}

impl<S> Default for HandlerTable<S> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<S> HandlerTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        &mut self,
        topic: impl Into<String>,
        handler: impl Fn(&mut S, &mut AgentContext, &Message) + Send + 'static,
    ) -> &mut Self {
        self.handlers.insert(topic.into(), Box::new(handler));
        self
    }

    /// Returns `true` if a handler was registered for `msg.topic`.
    pub fn dispatch(&self, state: &mut S, ctx: &mut AgentContext, msg: &Message) -> bool {
        match self.handlers.get(&msg.topic) {
            Some(handler) => {
                handler(state, ctx, msg);
                true
            }
            None => false,
        }
    }
}
