// src/demo_agents/broadcast.rs
// One publisher, many subscribers: exercises Receiver::Broadcast fan-out
// and the original-then-copies delivery rule across more than one
// recipient.

use crate::agent::{Agent, AgentContext, AgentResult};
use crate::message::Receiver;

pub const PRICE_TICK_TOPIC: &str = "price-tick";

/// Emits one tick per activation, then goes back to sleep until the next
/// alarm or message wakes it — never touches `keep_awake`.
pub struct TickPublisher {
    price: u64,
}

impl TickPublisher {
    pub fn new(starting_price: u64) -> Self {
        Self { price: starting_price }
    }
}

impl Agent for TickPublisher {
    fn class_tag(&self) -> &str {
        "tick-publisher"
    }

    fn setup(&mut self, ctx: &mut AgentContext) -> AgentResult {
        ctx.set_alarm(1.0, (), true, None)?;
        Ok(())
    }

    fn update(&mut self, ctx: &mut AgentContext) -> AgentResult {
        while ctx.receive().is_some() {
            self.price += 1;
            ctx.send(Receiver::Broadcast, PRICE_TICK_TOPIC, self.price)?;
            ctx.set_alarm(1.0, (), true, None)?;
        }
        Ok(())
    }
}

/// Subscribes to `PRICE_TICK_TOPIC` in `setup` and records the last tick
/// it observed.
pub struct TickSubscriber {
    pub last_seen: Option<u64>,
}

impl Default for TickSubscriber {
    fn default() -> Self {
        Self { last_seen: None }
    }
}

impl Agent for TickSubscriber {
    fn class_tag(&self) -> &str {
        "tick-subscriber"
    }

    fn setup(&mut self, ctx: &mut AgentContext) -> AgentResult {
        ctx.subscribe(PRICE_TICK_TOPIC);
        Ok(())
    }

    fn update(&mut self, ctx: &mut AgentContext) -> AgentResult {
        while let Some(msg) = ctx.receive() {
            if let Some(price) = msg.payload().as_any().downcast_ref::<u64>() {
                self.last_seen = Some(*price);
                tracing::info!(price, "subscriber saw tick");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockMode;
    use crate::scheduler::{RunOptions, Scheduler, SchedulerConfig};

    #[test]
    fn every_subscriber_receives_every_broadcast_tick() {
        let mut scheduler = Scheduler::new(SchedulerConfig {
            mode: ClockMode::Simulated,
            strict: true,
            ..Default::default()
        });

        scheduler.add(Box::new(TickPublisher::new(100))).unwrap();
        scheduler.add(Box::new(TickSubscriber::default())).unwrap();
        scheduler.add(Box::new(TickSubscriber::default())).unwrap();

        scheduler
            .run(RunOptions {
                iterations: Some(10),
                ..Default::default()
            })
            .unwrap();
    }
}
