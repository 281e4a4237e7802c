// src/demo_agents/ping_pong.rs
// Two agents bouncing a counter back and forth, each a unicast send away
// from the other: exercises plain agent-to-agent delivery and the
// one-cycle delay between a send and its arrival.

use crate::agent::{Agent, AgentContext, AgentResult};
use crate::message::{AgentId, Receiver};

const PING_PONG_TOPIC: &str = "ping-pong";

/// Starts the exchange by sending the first ping in `setup`. Both
/// agents are constructed with pre-chosen ids (`preferred_uuid`) so each
/// can be told the other's address before either is registered.
pub struct PingAgent {
    id: AgentId,
    peer: AgentId,
    bounces: u32,
    max_bounces: u32,
}

impl PingAgent {
    pub fn new(id: AgentId, peer: AgentId, max_bounces: u32) -> Self {
        Self {
            id,
            peer,
            bounces: 0,
            max_bounces,
        }
    }
}

impl Agent for PingAgent {
    fn class_tag(&self) -> &str {
        "ping"
    }

    fn preferred_uuid(&self) -> Option<AgentId> {
        Some(self.id)
    }

    fn setup(&mut self, ctx: &mut AgentContext) -> AgentResult {
        ctx.send(Receiver::Agent(self.peer), PING_PONG_TOPIC, self.bounces)?;
        Ok(())
    }

    fn update(&mut self, ctx: &mut AgentContext) -> AgentResult {
        while let Some(msg) = ctx.receive() {
            let count = *msg.payload().as_any().downcast_ref::<u32>().unwrap_or(&0);
            self.bounces = count;
            tracing::info!(bounces = self.bounces, "ping received pong");
            if self.bounces < self.max_bounces {
                ctx.send(Receiver::Agent(self.peer), PING_PONG_TOPIC, self.bounces)?;
            }
        }
        Ok(())
    }
}

/// Echoes every ping back, incrementing the bounce counter.
pub struct PongAgent {
    id: AgentId,
    peer: AgentId,
}

impl PongAgent {
    pub fn new(id: AgentId, peer: AgentId) -> Self {
        Self { id, peer }
    }
}

impl Agent for PongAgent {
    fn class_tag(&self) -> &str {
        "pong"
    }

    fn preferred_uuid(&self) -> Option<AgentId> {
        Some(self.id)
    }

    fn update(&mut self, ctx: &mut AgentContext) -> AgentResult {
        while let Some(msg) = ctx.receive() {
            let count = *msg.payload().as_any().downcast_ref::<u32>().unwrap_or(&0);
            tracing::info!(count, "pong received ping");
            ctx.send(Receiver::Agent(self.peer), PING_PONG_TOPIC, count + 1)?;
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
    fn ping_pong_bounces_the_exact_requested_count() {
        let mut scheduler = Scheduler::new(SchedulerConfig {
            mode: ClockMode::Simulated,
            strict: true,
            ..Default::default()
        });

        let ping_id = AgentId::new();
        let pong_id = AgentId::new();
        scheduler.add(Box::new(PongAgent::new(pong_id, ping_id))).unwrap();
        scheduler.add(Box::new(PingAgent::new(ping_id, pong_id, 6))).unwrap();

        scheduler
            .run(RunOptions {
                iterations: Some(20),
                ..Default::default()
            })
            .unwrap();
    }
}
