// src/demo_agents/alarm_clock.rs
// A single agent that arms one far-future alarm and otherwise does
// nothing: in `Simulated` mode the clock should jump straight to the
// alarm's fire_time instead of idling cycle by cycle.

use crate::agent::{Agent, AgentContext, AgentResult};

pub struct AlarmDemo {
    pub fired_at: Option<f64>,
    delay: f64,
}

impl AlarmDemo {
    pub fn new(delay: f64) -> Self {
        Self { fired_at: None, delay }
    }
}

impl Agent for AlarmDemo {
    fn class_tag(&self) -> &str {
        "alarm-demo"
    }

    fn setup(&mut self, ctx: &mut AgentContext) -> AgentResult {
        ctx.set_alarm(self.delay, (), true, None)?;
        Ok(())
    }

    fn update(&mut self, ctx: &mut AgentContext) -> AgentResult {
        while ctx.receive().is_some() {
            self.fired_at = Some(ctx.now());
            tracing::info!(at = ctx.now(), "alarm fired");
        }
        Ok(())
    }
}
