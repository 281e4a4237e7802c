// src/demo_agents/class_tag.rs
// A dispatcher multicasting to every agent sharing a class tag, without
// knowing their individual ids: exercises Receiver::Class routing.

use crate::agent::{Agent, AgentContext, AgentResult};
use crate::message::Receiver;

pub const WORK_CLASS_TAG: &str = "worker";
pub const WORK_TOPIC: &str = "work-item";

pub struct Dispatcher {
    jobs: Vec<u32>,
}

impl Dispatcher {
    pub fn new(jobs: Vec<u32>) -> Self {
        Self { jobs }
    }
}

impl Agent for Dispatcher {
    fn class_tag(&self) -> &str {
        "dispatcher"
    }

    fn setup(&mut self, ctx: &mut AgentContext) -> AgentResult {
        for job in self.jobs.drain(..) {
            ctx.send(Receiver::Class(WORK_CLASS_TAG.into()), WORK_TOPIC, job)?;
        }
        Ok(())
    }
}

/// Every registered `Worker` auto-subscribes to `WORK_CLASS_TAG` at
/// registration via its `class_tag`, so it needs no explicit `subscribe`
/// call to receive multicast work items.
pub struct Worker {
    pub processed: Vec<u32>,
}

impl Default for Worker {
    fn default() -> Self {
        Self { processed: Vec::new() }
    }
}

impl Agent for Worker {
    fn class_tag(&self) -> &str {
        WORK_CLASS_TAG
    }

    fn update(&mut self, ctx: &mut AgentContext) -> AgentResult {
        while let Some(msg) = ctx.receive() {
            if let Some(job) = msg.payload().as_any().downcast_ref::<u32>() {
                self.processed.push(*job);
                tracing::info!(job, "worker processed job");
            }
        }
        Ok(())
    }
}
