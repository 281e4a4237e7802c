// src/telemetry.rs
// Event bus for embedders (analogous to the teacher's EventBus/CsvLogger
// pair): fans simulation-level events out to subscribed listeners, on
// top of the kernel's own `tracing` diagnostics.

use crate::message::AgentId;

/// High-level events emitted once per cycle for whoever wants to log,
/// record metrics, or write a CSV trail — entirely separate from the
/// kernel's internal `tracing` calls, which exist whether or not
/// anything is subscribed.
#[derive(Debug, Clone)]
pub enum KernelEvent {
    /// A message was resolved to `recipients` agents and delivered.
    Routed {
        cycle: u64,
        time: f64,
        topic: String,
        from: Option<AgentId>,
        recipients: usize,
    },
    /// An alarm fired for `owner`.
    AlarmFired { cycle: u64, time: f64, owner: AgentId },
    /// A message's receiver resolved to nobody known; dropped.
    RoutingDropped { cycle: u64, time: f64, topic: String },
    /// An agent raised inside `setup`/`update`/`teardown` and was
    /// retired (non-strict mode).
    AgentFaulted {
        cycle: u64,
        time: f64,
        uuid: AgentId,
        hook: &'static str,
    },
    /// A cycle produced no routed messages, no newly-hot agents, and no
    /// fireable alarms.
    Idle { cycle: u64, time: f64 },
}

pub trait EventListener: Send {
    fn on_event(&mut self, event: &KernelEvent);
}

/// Simple fan-out list of listeners, mirroring the teacher's `EventBus`.
#[derive(Default)]
pub struct Telemetry {
    listeners: Vec<Box<dyn EventListener>>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Box<dyn EventListener>) {
        self.listeners.push(listener);
    }

    pub fn emit(&mut self, event: KernelEvent) {
        for listener in self.listeners.iter_mut() {
            listener.on_event(&event);
        }
    }
}
