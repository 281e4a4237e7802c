// src/lib.rs
// In-process multi-agent simulation kernel: a Scheduler drives a Clock
// and a Router to deliver Messages between Agents, one cycle at a time.

pub mod agent;
pub mod alarm;
pub mod clock;
pub mod demo_agents;
pub mod error;
pub mod message;
pub mod router;
pub mod scheduler;
pub mod telemetry;

pub use agent::{Agent, AgentContext, AgentResult, HandlerTable, Lifecycle};
pub use alarm::AlarmId;
pub use clock::ClockMode;
pub use error::{ClockError, KernelError};
pub use message::{AgentId, Message, Payload, Receiver};
pub use router::Router;
pub use scheduler::{RunOptions, Scheduler, SchedulerConfig};
pub use telemetry::{EventListener, KernelEvent, Telemetry};
