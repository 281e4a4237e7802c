// src/error.rs
// Error taxonomy for the scheduler/router/clock/message/agent core.

use crate::message::AgentId;

/// Errors raised by the kernel's public operations.
///
/// Registration, message-contract and clock errors are fatal to the
/// offending call but leave the scheduler runnable. `AgentFault` is
/// never returned from `Scheduler::run` directly — it is caught at the
/// activation boundary, logged, and the offending agent retired, unless
/// the scheduler was built with `strict = true`, in which case it is
/// propagated as the `run` error.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("agent {uuid} cannot be registered: {reason}")]
    Registration { uuid: AgentId, reason: String },

    #[error("duplicate agent uuid {0}")]
    DuplicateAgent(AgentId),

    #[error("message rejected: {0}")]
    MessageContract(String),

    #[error("clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("agent {uuid} faulted in {hook}: {source}")]
    AgentFault {
        uuid: AgentId,
        hook: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Clock-specific failure modes, wrapped into [`KernelError::Clock`].
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("cannot move virtual time backward: now={now}, requested={requested}")]
    TimeTravel { now: f64, requested: f64 },

    #[error("alarm interval must be non-negative, got {0}")]
    NegativeInterval(f64),

    #[error("unknown alarm id {0}")]
    UnknownAlarm(u64),
}
