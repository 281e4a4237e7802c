// src/message.rs
// Envelope carrying sender, receiver, topic and an opaque payload.

use std::any::Any;
use std::fmt;

use uuid::Uuid;

use crate::error::KernelError;

/// Stable unique identity of an agent.
///
/// Assigned at construction if the embedder does not supply one
/// (`AgentId::new`), never reused, never a live reference into the
/// registry — the scheduler only ever passes these by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AgentId(Uuid);

impl AgentId {
    /// Fresh, process-unique identity.
    pub fn new() -> Self {
        AgentId(Uuid::new_v4())
    }

    /// Wrap a caller-supplied, already-unique identity.
    pub fn from_uuid(uuid: Uuid) -> Self {
        AgentId(uuid)
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolution target of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Receiver {
    /// Unicast to a known agent identity.
    Agent(AgentId),
    /// Multicast to every agent declaring this class tag.
    Class(String),
    /// Broadcast, routed purely by `topic` subscription.
    Broadcast,
}

/// Opaque, user-defined message payload.
///
/// Blanket-implemented for every `T: Clone + Debug + Send + Sync +
/// 'static`, so ordinary payload structs need no manual impl. A payload
/// that must be rejected at send time (the "message lacking `copy()`"
/// contract failure in the testable properties) implements `Payload` by
/// hand and returns `Err` from [`Payload::copy`]. The `Sync` bound lets
/// the alarm heap holding these payloads be shared by reference across
/// the `parallel` feature's rayon worker threads.
pub trait Payload: fmt::Debug + Send + Sync + 'static {
    /// Produce an independent logical copy of this payload, or fail the
    /// message-contract check.
    fn copy(&self) -> Result<Box<dyn Payload>, KernelError>;

    /// Narrow back to a concrete payload type inside a handler.
    fn as_any(&self) -> &dyn Any;
}

impl<T> Payload for T
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn copy(&self) -> Result<Box<dyn Payload>, KernelError> {
        Ok(Box::new(self.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A message in transit through the kernel.
///
/// Never mutated once it has entered the scheduler's outbox; `sender`
/// and `receiver` are value identifiers, never live references.
#[derive(Debug)]
pub struct Message {
    pub sender: Option<AgentId>,
    pub receiver: Receiver,
    pub topic: String,
    payload: Box<dyn Payload>,
}

impl Message {
    /// Build a message, defaulting `topic` to `type_tag` the way the
    /// spec's authoring contract describes ("default topic to the class
    /// tag"). Pass the payload's own tag here when it has one.
    pub fn new(
        sender: Option<AgentId>,
        receiver: Receiver,
        topic: impl Into<String>,
        payload: impl Payload,
    ) -> Result<Self, KernelError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(KernelError::MessageContract(
                "message topic must not be empty".into(),
            ));
        }
        // Validate copy-ability eagerly, at construction/send time, even
        // though only fan-out to more than one recipient actually needs
        // an extra copy — this is the "rejected at send time" rule.
        let _probe = payload.copy()?;
        Ok(Self {
            sender,
            receiver,
            topic,
            payload: Box::new(payload),
        })
    }

    pub fn payload(&self) -> &dyn Payload {
        self.payload.as_ref()
    }

    /// Produce an independent logical copy of the whole envelope.
    pub fn copy(&self) -> Result<Message, KernelError> {
        Ok(Message {
            sender: self.sender,
            receiver: self.receiver.clone(),
            topic: self.topic.clone(),
            payload: self.payload.copy()?,
        })
    }
}
