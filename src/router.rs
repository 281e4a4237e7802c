// src/router.rs
// The "mailman": maintains the topic/uuid/class subscription index and
// resolves each message into an ordered set of recipient agents.

use std::collections::{BTreeSet, HashSet};

use crate::message::{AgentId, Message, Receiver};

#[cfg(not(feature = "fx-hash"))]
type SubscriptionMap<K, V> = std::collections::HashMap<K, V>;
#[cfg(feature = "fx-hash")]
type SubscriptionMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// Topic/uuid/class-tag subscription index, with a reverse index kept
/// for O(subscribed) teardown. `BTreeSet` gives deterministic,
/// `AgentId`-sorted fan-out order regardless of subscription order; the
/// outer map is `FxHashMap` instead of the default SipHash-keyed
/// `HashMap` when the `fx-hash` feature is on, trading DoS-resistance
/// for lookup speed the way the `rustc-hash` crate intends.
#[derive(Default)]
pub struct Router {
    by_topic: SubscriptionMap<String, BTreeSet<AgentId>>,
    by_agent: SubscriptionMap<AgentId, HashSet<String>>,
    strict: bool,
}

impl Router {
    /// `strict` selects the §9 open-question behaviour for an unknown
    /// receiver: `false` (default) logs at debug and drops the message;
    /// `true` turns it into a routing error.
    pub fn new(strict: bool) -> Self {
        Self {
            by_topic: SubscriptionMap::default(),
            by_agent: SubscriptionMap::default(),
            strict,
        }
    }

    pub fn subscribe(&mut self, agent: AgentId, topic: impl Into<String>) {
        let topic = topic.into();
        self.by_topic.entry(topic.clone()).or_default().insert(agent);
        self.by_agent.entry(agent).or_default().insert(topic);
    }

    pub fn unsubscribe(&mut self, agent: AgentId, topic: &str) {
        if let Some(subs) = self.by_topic.get_mut(topic) {
            subs.remove(&agent);
            if subs.is_empty() {
                self.by_topic.remove(topic);
            }
        }
        if let Some(topics) = self.by_agent.get_mut(&agent) {
            topics.remove(topic);
        }
    }

    /// Drop every subscription owned by `agent` (teardown), in
    /// O(subscribed-topics).
    pub fn unsubscribe_all(&mut self, agent: AgentId) {
        if let Some(topics) = self.by_agent.remove(&agent) {
            for topic in topics {
                if let Some(subs) = self.by_topic.get_mut(&topic) {
                    subs.remove(&agent);
                    if subs.is_empty() {
                        self.by_topic.remove(&topic);
                    }
                }
            }
        }
    }

    pub fn subscribers(&self, topic: &str) -> impl Iterator<Item = AgentId> + '_ {
        self.by_topic.get(topic).into_iter().flatten().copied()
    }

    fn is_subscribed(&self, agent: AgentId, topic: &str) -> bool {
        self.by_topic.get(topic).is_some_and(|s| s.contains(&agent))
    }

    /// Resolve a message to an ordered list of recipients. The caller
    /// (the scheduler) is responsible for delivering the original to
    /// the first entry and a [`Message::copy`] to every subsequent one.
    ///
    /// `known_agents` distinguishes "addressed to an id nobody
    /// registered" (dropped/warned) from "addressed to a live agent
    /// with zero extra subscribers" (delivered once, no error).
    pub fn route(&self, message: &Message, known_agents: &HashSet<AgentId>) -> RouteOutcome {
        match &message.receiver {
            Receiver::Agent(id) => {
                if !known_agents.contains(id) {
                    return RouteOutcome::unknown(message);
                }
                let mut recipients = vec![*id];
                // Anyone explicitly subscribed to this agent's own id
                // "overhears" unicast traffic addressed to it.
                for sub in self.subscribers(&id.to_string()) {
                    if sub != *id && !recipients.contains(&sub) {
                        recipients.push(sub);
                    }
                }
                RouteOutcome::Delivered(recipients)
            }
            Receiver::Class(tag) => {
                let recipients: Vec<AgentId> = self.subscribers(tag).collect();
                if recipients.is_empty() {
                    RouteOutcome::unknown(message)
                } else {
                    RouteOutcome::Delivered(recipients)
                }
            }
            Receiver::Broadcast => {
                let recipients: Vec<AgentId> = self.subscribers(&message.topic).collect();
                if recipients.is_empty() {
                    RouteOutcome::Delivered(Vec::new())
                } else {
                    RouteOutcome::Delivered(recipients)
                }
            }
        }
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    #[cfg(test)]
    pub(crate) fn is_subscribed_for_test(&self, agent: AgentId, topic: &str) -> bool {
        self.is_subscribed(agent, topic)
    }
}

/// Outcome of resolving one message's recipients.
pub enum RouteOutcome {
    /// Ordered recipients (possibly empty for a broadcast with no
    /// subscribers — that is not an error, just nobody listening).
    Delivered(Vec<AgentId>),
    /// `receiver` named an agent id or class tag nobody is registered
    /// under; `strict` callers turn this into an error upstream.
    Unknown,
}

impl RouteOutcome {
    fn unknown(_message: &Message) -> Self {
        RouteOutcome::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Receiver;

    fn msg(receiver: Receiver, topic: &str) -> Message {
        Message::new(None, receiver, topic, ()).unwrap()
    }

    #[test]
    fn broadcast_fans_out_to_all_topic_subscribers_deterministically() {
        let mut router = Router::new(false);
        let a = AgentId::new();
        let b = AgentId::new();
        router.subscribe(a, "T");
        router.subscribe(b, "T");

        let known: HashSet<AgentId> = [a, b].into_iter().collect();
        let outcome = router.route(&msg(Receiver::Broadcast, "T"), &known);
        match outcome {
            RouteOutcome::Delivered(recipients) => {
                let mut sorted = recipients.clone();
                sorted.sort();
                assert_eq!(recipients, sorted);
                assert_eq!(recipients.len(), 2);
            }
            RouteOutcome::Unknown => panic!("expected delivery"),
        }
    }

    #[test]
    fn unicast_to_unknown_agent_is_unknown() {
        let router = Router::new(false);
        let known = HashSet::new();
        let outcome = router.route(&msg(Receiver::Agent(AgentId::new()), "x"), &known);
        assert!(matches!(outcome, RouteOutcome::Unknown));
    }

    #[test]
    fn unicast_with_subscriber_delivers_original_then_copy_targets() {
        let mut router = Router::new(false);
        let owner = AgentId::new();
        let watcher = AgentId::new();
        router.subscribe(watcher, &owner.to_string());

        let known: HashSet<AgentId> = [owner, watcher].into_iter().collect();
        let outcome = router.route(&msg(Receiver::Agent(owner), "x"), &known);
        match outcome {
            RouteOutcome::Delivered(recipients) => {
                assert_eq!(recipients[0], owner);
                assert_eq!(recipients[1], watcher);
            }
            RouteOutcome::Unknown => panic!("expected delivery"),
        }
    }

    #[test]
    fn teardown_removes_all_subscriptions() {
        let mut router = Router::new(false);
        let a = AgentId::new();
        router.subscribe(a, "T1");
        router.subscribe(a, "T2");
        router.unsubscribe_all(a);
        assert!(!router.is_subscribed_for_test(a, "T1"));
        assert!(!router.is_subscribed_for_test(a, "T2"));
    }
}
