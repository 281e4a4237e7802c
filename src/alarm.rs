// src/alarm.rs
// Per-agent timed wakeups, kept in a single min-heap keyed by fire_time
// with FIFO tie-breaking on an insertion counter.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::message::{AgentId, Message};

/// Handle returned by `set_alarm`, usable with `cancel_alarm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmId(pub(crate) u64);

/// Optional predicate evaluated at fire time; if it returns `true` the
/// alarm is discarded instead of routed ("conditional reminders"). Must
/// be `Sync` as well as `Send` so the alarm heap holding it can be
/// shared by reference across the `parallel` feature's worker threads.
pub type IgnorePredicate = Box<dyn Fn() -> bool + Send + Sync>;

pub(crate) struct Alarm {
    pub id: AlarmId,
    pub fire_time: f64,
    pub owner: AgentId,
    pub payload: Message,
    pub ignore_predicate: Option<IgnorePredicate>,
    insertion: u64,
}

/// Rust's `BinaryHeap` is a max-heap; invert `fire_time` (and break ties
/// on insertion order) so the heap pops the earliest-scheduled alarm
/// first — the same trick the teacher's `ScheduledMessage` wrapper uses
/// around its own delivery queue.
struct HeapEntry(Alarm);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.fire_time == other.0.fire_time && self.0.insertion == other.0.insertion
    }
}
impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .fire_time
            .partial_cmp(&self.0.fire_time)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.0.insertion.cmp(&self.0.insertion))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
pub(crate) struct AlarmHeap {
    heap: BinaryHeap<HeapEntry>,
    next_insertion: u64,
}

impl AlarmHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an alarm under an id minted by the caller (the scheduler
    /// owns a single id allocator so ids stay unique across both the
    /// sequential and parallel activation paths).
    pub fn insert(
        &mut self,
        id: AlarmId,
        owner: AgentId,
        fire_time: f64,
        payload: Message,
        ignore_predicate: Option<IgnorePredicate>,
    ) {
        let insertion = self.next_insertion;
        self.next_insertion += 1;
        self.heap.push(HeapEntry(Alarm {
            id,
            fire_time,
            owner,
            payload,
            ignore_predicate,
            insertion,
        }));
    }

    pub fn cancel(&mut self, id: AlarmId) -> bool {
        let before = self.heap.len();
        let remaining: Vec<HeapEntry> = self.heap.drain().filter(|e| e.0.id != id).collect();
        self.heap.extend(remaining);
        self.heap.len() != before
    }

    /// Drop every alarm owned by `owner` (agent teardown).
    pub fn retain_not_owned_by(&mut self, owner: AgentId) {
        let remaining: Vec<HeapEntry> = self.heap.drain().filter(|e| e.0.owner != owner).collect();
        self.heap.extend(remaining);
    }

    pub fn peek_fire_time(&self) -> Option<f64> {
        self.heap.peek().map(|e| e.0.fire_time)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pop every alarm with `fire_time <= now`, in non-decreasing
    /// `fire_time` order with ties broken by insertion order.
    pub fn pop_fireable(&mut self, now: f64) -> Vec<Alarm> {
        let mut fired = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.0.fire_time > now {
                break;
            }
            fired.push(self.heap.pop().unwrap().0);
        }
        fired
    }

    pub fn list(&self, owner: Option<AgentId>) -> Vec<(f64, &Message)> {
        self.heap
            .iter()
            .filter(|e| owner.map_or(true, |o| e.0.owner == o))
            .map(|e| (e.0.fire_time, &e.0.payload))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Receiver;

    fn msg() -> Message {
        Message::new(None, Receiver::Broadcast, "alarm", ()).unwrap()
    }

    #[test]
    fn pops_in_fire_time_order_with_fifo_ties() {
        let mut heap = AlarmHeap::new();
        let a = AgentId::new();
        let id_b = AlarmId(0);
        let id_a = AlarmId(1);
        heap.insert(id_b, a, 5.0, msg(), None);
        heap.insert(id_a, a, 5.0, msg(), None);
        heap.insert(AlarmId(2), a, 10.0, msg(), None);

        let fired = heap.pop_fireable(5.0);
        assert_eq!(fired.len(), 2);
        // insertion order: id_b was inserted first, so it fires first.
        assert_eq!(fired[0].id, id_b);
        assert_eq!(fired[1].id, id_a);
        assert_eq!(heap.peek_fire_time(), Some(10.0));
    }

    #[test]
    fn cancel_removes_alarm() {
        let mut heap = AlarmHeap::new();
        let a = AgentId::new();
        let id = AlarmId(0);
        heap.insert(id, a, 1.0, msg(), None);
        assert!(heap.cancel(id));
        assert!(heap.is_empty());
    }

    #[test]
    fn teardown_drops_owner_alarms() {
        let mut heap = AlarmHeap::new();
        let a = AgentId::new();
        let b = AgentId::new();
        heap.insert(AlarmId(0), a, 1.0, msg(), None);
        heap.insert(AlarmId(1), b, 2.0, msg(), None);
        heap.retain_not_owned_by(a);
        assert_eq!(heap.list(None).len(), 1);
    }
}
