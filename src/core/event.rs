use super::types::{CustomerId, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Kind of state transition recorded in the event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Request,
    Allocate,
    Block,
    Release,
    Deadlock,
    Recovery,
    PreventionDecision,
    AvoidanceDecision,
    /// Request refused because the resource is outside the participant filter
    FilterDecision,
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Request => "Resource Request",
            EventKind::Allocate => "Resource Allocated",
            EventKind::Block => "Blocking Event",
            EventKind::Release => "Resource Released",
            EventKind::Deadlock => "Deadlock Detected",
            EventKind::Recovery => "Recovery Action",
            EventKind::PreventionDecision => "Prevention Decision",
            EventKind::AvoidanceDecision => "Avoidance Decision",
            EventKind::FilterDecision => "Filter Decision",
        }
    }
}

/// Immutable record of a single notable transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    pub id: u64,
    pub tick: u64,
    pub kind: EventKind,
    pub message: String,
    pub customer: Option<CustomerId>,
    pub resource: Option<ResourceId>,
}

/// Bounded, append-only event log
///
/// Ids increase monotonically for the life of the log; once `capacity` is
/// reached the oldest entry is evicted for every new one.
#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    events: VecDeque<SimEvent>,
    next_id: u64,
    current_tick: u64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
            next_id: 1,
            current_tick: 0,
        }
    }

    /// Stamp subsequent events with `tick`
    pub fn set_tick(&mut self, tick: u64) {
        self.current_tick = tick;
    }

    pub fn record(
        &mut self,
        kind: EventKind,
        message: impl Into<String>,
        customer: Option<CustomerId>,
        resource: Option<ResourceId>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        if self.capacity == 0 {
            return id;
        }
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(SimEvent {
            id,
            tick: self.current_tick,
            kind,
            message: message.into(),
            customer,
            resource,
        });
        id
    }

    /// Events with the most recent first
    pub fn newest_first(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter().rev()
    }

    /// Events in the order they were recorded
    pub fn oldest_first(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }

    /// Events recorded during `tick`, in recording order
    pub fn for_tick(&self, tick: u64) -> impl Iterator<Item = &SimEvent> {
        self.events.iter().filter(move |e| e.tick == tick)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.next_id = 1;
        self.current_tick = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_evicts_oldest_first() {
        let mut log = EventLog::new(3);
        for i in 0..5 {
            log.set_tick(i);
            log.record(EventKind::Request, format!("event {}", i), None, None);
        }

        assert_eq!(log.len(), 3);
        let ids: Vec<u64> = log.oldest_first().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        let newest: Vec<u64> = log.newest_first().map(|e| e.id).collect();
        assert_eq!(newest, vec![5, 4, 3]);
    }

    #[test]
    fn test_clear_restarts_ids() {
        let mut log = EventLog::new(4);
        log.record(EventKind::Release, "a", None, None);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.record(EventKind::Release, "b", None, None), 1);
    }
}
