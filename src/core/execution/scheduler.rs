use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// State change deferred to a later tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// `recovery -> running` once the settle delay has elapsed
    SettleRecovery,
}

/// Handle returned by [`DeferredScheduler::schedule`], usable for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionHandle(u64);

#[derive(Debug)]
struct ScheduledAction {
    due_tick: u64,
    sequence_num: u64,
    action: DeferredAction,
}

impl PartialEq for ScheduledAction {
    fn eq(&self, other: &Self) -> bool {
        self.due_tick == other.due_tick && self.sequence_num == other.sequence_num
    }
}

impl Eq for ScheduledAction {}

impl PartialOrd for ScheduledAction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledAction {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .due_tick
            .cmp(&self.due_tick)
            .then_with(|| other.sequence_num.cmp(&self.sequence_num))
    }
}

/// Tick-keyed queue of cancelable deferred actions
///
/// Lives on the same clock as the tick driver, so stopping the driver can
/// drop every pending action before it fires.
#[derive(Debug, Default)]
pub struct DeferredScheduler {
    queue: BinaryHeap<ScheduledAction>,
    sequence_counter: u64,
}

impl DeferredScheduler {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            sequence_counter: 0,
        }
    }

    /// Schedule `action` to fire at tick `now + delay_ticks`
    pub fn schedule(&mut self, action: DeferredAction, now: u64, delay_ticks: u64) -> ActionHandle {
        let sequence_num = self.sequence_counter;
        self.sequence_counter += 1;
        self.queue.push(ScheduledAction {
            due_tick: now + delay_ticks,
            sequence_num,
            action,
        });
        ActionHandle(sequence_num)
    }

    /// Cancel one pending action; returns false if it already fired
    pub fn cancel(&mut self, handle: ActionHandle) -> bool {
        let before = self.queue.len();
        self.queue.retain(|scheduled| scheduled.sequence_num != handle.0);
        self.queue.len() != before
    }

    /// Drop every pending action
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// Pop every action due at or before `now`, in scheduling order
    pub fn drain_due(&mut self, now: u64) -> Vec<DeferredAction> {
        let mut due = Vec::new();
        while let Some(next) = self.queue.peek() {
            if next.due_tick > now {
                break;
            }
            if let Some(scheduled) = self.queue.pop() {
                due.push(scheduled.action);
            }
        }
        due
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn has_pending(&self, action: DeferredAction) -> bool {
        self.queue.iter().any(|scheduled| scheduled.action == action)
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.peek().map(|scheduled| scheduled.due_tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_respects_due_tick() {
        let mut scheduler = DeferredScheduler::new();
        scheduler.schedule(DeferredAction::SettleRecovery, 3, 2);
        assert!(scheduler.drain_due(4).is_empty());
        assert_eq!(scheduler.next_due(), Some(5));
        assert_eq!(scheduler.drain_due(5), vec![DeferredAction::SettleRecovery]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_cancel_single_and_all() {
        let mut scheduler = DeferredScheduler::new();
        let first = scheduler.schedule(DeferredAction::SettleRecovery, 0, 1);
        scheduler.schedule(DeferredAction::SettleRecovery, 0, 2);

        assert!(scheduler.cancel(first));
        assert!(!scheduler.cancel(first));
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.cancel_all(), 1);
        assert!(scheduler.drain_due(10).is_empty());
    }
}
