use super::entities::{CustomerState, EntityStore};
use super::policy::AllocationSummary;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const MIN_LOAD: u8 = 1;
pub const MAX_LOAD: u8 = 10;

/// Aggregate counters exposed to consumers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub tick: u64,
    pub deadlock_count: u64,
    pub recovery_count: u64,
    pub total_granted: u64,
    pub total_denied: u64,
    pub total_requests: u64,
    pub total_released: u64,
    pub total_blocked: u64,
}

impl Counters {
    pub fn absorb(&mut self, summary: &AllocationSummary) {
        self.total_granted += summary.granted;
        self.total_denied += summary.denied;
        self.total_requests += summary.requests;
        self.total_released += summary.released;
        self.total_blocked += summary.blocked;
    }

    /// Grants per processed tick
    pub fn throughput(&self) -> f64 {
        if self.tick == 0 {
            0.0
        } else {
            self.total_granted as f64 / self.tick as f64
        }
    }
}

/// Clamp a load level into `MIN_LOAD..=MAX_LOAD`
pub fn clamp_load(level: i32) -> u8 {
    level.clamp(MIN_LOAD as i32, MAX_LOAD as i32) as u8
}

/// Per-tick allocation activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformancePoint {
    pub tick: u64,
    pub granted: u64,
    pub denied: u64,
    pub blocked: u64,
    pub released: u64,
    pub active_customers: usize,
    pub waiting_customers: usize,
    /// Percentage of resources currently held
    pub utilization: f64,
}

/// Synthetic contention figures recorded while stress mode is on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentionSample {
    pub tick: u64,
    pub load: u8,
    pub participants: usize,
    pub lock_attempts: u64,
    pub lock_failures: u64,
    pub contention_level: f64,
    pub resource_utilization: f64,
}

/// Keeps bounded windows of performance points and contention samples
///
/// Uses its own generator so that jitter never shifts the allocation stream.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    performance_window: usize,
    contention_window: usize,
    performance: VecDeque<PerformancePoint>,
    contention: VecDeque<ContentionSample>,
    seed: u64,
    rng: StdRng,
}

impl MetricsRecorder {
    pub fn new(performance_window: usize, contention_window: usize, seed: u64) -> Self {
        Self {
            performance_window,
            contention_window,
            performance: VecDeque::with_capacity(performance_window),
            contention: VecDeque::with_capacity(contention_window),
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn record(
        &mut self,
        tick: u64,
        summary: &AllocationSummary,
        store: &EntityStore,
        load: u8,
        stress: bool,
    ) {
        let total = store.resources().len();
        let held = total - store.free_count();
        let utilization = if total == 0 {
            0.0
        } else {
            held as f64 * 100.0 / total as f64
        };
        let active = store
            .customers()
            .iter()
            .filter(|c| c.state() != CustomerState::Idle)
            .count();
        let waiting = store.waiting_count();

        push_bounded(
            &mut self.performance,
            self.performance_window,
            PerformancePoint {
                tick,
                granted: summary.granted,
                denied: summary.denied,
                blocked: summary.blocked,
                released: summary.released,
                active_customers: active,
                waiting_customers: waiting,
                utilization,
            },
        );

        if stress {
            let base = if active == 0 {
                0.0
            } else {
                waiting as f64 * 100.0 / active as f64
            };
            let jitter = Normal::new(0.0, load as f64 * 1.5)
                .map(|normal| normal.sample(&mut self.rng))
                .unwrap_or(0.0);
            let level = load as u64;
            push_bounded(
                &mut self.contention,
                self.contention_window,
                ContentionSample {
                    tick,
                    load,
                    participants: store.customers().len(),
                    lock_attempts: summary.requests * level,
                    lock_failures: (summary.denied + summary.blocked) * level,
                    contention_level: (base * 0.6 + load as f64 * 4.0 + jitter).clamp(0.0, 100.0),
                    resource_utilization: utilization,
                },
            );
        }
    }

    pub fn performance(&self) -> impl Iterator<Item = &PerformancePoint> {
        self.performance.iter()
    }

    pub fn contention(&self) -> impl Iterator<Item = &ContentionSample> {
        self.contention.iter()
    }

    pub fn clear_contention(&mut self) {
        self.contention.clear();
    }

    pub fn clear(&mut self) {
        self.performance.clear();
        self.contention.clear();
        self.rng = StdRng::seed_from_u64(self.seed);
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, window: usize, item: T) {
    if window == 0 {
        return;
    }
    while queue.len() >= window {
        queue.pop_front();
    }
    queue.push_back(item);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_load() {
        assert_eq!(clamp_load(-3), MIN_LOAD);
        assert_eq!(clamp_load(7), 7);
        assert_eq!(clamp_load(42), MAX_LOAD);
    }

    #[test]
    fn test_windows_are_bounded() {
        let store = EntityStore::with_defaults(2, 2, 1);
        let mut recorder = MetricsRecorder::new(3, 2, 7);
        let summary = AllocationSummary {
            requests: 2,
            denied: 1,
            ..Default::default()
        };
        for tick in 1..=5 {
            recorder.record(tick, &summary, &store, 4, true);
        }

        let ticks: Vec<u64> = recorder.performance().map(|p| p.tick).collect();
        assert_eq!(ticks, vec![3, 4, 5]);
        assert_eq!(recorder.contention().count(), 2);
        let sample = recorder.contention().last().unwrap();
        assert_eq!(sample.lock_attempts, 8);
        assert_eq!(sample.lock_failures, 4);
        assert!((0.0..=100.0).contains(&sample.contention_level));
    }

    #[test]
    fn test_contention_only_under_stress() {
        let store = EntityStore::with_defaults(2, 2, 1);
        let mut recorder = MetricsRecorder::new(4, 4, 7);
        recorder.record(1, &AllocationSummary::default(), &store, 5, false);
        assert_eq!(recorder.contention().count(), 0);
        assert_eq!(recorder.performance().count(), 1);
    }
}
