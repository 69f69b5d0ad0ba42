//! Configuration for deadlock simulation runs
//!
//! This module provides the tunable parameters of the simulation core:
//! roster sizes, transition probabilities, retention windows, the safety model
//! used by avoidance, and how batch runs are spread across threads.
use crate::core::errors::{SimError, SimResult};
use crate::core::policy::SafetyModel;
use serde::{Deserialize, Serialize};

/// Enumeration of supported concurrency modes for batch runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcurrencyMode {
    /// Runs are executed one after another on the calling thread
    Sequential,
    /// Runs are spread over a Rayon thread pool
    Rayon,
}

impl Default for ConcurrencyMode {
    fn default() -> Self {
        ConcurrencyMode::Sequential
    }
}

/// Configuration for a simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Customers created on reset
    pub initial_customers: usize,
    /// Resources created on reset
    pub initial_resources: usize,
    /// Upper bound on the roster while stress mode is on
    pub stress_customer_cap: usize,
    /// Maximum retained events
    pub event_log_capacity: usize,
    pub performance_window: usize,
    pub contention_window: usize,
    /// Chance an idle customer becomes running in a tick
    pub arrival_probability: f64,
    /// Chance an active customer tries to grab a free resource
    pub acquire_probability: f64,
    /// Chance a customer that got nothing blocks on a held resource
    pub block_probability: f64,
    /// Chance a holder releases one resource
    pub release_probability: f64,
    /// Chance a customer that released everything goes idle
    pub idle_return_probability: f64,
    /// Ticks spent in `recovery` before returning to `running`
    pub recovery_settle_ticks: u64,
    /// Allocation passes a preempted victim sits out
    pub victim_backoff_ticks: u32,
    /// Nominal wall-clock spacing of ticks for external drivers
    pub tick_interval_ms: u64,
    /// Resources in each customer's declared Banker claim
    pub claim_size: usize,
    pub safety_model: SafetyModel,
    pub initial_load: u8,
    pub random_seed: Option<u64>,
    pub concurrency_mode: ConcurrencyMode,
    /// Only relevant when concurrency_mode is Rayon
    pub thread_pool_size: Option<usize>,
}

impl SimulationConfig {
    /// Create a new simulation configuration with default values
    pub fn new() -> Self {
        Self {
            initial_customers: 6,
            initial_resources: 8,
            stress_customer_cap: 12,
            event_log_capacity: 200,
            performance_window: 60,
            contention_window: 40,
            arrival_probability: 0.6,
            acquire_probability: 0.7,
            block_probability: 0.5,
            release_probability: 0.35,
            idle_return_probability: 0.3,
            recovery_settle_ticks: 2,
            victim_backoff_ticks: 1,
            tick_interval_ms: 1200,
            claim_size: 3,
            safety_model: SafetyModel::Banker,
            initial_load: 5,
            random_seed: Some(42),
            concurrency_mode: ConcurrencyMode::default(),
            thread_pool_size: None,
        }
    }

    pub fn with_roster(mut self, customers: usize, resources: usize) -> Self {
        self.initial_customers = customers;
        self.initial_resources = resources;
        self
    }

    pub fn with_stress_cap(mut self, cap: usize) -> Self {
        self.stress_customer_cap = cap;
        self
    }

    pub fn with_event_log_capacity(mut self, capacity: usize) -> Self {
        self.event_log_capacity = capacity;
        self
    }

    pub fn with_probabilities(mut self, arrival: f64, acquire: f64, block: f64, release: f64) -> Self {
        self.arrival_probability = arrival;
        self.acquire_probability = acquire;
        self.block_probability = block;
        self.release_probability = release;
        self
    }

    pub fn with_idle_return_probability(mut self, probability: f64) -> Self {
        self.idle_return_probability = probability;
        self
    }

    pub fn with_recovery_settle_ticks(mut self, ticks: u64) -> Self {
        self.recovery_settle_ticks = ticks;
        self
    }

    pub fn with_victim_backoff(mut self, ticks: u32) -> Self {
        self.victim_backoff_ticks = ticks;
        self
    }

    pub fn with_claim_size(mut self, size: usize) -> Self {
        self.claim_size = size;
        self
    }

    pub fn with_safety_model(mut self, model: SafetyModel) -> Self {
        self.safety_model = model;
        self
    }

    pub fn with_random_seed(mut self, seed: Option<u64>) -> Self {
        self.random_seed = seed;
        self
    }

    /// Set the concurrency mode used by batch runs
    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = mode;
        self
    }

    /// Set the thread pool size for parallel batch runs
    ///
    /// # Note
    /// This setting only affects execution when concurrency_mode is Rayon
    pub fn with_thread_pool_size(mut self, size: usize) -> Self {
        self.thread_pool_size = Some(size);
        self
    }

    /// Nominal tick spacing for drivers that pace the simulation in real time
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms)
    }

    /// Seed for the metrics jitter generator, kept apart from the allocation stream
    pub fn metrics_seed(&self) -> u64 {
        self.random_seed.unwrap_or(0) ^ 0x9e37_79b9_7f4a_7c15
    }

    pub fn validate(&self) -> SimResult<()> {
        let probabilities = [
            ("arrival_probability", self.arrival_probability),
            ("acquire_probability", self.acquire_probability),
            ("block_probability", self.block_probability),
            ("release_probability", self.release_probability),
            ("idle_return_probability", self.idle_return_probability),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(SimError::InvalidConfig(format!(
                    "{} must be within 0..=1, got {}",
                    name, value
                )));
            }
        }
        if self.stress_customer_cap < self.initial_customers {
            return Err(SimError::InvalidConfig(format!(
                "stress_customer_cap {} is below initial_customers {}",
                self.stress_customer_cap, self.initial_customers
            )));
        }
        if !(1..=10).contains(&self.initial_load) {
            return Err(SimError::InvalidConfig(format!(
                "initial_load must be within 1..=10, got {}",
                self.initial_load
            )));
        }
        if self.thread_pool_size == Some(0) {
            return Err(SimError::InvalidConfig("thread_pool_size must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert_eq!(config.concurrency_mode, ConcurrencyMode::Sequential);
        assert_eq!(config.thread_pool_size, None);
        assert_eq!(config.initial_customers, 6);
        assert_eq!(config.initial_resources, 8);
        assert_eq!(config.event_log_capacity, 200);
        assert_eq!(config.safety_model, SafetyModel::Banker);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = SimulationConfig::new()
            .with_roster(2, 2)
            .with_concurrency(ConcurrencyMode::Rayon)
            .with_thread_pool_size(4)
            .with_random_seed(Some(7));

        assert_eq!(config.concurrency_mode, ConcurrencyMode::Rayon);
        assert_eq!(config.thread_pool_size, Some(4));
        assert_eq!(config.initial_customers, 2);
        assert_eq!(config.random_seed, Some(7));
    }

    #[test]
    fn test_rejects_bad_probability() {
        let config = SimulationConfig::new().with_probabilities(0.5, 1.5, 0.5, 0.5);
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_cap_below_roster() {
        let config = SimulationConfig::new().with_roster(8, 4).with_stress_cap(6);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_concurrency_mode_default() {
        assert_eq!(ConcurrencyMode::default(), ConcurrencyMode::Sequential);
        assert_ne!(ConcurrencyMode::Sequential, ConcurrencyMode::Rayon);
    }
}
