use crate::core::errors::{SimError, SimResult};
use crate::core::execution::config::{ConcurrencyMode, SimulationConfig};
use crate::core::execution::simulation_engine::Simulation;
use crate::core::graph::{detect_all_cycles, WaitForGraph};
use crate::core::metrics::Counters;
use crate::core::policy::{StrategyFlags, StrategyKind};
use crate::core::status::SimulationStatus;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Result of one seeded run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub seed: u64,
    pub strategy: StrategyFlags,
    pub counters: Counters,
    pub final_status: SimulationStatus,
    pub stuck: bool,
    /// Cycles present in the final entity state, found by running the detector directly
    pub live_cycles: usize,
}

/// Totals across a set of runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub runs: usize,
    pub deadlocks: u64,
    pub recoveries: u64,
    pub granted: u64,
    pub denied: u64,
    pub stuck_runs: usize,
}

impl BatchSummary {
    pub fn from_outcomes<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a BatchOutcome>,
    {
        let mut summary = BatchSummary::default();
        for outcome in outcomes {
            summary.runs += 1;
            summary.deadlocks += outcome.counters.deadlock_count;
            summary.recoveries += outcome.counters.recovery_count;
            summary.granted += outcome.counters.total_granted;
            summary.denied += outcome.counters.total_denied;
            if outcome.stuck {
                summary.stuck_runs += 1;
            }
        }
        summary
    }

    /// Mean deadlocks per run
    pub fn deadlock_rate(&self) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            self.deadlocks as f64 / self.runs as f64
        }
    }
}

/// Runs every (seed, strategy) pair for a fixed number of ticks
pub struct BatchRunner {
    config: SimulationConfig,
    seeds: Vec<u64>,
    strategies: Vec<StrategyFlags>,
    ticks: u64,
}

impl BatchRunner {
    pub fn new(config: SimulationConfig, ticks: u64) -> Self {
        Self {
            config,
            seeds: Vec::new(),
            strategies: vec![StrategyFlags::default()],
            ticks,
        }
    }

    pub fn with_seeds<I: IntoIterator<Item = u64>>(mut self, seeds: I) -> Self {
        self.seeds = seeds.into_iter().collect();
        self
    }

    pub fn with_strategies<I: IntoIterator<Item = StrategyFlags>>(mut self, strategies: I) -> Self {
        self.strategies = strategies.into_iter().collect();
        self
    }

    fn jobs(&self) -> Vec<(u64, StrategyFlags)> {
        self.strategies
            .iter()
            .flat_map(|strategy| self.seeds.iter().map(move |seed| (*seed, *strategy)))
            .collect()
    }

    /// Execute the batch; outcomes come back in (strategy, seed) order
    pub fn run(&self) -> SimResult<Vec<BatchOutcome>> {
        self.config.validate()?;
        let jobs = self.jobs();
        info!(
            "batch of {} runs x {} ticks ({:?})",
            jobs.len(),
            self.ticks,
            self.config.concurrency_mode
        );

        match self.config.concurrency_mode {
            ConcurrencyMode::Sequential => jobs
                .iter()
                .map(|(seed, strategy)| self.run_one(*seed, *strategy))
                .collect(),
            ConcurrencyMode::Rayon => match self.config.thread_pool_size {
                Some(threads) => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(threads)
                        .build()
                        .map_err(|e| SimError::InvalidConfig(e.to_string()))?;
                    pool.install(|| {
                        jobs.par_iter()
                            .map(|(seed, strategy)| self.run_one(*seed, *strategy))
                            .collect()
                    })
                }
                None => jobs
                    .par_iter()
                    .map(|(seed, strategy)| self.run_one(*seed, *strategy))
                    .collect(),
            },
        }
    }

    fn run_one(&self, seed: u64, strategy: StrategyFlags) -> SimResult<BatchOutcome> {
        let config = self.config.clone().with_random_seed(Some(seed));
        let mut sim = Simulation::new(config)?;
        for kind in [StrategyKind::Prevention, StrategyKind::Avoidance, StrategyKind::Detection] {
            sim.set_strategy(kind, strategy.is_enabled(kind));
        }
        sim.start()?;
        sim.run_ticks(self.ticks)?;
        let live_cycles = detect_all_cycles(&WaitForGraph::build(sim.entities())).len();
        Ok(BatchOutcome {
            seed,
            strategy,
            counters: *sim.counters(),
            final_status: sim.status(),
            stuck: sim.is_stuck(),
            live_cycles,
        })
    }
}
