use crate::core::entities::{Customer, CustomerState, EntityStore, Resource};
use crate::core::errors::{SimError, SimResult};
use crate::core::event::{EventKind, EventLog, SimEvent};
use crate::core::execution::config::SimulationConfig;
use crate::core::execution::scheduler::{DeferredAction, DeferredScheduler};
use crate::core::graph::{detect_all_cycles, to_dot, CycleReport, WaitForGraph};
use crate::core::metrics::{clamp_load, ContentionSample, Counters, MetricsRecorder, PerformancePoint, MAX_LOAD};
use crate::core::policy::{AllocationPolicy, AllocationSummary, RequestOutcome, StrategyFlags, StrategyKind};
use crate::core::recovery::recover;
use crate::core::scenario::{Scenario, ScriptAction};
use crate::core::status::{SimulationStatus, StatusMachine};
use crate::core::types::{CustomerId, ResourceId};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What happened during one processed tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub status: SimulationStatus,
    pub summary: AllocationSummary,
    pub cycles_detected: usize,
    pub victims: Vec<CustomerId>,
}

/// Read-only copy of everything a display collaborator may look at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub tick: u64,
    pub status: SimulationStatus,
    pub stuck: bool,
    pub running: bool,
    pub strategy: StrategyFlags,
    pub load: u8,
    pub stress_mode: bool,
    pub customers: Vec<Customer>,
    pub resources: Vec<Resource>,
    /// Newest first
    pub events: Vec<SimEvent>,
    pub graph: WaitForGraph,
    pub counters: Counters,
}

/// Roster size targeted by stress mode at a given load level
pub fn stress_roster_size(base: usize, cap: usize, load: u8) -> usize {
    let span = cap.saturating_sub(base);
    base + span * load as usize / MAX_LOAD as usize
}

/// Owns the whole simulation state and drives it one tick at a time
///
/// The driver never blocks: an external timer (see
/// [`SimulationConfig::tick_interval`]) is expected to call [`Simulation::tick`].
/// Every mutation happens inside `tick` or one of the control operations.
pub struct Simulation<R: RngCore = StdRng> {
    config: SimulationConfig,
    rng: R,
    entities: EntityStore,
    strategy: StrategyFlags,
    filter: Option<BTreeSet<ResourceId>>,
    load: u8,
    stress_mode: bool,
    running: bool,
    status: StatusMachine,
    counters: Counters,
    log: EventLog,
    graph: WaitForGraph,
    scheduler: DeferredScheduler,
    metrics: MetricsRecorder,
    /// Cycles confirmed and not yet broken
    open_cycles: Vec<CycleReport>,
}

impl Simulation<StdRng> {
    /// Create a simulation seeded from the configuration
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: RngCore> Simulation<R> {
    /// Create a simulation drawing every probabilistic decision from `rng`
    pub fn with_rng(config: SimulationConfig, rng: R) -> SimResult<Self> {
        config.validate()?;
        let entities = default_entities(&config);
        Self::assemble(config, rng, entities)
    }

    /// Start from a hand-built entity state instead of the default roster
    pub fn from_entities(config: SimulationConfig, rng: R, entities: EntityStore) -> SimResult<Self> {
        config.validate()?;
        entities.check_invariants()?;
        Self::assemble(config, rng, entities)
    }

    fn assemble(config: SimulationConfig, rng: R, entities: EntityStore) -> SimResult<Self> {
        let graph = WaitForGraph::build(&entities);
        let metrics = MetricsRecorder::new(
            config.performance_window,
            config.contention_window,
            config.metrics_seed(),
        );
        Ok(Self {
            log: EventLog::new(config.event_log_capacity),
            load: config.initial_load,
            rng,
            entities,
            strategy: StrategyFlags::default(),
            filter: None,
            stress_mode: false,
            running: false,
            status: StatusMachine::new(),
            counters: Counters::default(),
            graph,
            scheduler: DeferredScheduler::new(),
            metrics,
            open_cycles: Vec::new(),
            config,
        })
    }

    // ---- control surface ----

    /// Begin processing ticks
    pub fn start(&mut self) -> SimResult<()> {
        if self.running {
            return Ok(());
        }
        self.running = true;
        if self.status.status() == SimulationStatus::Idle {
            self.status.transition(SimulationStatus::Running, self.counters.tick)?;
        }
        info!("simulation started at tick {}", self.counters.tick);
        Ok(())
    }

    /// Halt ticking and drop any pending deferred transition
    pub fn stop(&mut self) {
        let dropped = self.scheduler.cancel_all();
        if dropped > 0 {
            debug!("stop cancelled {} deferred action(s)", dropped);
        }
        self.running = false;
        self.status.halt(self.counters.tick);
        info!("simulation stopped at tick {}", self.counters.tick);
    }

    /// Stop and reinitialise everything to its defaults
    pub fn reset(&mut self) {
        self.stop();
        self.entities = default_entities(&self.config);
        self.strategy = StrategyFlags::default();
        self.filter = None;
        self.load = self.config.initial_load;
        self.stress_mode = false;
        self.status = StatusMachine::new();
        self.counters = Counters::default();
        self.log.clear();
        self.metrics.clear();
        self.open_cycles.clear();
        self.graph = WaitForGraph::build(&self.entities);
        info!("simulation reset");
    }

    pub fn set_strategy(&mut self, kind: StrategyKind, enabled: bool) {
        if self.strategy.is_enabled(kind) == enabled {
            return;
        }
        self.strategy.set(kind, enabled);
        info!(
            "{} {}",
            kind,
            if enabled { "enabled" } else { "disabled" }
        );
        if self.strategy.prevention && self.strategy.avoidance {
            debug!("prevention and avoidance both on; prevention decides grants");
        }
    }

    /// Restrict allocation to `resources`; an empty set means all resources
    pub fn set_participant_filter<I>(&mut self, resources: I) -> SimResult<()>
    where
        I: IntoIterator<Item = ResourceId>,
    {
        let filter: BTreeSet<ResourceId> = resources.into_iter().collect();
        for resource in &filter {
            self.entities.resource(*resource)?;
        }
        debug!("participant filter set to {:?}", filter);
        self.filter = if filter.is_empty() { None } else { Some(filter) };
        Ok(())
    }

    pub fn clear_participant_filter(&mut self) {
        self.filter = None;
    }

    /// Shift the load level by `delta`, clamped to 1..=10
    pub fn adjust_load(&mut self, delta: i32) -> u8 {
        self.load = clamp_load((self.load as i32).saturating_add(delta));
        if self.stress_mode {
            self.grow_roster();
        }
        debug!("load level {}", self.load);
        self.load
    }

    /// Flip stress mode; enabling grows the roster with running customers
    pub fn toggle_stress_mode(&mut self) -> bool {
        self.stress_mode = !self.stress_mode;
        if self.stress_mode {
            self.metrics.clear_contention();
            self.grow_roster();
        }
        info!(
            "stress mode {} with {} customers",
            if self.stress_mode { "on" } else { "off" },
            self.entities.customers().len()
        );
        self.stress_mode
    }

    fn grow_roster(&mut self) {
        let target = stress_roster_size(
            self.config.initial_customers,
            self.config.stress_customer_cap,
            self.load,
        );
        while self.entities.customers().len() < target {
            let id = self
                .entities
                .push_customer(CustomerState::Running, self.config.claim_size);
            debug!("stress mode added {}", id);
        }
        self.graph = WaitForGraph::build(&self.entities);
    }

    // ---- tick driver ----

    /// Process one tick; does nothing while stopped
    pub fn tick(&mut self) -> SimResult<Option<TickReport>> {
        if !self.running {
            return Ok(None);
        }
        let tick = self.begin_tick()?;

        let summary = {
            let policy = AllocationPolicy::new(&self.config, self.strategy, self.filter.as_ref());
            policy.run_tick(&mut self.entities, &mut self.rng, &mut self.log)?
        };
        debug!(
            "tick {}: {} granted, {} denied, {} blocked, {} released",
            tick, summary.granted, summary.denied, summary.blocked, summary.released
        );

        self.finish_tick(tick, summary).map(Some)
    }

    /// Advance the clock and apply deferred actions that have come due
    fn begin_tick(&mut self) -> SimResult<u64> {
        self.counters.tick += 1;
        let tick = self.counters.tick;
        self.log.set_tick(tick);

        for action in self.scheduler.drain_due(tick) {
            match action {
                DeferredAction::SettleRecovery => {
                    if self.status.status() == SimulationStatus::Recovery {
                        self.status.transition(SimulationStatus::Running, tick)?;
                    }
                }
            }
        }
        Ok(tick)
    }

    /// Everything after the allocation pass: counters, deadlock handling, metrics
    fn finish_tick(&mut self, tick: u64, summary: AllocationSummary) -> SimResult<TickReport> {
        self.counters.absorb(&summary);
        let (cycles_detected, victims) = self.resolve_deadlocks(tick)?;

        self.metrics
            .record(tick, &summary, &self.entities, self.load, self.stress_mode);

        if cfg!(debug_assertions) {
            self.entities.check_invariants()?;
        }

        Ok(TickReport {
            tick,
            status: self.status.status(),
            summary,
            cycles_detected,
            victims,
        })
    }

    /// Build the graph, look for cycles and, if detection is on, break them
    fn resolve_deadlocks(&mut self, tick: u64) -> SimResult<(usize, Vec<CustomerId>)> {
        self.graph = WaitForGraph::build(&self.entities);

        // Cycles already on record are tracked whatever the strategy
        let tracking = self.status.status() == SimulationStatus::Deadlock || !self.open_cycles.is_empty();
        let scan = (self.strategy.scans_for_cycles(self.config.safety_model) || tracking)
            && self.status.status() != SimulationStatus::Recovery;
        if !scan {
            self.open_cycles.clear();
            return Ok((0, Vec::new()));
        }

        let cycles = detect_all_cycles(&self.graph);
        if cycles.is_empty() {
            self.open_cycles.clear();
            return Ok((0, Vec::new()));
        }

        let mut fresh = 0;
        for cycle in &cycles {
            if !self.is_fresh(cycle)? {
                continue;
            }
            fresh += 1;
            for member in &cycle.customers {
                self.entities.set_state(*member, CustomerState::Deadlocked)?;
            }
            self.log.record(
                EventKind::Deadlock,
                format!("Deadlock detected: {}", cycle.describe()),
                cycle.victim(),
                cycle.resources.first().copied(),
            );
            self.counters.deadlock_count += 1;
            info!("deadlock at tick {}: {}", tick, cycle.describe());
        }
        if fresh > 0 {
            self.status.enter_deadlock(self.strategy.detection, tick)?;
            if !self.strategy.detection {
                warn!("detection disabled; deadlock at tick {} is permanent", tick);
            }
        }

        if !self.strategy.detection {
            self.open_cycles = cycles;
            self.mark_open_cycles();
            return Ok((fresh, Vec::new()));
        }

        let mut victims = Vec::new();
        for cycle in &cycles {
            if !self.is_still_open(cycle)? {
                continue;
            }
            let outcome = recover(
                cycle,
                &mut self.entities,
                &mut self.log,
                self.config.victim_backoff_ticks,
            )?;
            self.counters.recovery_count += 1;
            victims.push(outcome.victim);
        }
        if !victims.is_empty() {
            self.status.transition(SimulationStatus::Recovery, tick)?;
            self.scheduler.schedule(
                DeferredAction::SettleRecovery,
                tick,
                self.config.recovery_settle_ticks,
            );
        }

        self.open_cycles.clear();
        self.graph = WaitForGraph::build(&self.entities);
        Ok((fresh, victims))
    }

    /// A cycle counts again unless it is the one the status already reflects
    fn is_fresh(&self, cycle: &CycleReport) -> SimResult<bool> {
        if self.status.status() != SimulationStatus::Deadlock {
            return Ok(true);
        }
        for member in &cycle.customers {
            if self.entities.customer(*member)?.state() != CustomerState::Deadlocked {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Every hop of the cycle still waits on a resource held by the next member
    fn is_still_open(&self, cycle: &CycleReport) -> SimResult<bool> {
        for (waiter, resource, holder) in cycle.hops() {
            let waits = self.entities.customer(waiter)?.waiting() == Some(resource);
            let held = self.entities.resource(resource)?.owner() == Some(holder);
            if !waits || !held {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn mark_open_cycles(&mut self) {
        self.graph.clear_cycle_flags();
        for cycle in &self.open_cycles {
            self.graph.mark_cycle(cycle);
        }
    }

    /// Process up to `ticks` ticks, stopping early if the simulation halts
    pub fn run_ticks(&mut self, ticks: u64) -> SimResult<Vec<TickReport>> {
        let mut reports = Vec::new();
        for _ in 0..ticks {
            match self.tick()? {
                Some(report) => reports.push(report),
                None => break,
            }
        }
        Ok(reports)
    }

    /// Play a scripted workload: one directed request or release per tick
    ///
    /// Scripted ticks replace the random allocation pass but still run
    /// detection and recovery, so deadlocks show up exactly as they would
    /// under random load.
    pub fn run_scenario(&mut self, scenario: &Scenario) -> SimResult<Vec<TickReport>> {
        if !self.running {
            self.start()?;
        }
        let mut reports = Vec::with_capacity(scenario.len());
        for step in scenario.steps() {
            let tick = self.begin_tick()?;

            let mut summary = AllocationSummary::default();
            {
                let policy = AllocationPolicy::new(&self.config, self.strategy, self.filter.as_ref());
                match step.action {
                    ScriptAction::Request(resource) => {
                        let outcome = policy.request(
                            step.customer,
                            resource,
                            &mut self.entities,
                            &mut self.log,
                            &mut summary,
                        )?;
                        debug!("{} request {}: {:?}", step.customer, resource, outcome);
                    }
                    ScriptAction::Release(resource) => {
                        if self.entities.customer(step.customer)?.holds(resource) {
                            let settled = policy.release_resource(
                                step.customer,
                                resource,
                                &mut self.entities,
                                &mut self.log,
                                &mut summary,
                            )?;
                            if settled {
                                self.entities.set_state(step.customer, CustomerState::Idle)?;
                            }
                        } else {
                            debug!("{} skips release of {}: not held", step.customer, resource);
                        }
                    }
                }
            }
            reports.push(self.finish_tick(tick, summary)?);
        }
        Ok(reports)
    }

    /// Directed request outside any scenario, routed through the active strategy
    pub fn request(&mut self, customer: CustomerId, resource: ResourceId) -> SimResult<RequestOutcome> {
        let mut summary = AllocationSummary::default();
        let outcome = {
            let policy = AllocationPolicy::new(&self.config, self.strategy, self.filter.as_ref());
            policy.request(customer, resource, &mut self.entities, &mut self.log, &mut summary)?
        };
        self.counters.absorb(&summary);
        self.graph = WaitForGraph::build(&self.entities);
        Ok(outcome)
    }

    /// Directed release; the customer goes idle once it holds nothing
    pub fn release(&mut self, customer: CustomerId, resource: ResourceId) -> SimResult<()> {
        if !self.entities.customer(customer)?.holds(resource) {
            return Err(SimError::NotHeld(customer, resource));
        }
        let mut summary = AllocationSummary::default();
        let settled = {
            let policy = AllocationPolicy::new(&self.config, self.strategy, self.filter.as_ref());
            policy.release_resource(customer, resource, &mut self.entities, &mut self.log, &mut summary)?
        };
        if settled {
            self.entities.set_state(customer, CustomerState::Idle)?;
        }
        self.counters.absorb(&summary);
        self.graph = WaitForGraph::build(&self.entities);
        Ok(())
    }

    // ---- query surface ----

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn customers(&self) -> &[Customer] {
        self.entities.customers()
    }

    pub fn resources(&self) -> &[Resource] {
        self.entities.resources()
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// Event log, newest first
    pub fn events(&self) -> impl Iterator<Item = &SimEvent> {
        self.log.newest_first()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn graph(&self) -> &WaitForGraph {
        &self.graph
    }

    pub fn status(&self) -> SimulationStatus {
        self.status.status()
    }

    /// Deadlock entered with detection off; only stop/reset leaves it
    pub fn is_stuck(&self) -> bool {
        self.status.is_stuck()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn current_tick(&self) -> u64 {
        self.counters.tick
    }

    pub fn strategy(&self) -> StrategyFlags {
        self.strategy
    }

    pub fn participant_filter(&self) -> Option<&BTreeSet<ResourceId>> {
        self.filter.as_ref()
    }

    pub fn load(&self) -> u8 {
        self.load
    }

    pub fn stress_mode(&self) -> bool {
        self.stress_mode
    }

    pub fn open_cycles(&self) -> &[CycleReport] {
        &self.open_cycles
    }

    pub fn pending_deferred(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn performance(&self) -> impl Iterator<Item = &PerformancePoint> {
        self.metrics.performance()
    }

    pub fn contention(&self) -> impl Iterator<Item = &ContentionSample> {
        self.metrics.contention()
    }

    pub fn to_dot(&self) -> String {
        to_dot(&self.graph)
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            tick: self.counters.tick,
            status: self.status.status(),
            stuck: self.status.is_stuck(),
            running: self.running,
            strategy: self.strategy,
            load: self.load,
            stress_mode: self.stress_mode,
            customers: self.entities.customers().to_vec(),
            resources: self.entities.resources().to_vec(),
            events: self.log.newest_first().cloned().collect(),
            graph: self.graph.clone(),
            counters: self.counters,
        }
    }
}

fn default_entities(config: &SimulationConfig) -> EntityStore {
    EntityStore::with_defaults(
        config.initial_customers,
        config.initial_resources,
        config.claim_size,
    )
}
