use deadlock_sim::core::execution::{BatchRunner, BatchSummary};
use deadlock_sim::core::graph::{detect_cycle, to_dot, EdgeKind};
use deadlock_sim::{
    CustomerId, CustomerState, EntityStore, EventKind, ResourceId, SafetyModel, Scenario,
    Simulation, SimulationConfig, SimulationStatus, StrategyFlags, StrategyKind, WaitForGraph,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two customers holding one resource each and waiting on the other's
fn crossed_store() -> EntityStore {
    let (c0, c1) = (CustomerId::new(0), CustomerId::new(1));
    let (r0, r1) = (ResourceId::new(0), ResourceId::new(1));
    let mut store = EntityStore::with_defaults(2, 2, 2);
    store.grant(r0, c0).unwrap();
    store.grant(r1, c1).unwrap();
    store.enqueue_wait(r1, c0).unwrap();
    store.enqueue_wait(r0, c1).unwrap();
    store
}

#[test]
fn test_detect_cycle_on_crossed_holds() {
    let store = crossed_store();
    let graph = WaitForGraph::build(&store);
    assert_eq!(graph.edges_of_kind(EdgeKind::Holds).count(), 2);
    assert_eq!(graph.edges_of_kind(EdgeKind::Waits).count(), 2);
    assert_eq!(graph.cycle_edges().count(), 0);

    let cycle = detect_cycle(&graph).expect("cycle expected");
    assert!(cycle.contains(CustomerId::new(0)));
    assert!(cycle.contains(CustomerId::new(1)));
    assert_eq!(cycle.victim(), Some(CustomerId::new(0)));
}

#[test]
fn test_wait_chain_is_not_a_cycle() {
    let mut store = EntityStore::with_defaults(3, 3, 1);
    store.grant(ResourceId::new(0), CustomerId::new(0)).unwrap();
    store.grant(ResourceId::new(1), CustomerId::new(1)).unwrap();
    store.enqueue_wait(ResourceId::new(1), CustomerId::new(0)).unwrap();
    assert!(detect_cycle(&WaitForGraph::build(&store)).is_none());
}

#[test]
fn test_public_control_surface() {
    init_logging();
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    assert_eq!(sim.status(), SimulationStatus::Idle);
    assert_eq!(sim.customers().len(), 6);
    assert_eq!(sim.resources().len(), 8);
    assert!(sim.customers().iter().all(|c| c.state() == CustomerState::Idle));

    sim.start().unwrap();
    let reports = sim.run_ticks(50).unwrap();
    assert_eq!(reports.len(), 50);
    assert_eq!(sim.current_tick(), 50);
    assert!(sim.counters().total_requests >= sim.counters().total_granted);

    sim.stop();
    assert!(sim.run_ticks(10).unwrap().is_empty());
    assert_eq!(sim.current_tick(), 50);

    let snapshot = sim.snapshot();
    assert_eq!(snapshot.status, SimulationStatus::Idle);
    assert_eq!(snapshot.events.len(), sim.event_log().len());
    if let (Some(first), Some(last)) = (snapshot.events.first(), snapshot.events.last()) {
        assert!(first.id >= last.id, "events are newest first");
    }

    sim.reset();
    assert_eq!(sim.current_tick(), 0);
    assert!(sim.events().next().is_none());
}

#[test]
fn test_strategy_flags_round_trip_through_controls() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    assert_eq!(sim.strategy(), StrategyFlags::default());
    sim.set_strategy(StrategyKind::Prevention, true);
    sim.set_strategy(StrategyKind::Avoidance, true);
    sim.set_strategy(StrategyKind::Detection, false);
    let flags = sim.strategy();
    assert!(flags.prevention && flags.avoidance && !flags.detection);
    assert!(!flags.scans_for_cycles(SafetyModel::Banker));
    assert!(!flags.scans_for_cycles(SafetyModel::Conservative));
}

#[test]
fn test_crossing_scenario_end_to_end() {
    init_logging();
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    sim.run_scenario(&Scenario::crossing_order(2)).unwrap();

    let kinds: Vec<EventKind> = sim.event_log().oldest_first().map(|e| e.kind).collect();
    let deadlock_at = kinds.iter().position(|k| *k == EventKind::Deadlock).unwrap();
    let recovery_at = kinds.iter().position(|k| *k == EventKind::Recovery).unwrap();
    assert!(deadlock_at < recovery_at);
    assert!(to_dot(sim.graph()).starts_with("digraph RAG"));
}

#[test]
fn test_conservative_avoidance_run() {
    let config = SimulationConfig::default()
        .with_random_seed(Some(0))
        .with_safety_model(SafetyModel::Conservative);
    let mut sim = Simulation::new(config).unwrap();
    sim.set_strategy(StrategyKind::Avoidance, true);
    sim.start().unwrap();
    for report in sim.run_ticks(500).unwrap() {
        assert_eq!(report.victims.len(), report.cycles_detected);
    }
    if sim.status() == SimulationStatus::Running {
        assert!(detect_cycle(&WaitForGraph::build(sim.entities())).is_none());
    }
    let counters = sim.counters();
    assert_eq!(counters.deadlock_count, counters.recovery_count);
    assert!(!sim.is_stuck());
    sim.entities().check_invariants().unwrap();
    assert!(counters.total_granted > 0);
}

#[test]
fn test_batch_runner_compares_strategies() {
    let prevention = StrategyFlags::none().with(StrategyKind::Prevention, true);
    let detection = StrategyFlags::default();
    let outcomes = BatchRunner::new(SimulationConfig::default(), 200)
        .with_seeds(0..6)
        .with_strategies([prevention, detection])
        .run()
        .unwrap();
    assert_eq!(outcomes.len(), 12);

    let prevented = BatchSummary::from_outcomes(outcomes.iter().filter(|o| o.strategy == prevention));
    let detected = BatchSummary::from_outcomes(outcomes.iter().filter(|o| o.strategy == detection));
    assert_eq!(prevented.runs, 6);
    assert_eq!(prevented.deadlocks, 0);
    assert!(outcomes.iter().all(|o| o.live_cycles == 0));
    assert_eq!(detected.deadlocks, detected.recoveries);
    assert_eq!(detected.stuck_runs, 0);
}
