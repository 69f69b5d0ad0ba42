use deadlock_sim::core::execution::{BatchRunner, BatchSummary};
use deadlock_sim::{
    ConcurrencyMode, Scenario, SimError, Simulation, SimulationConfig, StrategyFlags,
    StrategyKind,
};

const TICKS: u64 = 500;

fn run_strategy(label: &str, strategy: StrategyFlags) -> Result<(), SimError> {
    let mut sim = Simulation::new(SimulationConfig::default())?;
    for kind in [StrategyKind::Prevention, StrategyKind::Avoidance, StrategyKind::Detection] {
        sim.set_strategy(kind, strategy.is_enabled(kind));
    }
    sim.start()?;
    sim.run_ticks(TICKS)?;

    let counters = sim.counters();
    println!(
        "{:<12} status={:<9} deadlocks={:<3} recoveries={:<3} granted={:<5} denied={:<5} throughput={:.2}{}",
        label,
        sim.status(),
        counters.deadlock_count,
        counters.recovery_count,
        counters.total_granted,
        counters.total_denied,
        counters.throughput(),
        if sim.is_stuck() { "  (stuck)" } else { "" }
    );
    Ok(())
}

fn main() -> Result<(), SimError> {
    env_logger::init();

    println!("=== Deadlock handling over {} ticks ===", TICKS);
    let none = StrategyFlags::none();
    run_strategy("none", none)?;
    run_strategy("prevention", none.with(StrategyKind::Prevention, true))?;
    run_strategy("avoidance", none.with(StrategyKind::Avoidance, true))?;
    run_strategy("detection", StrategyFlags::default())?;

    println!("\n=== Crossing lock order ===");
    let mut sim = Simulation::new(SimulationConfig::default())?;
    for report in sim.run_scenario(&Scenario::crossing_order(2))? {
        println!(
            "tick {:>2}  status={:<9} cycles={} victims={:?}",
            report.tick, report.status, report.cycles_detected, report.victims
        );
    }
    for event in sim.events().take(6) {
        println!("  [{}] {}: {}", event.tick, event.kind.label(), event.message);
    }

    println!("\n=== Batch of 16 seeds per strategy ===");
    let strategies = [
        none,
        none.with(StrategyKind::Prevention, true),
        none.with(StrategyKind::Avoidance, true),
        StrategyFlags::default(),
    ];
    let config = SimulationConfig::default().with_concurrency(ConcurrencyMode::Rayon);
    let outcomes = BatchRunner::new(config, TICKS)
        .with_seeds(0..16)
        .with_strategies(strategies)
        .run()?;
    for strategy in strategies {
        let summary = BatchSummary::from_outcomes(outcomes.iter().filter(|o| o.strategy == strategy));
        println!(
            "{:?}: {:.2} deadlocks/run, {} stuck runs",
            strategy,
            summary.deadlock_rate(),
            summary.stuck_runs
        );
    }
    Ok(())
}
