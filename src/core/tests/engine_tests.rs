// Tests for the tick driver and its control surface
#[cfg(test)]
mod tests {
    use crate::core::{
        entities::{CustomerState, EntityStore},
        errors::SimError,
        event::EventKind,
        execution::{Simulation, SimulationConfig},
        policy::{DenialReason, RequestOutcome, StrategyFlags, StrategyKind},
        status::SimulationStatus,
        types::{CustomerId, ResourceId},
    };
    use rand::rngs::mock::StepRng;

    const C0: CustomerId = CustomerId(0);
    const C1: CustomerId = CustomerId(1);
    const R0: ResourceId = ResourceId(0);
    const R1: ResourceId = ResourceId(1);

    /// C0 holds R0 and waits on R1; C1 holds R1 and waits on R0
    fn crossed_store() -> EntityStore {
        let mut store = EntityStore::with_defaults(2, 2, 2);
        store.grant(R0, C0).unwrap();
        store.grant(R1, C1).unwrap();
        store.enqueue_wait(R1, C0).unwrap();
        store.enqueue_wait(R0, C1).unwrap();
        store.set_state(C0, CustomerState::Waiting).unwrap();
        store.set_state(C1, CustomerState::Waiting).unwrap();
        store
    }

    /// Every chance succeeds except releases; every random pick takes the first option
    fn crossed_simulation() -> Simulation<StepRng> {
        let config = SimulationConfig::new()
            .with_roster(2, 2)
            .with_probabilities(0.6, 0.7, 0.5, 0.0);
        let mut sim = Simulation::from_entities(config, StepRng::new(0, 0), crossed_store()).unwrap();
        sim.start().unwrap();
        sim
    }

    #[test]
    fn test_detects_and_recovers_in_one_tick() {
        let mut sim = crossed_simulation();

        let report = sim.tick().unwrap().unwrap();
        assert_eq!(report.cycles_detected, 1);
        assert_eq!(report.victims, vec![C0]);
        assert_eq!(report.status, SimulationStatus::Recovery);
        assert_eq!(sim.counters().deadlock_count, 1);
        assert_eq!(sim.counters().recovery_count, 1);

        let kinds: Vec<EventKind> = sim.event_log().for_tick(1).map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Deadlock, EventKind::Recovery]);

        let victim = &sim.customers()[0];
        assert!(victim.holding().is_empty());
        assert_eq!(victim.waiting(), None);
        assert_eq!(victim.state(), CustomerState::Running);
        assert!(sim.resources()[0].is_free());
        assert_eq!(sim.graph().cycle_edges().count(), 0);
    }

    #[test]
    fn test_next_tick_grants_freed_resource() {
        let mut sim = crossed_simulation();
        sim.tick().unwrap();

        // The victim sits out this pass, so C1 picks up R0
        let report = sim.tick().unwrap().unwrap();
        assert_eq!(report.summary.granted, 1);
        assert_eq!(sim.customers()[1].holding(), &[R1, R0]);
        assert_eq!(sim.resources()[0].owner(), Some(C1));
        assert_eq!(sim.status(), SimulationStatus::Recovery);

        // Settle delay of two ticks returns the status to running
        sim.tick().unwrap();
        assert_eq!(sim.status(), SimulationStatus::Running);
        assert_eq!(sim.pending_deferred(), 0);
    }

    #[test]
    fn test_stop_cancels_pending_settle() {
        let mut sim = crossed_simulation();
        sim.tick().unwrap();
        assert_eq!(sim.pending_deferred(), 1);

        sim.stop();
        assert_eq!(sim.pending_deferred(), 0);
        assert_eq!(sim.status(), SimulationStatus::Idle);
        assert!(sim.tick().unwrap().is_none());
        assert_eq!(sim.current_tick(), 1);

        sim.start().unwrap();
        assert_eq!(sim.status(), SimulationStatus::Running);
        for _ in 0..3 {
            sim.tick().unwrap();
            assert_eq!(sim.status(), SimulationStatus::Running);
        }
    }

    #[test]
    fn test_stuck_deadlock_without_detection() {
        let mut sim = crossed_simulation();
        sim.set_strategy(StrategyKind::Detection, false);

        let report = sim.tick().unwrap().unwrap();
        assert_eq!(report.status, SimulationStatus::Deadlock);
        assert!(report.victims.is_empty());
        assert!(sim.is_stuck());
        assert_eq!(sim.open_cycles().len(), 1);
        assert_eq!(sim.graph().cycle_edges().count(), 4);

        sim.run_ticks(5).unwrap();
        assert_eq!(sim.status(), SimulationStatus::Deadlock);
        assert_eq!(sim.counters().deadlock_count, 1);
        assert_eq!(sim.counters().recovery_count, 0);
        assert!(sim
            .customers()
            .iter()
            .all(|c| c.state() == CustomerState::Deadlocked));

        // Turning detection back on lets the stuck cycle recover
        sim.set_strategy(StrategyKind::Detection, true);
        let report = sim.tick().unwrap().unwrap();
        assert_eq!(report.status, SimulationStatus::Recovery);
        assert_eq!(report.victims, vec![C0]);
        assert!(!sim.is_stuck());
        assert_eq!(sim.counters().deadlock_count, 1);
        assert_eq!(sim.counters().recovery_count, 1);
    }

    #[test]
    fn test_stuck_cycle_counts_again_after_restart() {
        let mut sim = crossed_simulation();
        sim.set_strategy(StrategyKind::Detection, false);
        sim.tick().unwrap();

        sim.stop();
        assert!(!sim.is_stuck());
        sim.start().unwrap();
        sim.tick().unwrap();
        assert_eq!(sim.status(), SimulationStatus::Deadlock);
        assert_eq!(sim.counters().deadlock_count, 2);
        assert!(sim.is_stuck());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
        sim.start().unwrap();
        sim.set_strategy(StrategyKind::Avoidance, true);
        sim.toggle_stress_mode();
        sim.run_ticks(80).unwrap();

        sim.reset();
        let first = sim.snapshot();
        sim.reset();
        let second = sim.snapshot();

        assert_eq!(first, second);
        assert_eq!(first, Simulation::new(SimulationConfig::default()).unwrap().snapshot());
        assert_eq!(first.status, SimulationStatus::Idle);
        assert_eq!(first.strategy, StrategyFlags::default());
        assert_eq!(first.customers.len(), 6);
        assert!(first.events.is_empty());
        assert_eq!(first.counters.tick, 0);
        assert!(!sim.is_running());
    }

    #[test]
    fn test_stress_mode_and_load() {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
        assert_eq!(sim.load(), 5);

        assert!(sim.toggle_stress_mode());
        assert_eq!(sim.customers().len(), 9);
        assert!(sim.customers()[6..]
            .iter()
            .all(|c| c.state() == CustomerState::Running));

        assert_eq!(sim.adjust_load(20), 10);
        assert_eq!(sim.customers().len(), 12);
        assert_eq!(sim.adjust_load(-50), 1);
        assert_eq!(sim.customers().len(), 12);

        sim.start().unwrap();
        sim.run_ticks(5).unwrap();
        assert_eq!(sim.contention().count(), 5);
        assert_eq!(sim.performance().count(), 5);
        assert!(sim.contention().all(|s| s.load == 1 && s.participants == 12));

        assert!(!sim.toggle_stress_mode());
        sim.run_ticks(3).unwrap();
        assert_eq!(sim.contention().count(), 5);
        assert_eq!(sim.customers().len(), 12);
    }

    #[test]
    fn test_participant_filter_restricts_allocation() {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
        let only = ResourceId(2);
        sim.set_participant_filter([only]).unwrap();
        sim.start().unwrap();

        for _ in 0..200 {
            sim.tick().unwrap();
            for resource in sim.resources() {
                if resource.id() != only {
                    assert!(resource.is_free(), "{} should stay free", resource.id());
                    assert!(resource.wait_queue().is_empty());
                }
            }
        }
        assert!(sim
            .events()
            .filter(|e| e.kind == EventKind::Allocate)
            .all(|e| e.resource == Some(only)));

        assert_eq!(
            sim.set_participant_filter([ResourceId(99)]),
            Err(SimError::UnknownResource(ResourceId(99)))
        );
        sim.set_participant_filter(std::iter::empty()).unwrap();
        assert!(sim.participant_filter().is_none());
    }

    #[test]
    fn test_directed_request_and_release() {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
        assert_eq!(sim.request(C0, R0).unwrap(), RequestOutcome::Granted);
        assert_eq!(sim.request(C1, R0).unwrap(), RequestOutcome::Waiting);
        assert_eq!(sim.request(C1, R1).unwrap(), RequestOutcome::Blocked);
        assert_eq!(sim.customers()[1].state(), CustomerState::Waiting);

        sim.release(C0, R0).unwrap();
        assert_eq!(sim.customers()[0].state(), CustomerState::Idle);
        assert_eq!(sim.customers()[1].state(), CustomerState::Running);
        assert_eq!(sim.customers()[1].waiting(), None);
        assert_eq!(sim.release(C0, R0), Err(SimError::NotHeld(C0, R0)));

        let counters = sim.counters();
        assert_eq!(counters.total_requests, 2);
        assert_eq!(counters.total_granted, 1);
        assert_eq!(counters.total_blocked, 1);
        assert_eq!(counters.total_released, 1);
    }

    #[test]
    fn test_filtered_request_is_logged() {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
        sim.set_participant_filter([R1]).unwrap();

        assert_eq!(
            sim.request(C0, R0).unwrap(),
            RequestOutcome::Denied(DenialReason::Filtered)
        );
        let newest = sim.events().next().unwrap();
        assert_eq!(newest.kind, EventKind::FilterDecision);
        assert_eq!(newest.customer, Some(C0));
        assert_eq!(newest.resource, Some(R0));
        assert_eq!(sim.counters().total_denied, 1);
        assert!(sim.resources()[0].is_free());
    }

    #[test]
    fn test_run_ticks_does_not_preallocate() {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
        assert!(sim.run_ticks(u64::MAX).unwrap().is_empty());
        assert_eq!(sim.current_tick(), 0);
    }

    #[test]
    fn test_dot_export_marks_stuck_cycle() {
        let mut sim = crossed_simulation();
        sim.set_strategy(StrategyKind::Detection, false);
        sim.tick().unwrap();
        let dot = sim.to_dot();
        assert!(dot.starts_with("digraph RAG {"));
        assert!(dot.contains("color=red"));
    }
}
