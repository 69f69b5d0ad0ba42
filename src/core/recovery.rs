use super::entities::{CustomerState, EntityStore};
use super::errors::{SimError, SimResult};
use super::event::{EventKind, EventLog};
use super::graph::CycleReport;
use super::types::{CustomerId, ResourceId};
use log::info;
use serde::{Deserialize, Serialize};

/// What a recovery pass did to break one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryOutcome {
    pub victim: CustomerId,
    pub preempted: Vec<ResourceId>,
    pub woken: Vec<CustomerId>,
}

/// Break `cycle` by preempting every resource of its lowest-id member
///
/// The victim survives: its locks are force-released, its wait is dropped and
/// it returns to `running`, sitting out `backoff_ticks` allocation passes.
/// Customers blocked on the freed resources wake up; the other participants
/// fall back from `deadlocked` to `waiting`.
pub fn recover(
    cycle: &CycleReport,
    store: &mut EntityStore,
    log: &mut EventLog,
    backoff_ticks: u32,
) -> SimResult<RecoveryOutcome> {
    let victim = cycle
        .victim()
        .ok_or_else(|| SimError::BrokenInvariant("recovery on an empty cycle".to_string()))?;
    let victim_name = store.customer(victim)?.name().to_string();

    store.clear_wait(victim)?;
    let held = store.customer(victim)?.holding().to_vec();
    let mut woken = Vec::new();
    for resource in &held {
        store.release(*resource, victim)?;
        let resource_name = store.resource(*resource)?.name().to_string();
        log.record(
            EventKind::Recovery,
            format!("Recovery: preempted {} from {}", resource_name, victim_name),
            Some(victim),
            Some(*resource),
        );
        woken.extend(store.wake_waiters(*resource)?);
    }

    store.set_state(victim, CustomerState::Running)?;
    store.customer_mut(victim)?.backoff = backoff_ticks;

    for member in &cycle.customers {
        if *member != victim && store.customer(*member)?.state() == CustomerState::Deadlocked {
            store.set_state(*member, CustomerState::Waiting)?;
        }
    }

    info!(
        "recovered deadlock {} by preempting {} ({} resources)",
        cycle.describe(),
        victim,
        held.len()
    );
    Ok(RecoveryOutcome {
        victim,
        preempted: held,
        woken,
    })
}
