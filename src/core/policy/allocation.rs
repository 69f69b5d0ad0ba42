use super::ordering::is_order_admissible;
use super::safety::grant_is_safe;
use super::{AllocationMode, StrategyFlags};
use crate::core::entities::{CustomerState, EntityStore};
use crate::core::errors::{SimError, SimResult};
use crate::core::event::{EventKind, EventLog};
use crate::core::execution::config::SimulationConfig;
use crate::core::types::{CustomerId, ResourceId};
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-tick allocation counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub arrivals: u64,
    pub requests: u64,
    pub granted: u64,
    pub denied: u64,
    pub blocked: u64,
    pub released: u64,
}

impl AllocationSummary {
    pub fn absorb(&mut self, other: &AllocationSummary) {
        self.arrivals += other.arrivals;
        self.requests += other.requests;
        self.granted += other.granted;
        self.denied += other.denied;
        self.blocked += other.blocked;
        self.released += other.released;
    }
}

/// Why a directed request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    /// Out of the global acquisition order
    OutOfOrder,
    /// Granting would leave the system unsafe
    Unsafe,
    /// Not part of the customer's declared claim
    OutsideClaim,
    /// Excluded by the participant filter
    Filtered,
}

/// Result of a directed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestOutcome {
    Granted,
    Waiting,
    /// Customer is already blocked and cannot issue another request
    Blocked,
    Denied(DenialReason),
}

fn chance<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    probability > 0.0 && rng.gen::<f64>() < probability
}

/// Per-tick decision procedure for every customer
///
/// Customers act in roster order. For each one the policy may admit it
/// (idle -> running), try to acquire a free resource, block on a held one,
/// and independently release something it holds.
pub struct AllocationPolicy<'a> {
    config: &'a SimulationConfig,
    strategy: StrategyFlags,
    filter: Option<&'a BTreeSet<ResourceId>>,
}

impl<'a> AllocationPolicy<'a> {
    pub fn new(
        config: &'a SimulationConfig,
        strategy: StrategyFlags,
        filter: Option<&'a BTreeSet<ResourceId>>,
    ) -> Self {
        Self {
            config,
            strategy,
            filter,
        }
    }

    fn mode(&self) -> AllocationMode {
        self.strategy.allocation_mode()
    }

    /// Empty or absent filter means every resource participates
    fn eligible(&self, resource: ResourceId) -> bool {
        self.filter
            .map_or(true, |f| f.is_empty() || f.contains(&resource))
    }

    /// Run one allocation pass over the whole roster
    pub fn run_tick<R: Rng + ?Sized>(
        &self,
        store: &mut EntityStore,
        rng: &mut R,
        log: &mut EventLog,
    ) -> SimResult<AllocationSummary> {
        let mut summary = AllocationSummary::default();
        let ids: Vec<CustomerId> = store.customers().iter().map(|c| c.id()).collect();
        for id in ids {
            self.step_customer(id, store, rng, log, &mut summary)?;
        }
        Ok(summary)
    }

    fn step_customer<R: Rng + ?Sized>(
        &self,
        id: CustomerId,
        store: &mut EntityStore,
        rng: &mut R,
        log: &mut EventLog,
        summary: &mut AllocationSummary,
    ) -> SimResult<()> {
        {
            let customer = store.customer_mut(id)?;
            if customer.backoff > 0 {
                customer.backoff -= 1;
                return Ok(());
            }
        }

        match store.customer(id)?.state() {
            CustomerState::Deadlocked => return Ok(()),
            CustomerState::Idle => {
                if !chance(rng, self.config.arrival_probability) {
                    return Ok(());
                }
                store.set_state(id, CustomerState::Running)?;
                summary.arrivals += 1;
                debug!("{} arrived", id);
            }
            CustomerState::Running | CustomerState::Waiting => {}
        }

        let mut granted = false;
        if chance(rng, self.config.acquire_probability) {
            granted = self.try_acquire(id, store, rng, log, summary)?;
        }

        if !granted
            && store.customer(id)?.waiting().is_none()
            && chance(rng, self.config.block_probability)
        {
            self.begin_wait(id, store, rng, log, summary)?;
        }

        if !store.customer(id)?.holding().is_empty() && chance(rng, self.config.release_probability) {
            let held = store.customer(id)?.holding().to_vec();
            if let Some(&target) = held.choose(rng) {
                let settled = self.release_resource(id, target, store, log, summary)?;
                if settled {
                    let next = if chance(rng, self.config.idle_return_probability) {
                        CustomerState::Idle
                    } else {
                        CustomerState::Running
                    };
                    store.set_state(id, next)?;
                }
            }
        }
        Ok(())
    }

    /// Attempt to grab one free resource; returns whether a grant happened
    fn try_acquire<R: Rng + ?Sized>(
        &self,
        id: CustomerId,
        store: &mut EntityStore,
        rng: &mut R,
        log: &mut EventLog,
        summary: &mut AllocationSummary,
    ) -> SimResult<bool> {
        let customer = store.customer(id)?;
        let free: Vec<ResourceId> = store
            .free_resources()
            .map(|r| r.id())
            .filter(|r| !customer.holds(*r) && self.eligible(*r))
            .collect();
        if free.is_empty() {
            return Ok(false);
        }

        let candidates: Vec<ResourceId> = match self.mode() {
            AllocationMode::Opportunistic => free.clone(),
            AllocationMode::Ordered => free
                .iter()
                .copied()
                .filter(|r| is_order_admissible(customer, *r))
                .collect(),
            AllocationMode::SafetyChecked => free
                .iter()
                .copied()
                .filter(|r| customer.claims(*r))
                .collect(),
        };
        let ceiling = customer.max_held_ordinal();

        if self.mode() == AllocationMode::Ordered && candidates.len() < free.len() {
            let name = store.customer(id)?.name().to_string();
            if candidates.is_empty() {
                // Everything free sits below what it already holds
                let wanted = free.choose(rng).copied();
                summary.requests += 1;
                summary.denied += 1;
                log.record(
                    EventKind::Request,
                    format!("{} requested out-of-order resource", name),
                    Some(id),
                    wanted,
                );
                log.record(
                    EventKind::PreventionDecision,
                    format!(
                        "Prevention: {} denied, must acquire above R{}",
                        name,
                        ceiling.unwrap_or(0)
                    ),
                    Some(id),
                    wanted,
                );
                return Ok(false);
            }
            log.record(
                EventKind::PreventionDecision,
                format!(
                    "Prevention: {} restricted to resources above R{}",
                    name,
                    ceiling.unwrap_or(0)
                ),
                Some(id),
                None,
            );
        }

        let Some(&target) = candidates.choose(rng) else {
            return Ok(false);
        };

        let (customer_name, resource_name) = names(store, id, target)?;
        summary.requests += 1;
        log.record(
            EventKind::Request,
            format!("{} requested {}", customer_name, resource_name),
            Some(id),
            Some(target),
        );

        if self.mode() == AllocationMode::SafetyChecked {
            if !grant_is_safe(self.config.safety_model, store, id, target) {
                summary.denied += 1;
                log.record(
                    EventKind::AvoidanceDecision,
                    format!(
                        "Avoidance: denied {} to {} (unsafe state)",
                        resource_name, customer_name
                    ),
                    Some(id),
                    Some(target),
                );
                debug!("{} denied {}: unsafe", id, target);
                return Ok(false);
            }
            log.record(
                EventKind::AvoidanceDecision,
                format!("Avoidance: {} to {} keeps state safe", resource_name, customer_name),
                Some(id),
                Some(target),
            );
        }

        self.grant(id, target, store, log)?;
        summary.granted += 1;
        Ok(true)
    }

    /// Block on a resource held by someone else, if the strategy allows it
    fn begin_wait<R: Rng + ?Sized>(
        &self,
        id: CustomerId,
        store: &mut EntityStore,
        rng: &mut R,
        log: &mut EventLog,
        summary: &mut AllocationSummary,
    ) -> SimResult<()> {
        let customer = store.customer(id)?;
        let mode = self.mode();
        let held: Vec<ResourceId> = store
            .resources()
            .iter()
            .filter(|r| r.is_held_by_other(id) && self.eligible(r.id()))
            .map(|r| r.id())
            .filter(|r| match mode {
                AllocationMode::Opportunistic => true,
                AllocationMode::Ordered => is_order_admissible(customer, *r),
                AllocationMode::SafetyChecked => customer.claims(*r),
            })
            .collect();

        let Some(&target) = held.choose(rng) else {
            return Ok(());
        };
        summary.requests += 1;
        let (customer_name, resource_name) = names(store, id, target)?;
        log.record(
            EventKind::Request,
            format!("{} requested {}", customer_name, resource_name),
            Some(id),
            Some(target),
        );
        self.block(id, target, store, log)?;
        summary.blocked += 1;
        Ok(())
    }

    /// Directed request for a specific resource, routed through the active strategy
    pub fn request(
        &self,
        id: CustomerId,
        target: ResourceId,
        store: &mut EntityStore,
        log: &mut EventLog,
        summary: &mut AllocationSummary,
    ) -> SimResult<RequestOutcome> {
        let customer = store.customer(id)?;
        if customer.holds(target) {
            return Err(SimError::AlreadyHeld(id, target));
        }
        let free = store.resource(target)?.is_free();
        match customer.state() {
            CustomerState::Waiting | CustomerState::Deadlocked => return Ok(RequestOutcome::Blocked),
            CustomerState::Idle => store.set_state(id, CustomerState::Running)?,
            CustomerState::Running => {}
        }

        let (customer_name, resource_name) = names(store, id, target)?;
        summary.requests += 1;
        log.record(
            EventKind::Request,
            format!("{} requested {}", customer_name, resource_name),
            Some(id),
            Some(target),
        );

        if !self.eligible(target) {
            summary.denied += 1;
            log.record(
                EventKind::FilterDecision,
                format!(
                    "Filter: {} is not participating, {} denied",
                    resource_name, customer_name
                ),
                Some(id),
                Some(target),
            );
            return Ok(RequestOutcome::Denied(DenialReason::Filtered));
        }

        let customer = store.customer(id)?;
        match self.mode() {
            AllocationMode::Ordered if !is_order_admissible(customer, target) => {
                summary.denied += 1;
                log.record(
                    EventKind::PreventionDecision,
                    format!(
                        "Prevention: {} may not take {} out of order",
                        customer_name, resource_name
                    ),
                    Some(id),
                    Some(target),
                );
                return Ok(RequestOutcome::Denied(DenialReason::OutOfOrder));
            }
            AllocationMode::SafetyChecked if !customer.claims(target) => {
                summary.denied += 1;
                log.record(
                    EventKind::AvoidanceDecision,
                    format!(
                        "Avoidance: {} is outside the claim of {}",
                        resource_name, customer_name
                    ),
                    Some(id),
                    Some(target),
                );
                return Ok(RequestOutcome::Denied(DenialReason::OutsideClaim));
            }
            _ => {}
        }

        if !free {
            self.block(id, target, store, log)?;
            summary.blocked += 1;
            return Ok(RequestOutcome::Waiting);
        }

        if self.mode() == AllocationMode::SafetyChecked {
            if !grant_is_safe(self.config.safety_model, store, id, target) {
                summary.denied += 1;
                log.record(
                    EventKind::AvoidanceDecision,
                    format!(
                        "Avoidance: denied {} to {} (unsafe state)",
                        resource_name, customer_name
                    ),
                    Some(id),
                    Some(target),
                );
                return Ok(RequestOutcome::Denied(DenialReason::Unsafe));
            }
            log.record(
                EventKind::AvoidanceDecision,
                format!("Avoidance: {} to {} keeps state safe", resource_name, customer_name),
                Some(id),
                Some(target),
            );
        }

        self.grant(id, target, store, log)?;
        summary.granted += 1;
        Ok(RequestOutcome::Granted)
    }

    /// Release `target` and wake its waiters
    ///
    /// Returns true when the customer now holds nothing and is not waiting,
    /// leaving the caller to pick its next state.
    pub fn release_resource(
        &self,
        id: CustomerId,
        target: ResourceId,
        store: &mut EntityStore,
        log: &mut EventLog,
        summary: &mut AllocationSummary,
    ) -> SimResult<bool> {
        store.release(target, id)?;
        summary.released += 1;
        let (customer_name, resource_name) = names(store, id, target)?;
        log.record(
            EventKind::Release,
            format!("{} released {}", customer_name, resource_name),
            Some(id),
            Some(target),
        );

        let woken = store.wake_waiters(target)?;
        if !woken.is_empty() {
            debug!("{} freed, woke {:?}", target, woken);
        }

        let customer = store.customer(id)?;
        Ok(customer.holding().is_empty() && customer.waiting().is_none())
    }

    fn grant(
        &self,
        id: CustomerId,
        target: ResourceId,
        store: &mut EntityStore,
        log: &mut EventLog,
    ) -> SimResult<()> {
        // A blocked customer that obtains something else abandons its wait
        store.clear_wait(id)?;
        store.grant(target, id)?;
        store.set_state(id, CustomerState::Running)?;

        let (customer_name, resource_name) = names(store, id, target)?;
        log.record(
            EventKind::Allocate,
            format!("{} allocated to {}", resource_name, customer_name),
            Some(id),
            Some(target),
        );
        debug!("{} -> {}", target, id);
        Ok(())
    }

    fn block(
        &self,
        id: CustomerId,
        target: ResourceId,
        store: &mut EntityStore,
        log: &mut EventLog,
    ) -> SimResult<()> {
        store.enqueue_wait(target, id)?;
        store.set_state(id, CustomerState::Waiting)?;

        let owner = store
            .resource(target)?
            .owner()
            .ok_or(SimError::WaitOnFreeResource(id, target))?;
        let (customer_name, resource_name) = names(store, id, target)?;
        let owner_name = store.customer(owner)?.name().to_string();
        log.record(
            EventKind::Block,
            format!(
                "{} blocked waiting for {} (held by {})",
                customer_name, resource_name, owner_name
            ),
            Some(id),
            Some(target),
        );
        debug!("{} waits on {} held by {}", id, target, owner);
        Ok(())
    }
}

fn names(store: &EntityStore, customer: CustomerId, resource: ResourceId) -> SimResult<(String, String)> {
    Ok((
        store.customer(customer)?.name().to_string(),
        store.resource(resource)?.name().to_string(),
    ))
}
