use crate::core::entities::EntityStore;
use crate::core::types::{CustomerId, ResourceId};
use serde::{Deserialize, Serialize};

/// Which safety test backs avoidance mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyModel {
    /// Full Banker's algorithm over declared maximum claims
    Banker,
    /// Grant only if enough free resources remain for every waiting customer
    Conservative,
}

impl Default for SafetyModel {
    fn default() -> Self {
        SafetyModel::Banker
    }
}

/// Matrices consumed by the Banker's algorithm
///
/// Rows are customers and columns are resources. A customer's maximum demand
/// is its declared claim plus anything it already holds outside that claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankerState {
    available: Vec<u32>,
    allocation: Vec<Vec<u32>>,
    max_demand: Vec<Vec<u32>>,
}

impl BankerState {
    pub fn new(available: Vec<u32>, allocation: Vec<Vec<u32>>, max_demand: Vec<Vec<u32>>) -> Self {
        Self {
            available,
            allocation,
            max_demand,
        }
    }

    pub fn from_entities(store: &EntityStore) -> Self {
        let resource_count = store.resources().len();
        let available = store
            .resources()
            .iter()
            .map(|r| r.max_instances() - r.current_instances())
            .collect();

        let mut allocation = Vec::with_capacity(store.customers().len());
        let mut max_demand = Vec::with_capacity(store.customers().len());
        for customer in store.customers() {
            let mut held = vec![0; resource_count];
            let mut demand = vec![0; resource_count];
            for r in customer.holding() {
                held[r.index()] += 1;
                demand[r.index()] = 1;
            }
            for r in customer.max_claim() {
                demand[r.index()] = 1;
            }
            allocation.push(held);
            max_demand.push(demand);
        }

        Self {
            available,
            allocation,
            max_demand,
        }
    }

    /// The state that would result from granting one instance of `resource`
    pub fn with_grant(&self, customer: CustomerId, resource: ResourceId) -> Self {
        let mut next = self.clone();
        let (c, r) = (customer.index(), resource.index());
        next.available[r] = next.available[r].saturating_sub(1);
        next.allocation[c][r] += 1;
        if next.max_demand[c][r] < next.allocation[c][r] {
            next.max_demand[c][r] = next.allocation[c][r];
        }
        next
    }

    /// Remaining need of customer `c` for resource `r`
    fn need(&self, c: usize, r: usize) -> u32 {
        self.max_demand[c][r].saturating_sub(self.allocation[c][r])
    }

    /// A completion order for every customer, if one exists
    pub fn safe_sequence(&self) -> Option<Vec<CustomerId>> {
        let customers = self.allocation.len();
        let mut work = self.available.clone();
        let mut finished = vec![false; customers];
        let mut sequence = Vec::with_capacity(customers);

        while sequence.len() < customers {
            let mut progressed = false;
            for c in 0..customers {
                if finished[c] {
                    continue;
                }
                let fits = (0..work.len()).all(|r| self.need(c, r) <= work[r]);
                if fits {
                    for (r, slot) in work.iter_mut().enumerate() {
                        *slot += self.allocation[c][r];
                    }
                    finished[c] = true;
                    sequence.push(CustomerId::new(c));
                    progressed = true;
                }
            }
            if !progressed {
                return None;
            }
        }
        Some(sequence)
    }

    pub fn is_safe(&self) -> bool {
        self.safe_sequence().is_some()
    }
}

/// Safety oracle entry point over a hypothetical state
pub fn is_safe(state: &BankerState) -> bool {
    state.is_safe()
}

/// Conservative stand-in: after the grant, at least one free resource must
/// remain per currently waiting customer.
pub fn leaves_capacity_for_waiters(store: &EntityStore) -> bool {
    let free_after = store.free_count().saturating_sub(1);
    free_after >= store.waiting_count()
}

/// Would granting `resource` to `customer` keep the system safe?
pub fn grant_is_safe(
    model: SafetyModel,
    store: &EntityStore,
    customer: CustomerId,
    resource: ResourceId,
) -> bool {
    match model {
        SafetyModel::Banker => BankerState::from_entities(store)
            .with_grant(customer, resource)
            .is_safe(),
        SafetyModel::Conservative => leaves_capacity_for_waiters(store),
    }
}
