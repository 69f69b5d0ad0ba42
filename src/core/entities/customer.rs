use crate::core::types::{CustomerId, ResourceId};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a simulated customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerState {
    Idle,
    Running,
    Waiting,
    Deadlocked,
}

impl CustomerState {
    /// Whether the customer takes part in allocation this tick
    pub fn is_active(&self) -> bool {
        matches!(self, CustomerState::Running | CustomerState::Waiting)
    }

    /// Whether the customer is blocked on a resource
    pub fn is_blocked(&self) -> bool {
        matches!(self, CustomerState::Waiting | CustomerState::Deadlocked)
    }
}

impl std::fmt::Display for CustomerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CustomerState::Idle => "idle",
            CustomerState::Running => "running",
            CustomerState::Waiting => "waiting",
            CustomerState::Deadlocked => "deadlocked",
        };
        f.write_str(label)
    }
}

/// A simulated concurrent actor competing for resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub(crate) id: CustomerId,
    pub(crate) name: String,
    pub(crate) state: CustomerState,
    pub(crate) holding: Vec<ResourceId>,
    pub(crate) waiting: Option<ResourceId>,
    /// Declared maximum claim used by the Banker safety check
    pub(crate) max_claim: Vec<ResourceId>,
    /// Ticks left before a preempted victim may act again
    pub(crate) backoff: u32,
}

impl Customer {
    pub fn new(id: CustomerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: CustomerState::Idle,
            holding: Vec::new(),
            waiting: None,
            max_claim: Vec::new(),
            backoff: 0,
        }
    }

    pub fn with_claim(mut self, claim: Vec<ResourceId>) -> Self {
        self.max_claim = claim;
        self
    }

    pub fn with_state(mut self, state: CustomerState) -> Self {
        self.state = state;
        self
    }

    pub fn id(&self) -> CustomerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CustomerState {
        self.state
    }

    pub fn holding(&self) -> &[ResourceId] {
        &self.holding
    }

    pub fn waiting(&self) -> Option<ResourceId> {
        self.waiting
    }

    pub fn max_claim(&self) -> &[ResourceId] {
        &self.max_claim
    }

    pub fn holds(&self, resource: ResourceId) -> bool {
        self.holding.contains(&resource)
    }

    pub fn claims(&self, resource: ResourceId) -> bool {
        self.max_claim.contains(&resource)
    }

    /// Highest global-order ordinal among held resources
    pub fn max_held_ordinal(&self) -> Option<usize> {
        self.holding.iter().map(|r| r.ordinal()).max()
    }
}
