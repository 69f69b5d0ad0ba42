use crate::core::types::{CustomerId, ResourceId};
use serde::{Deserialize, Serialize};

/// An exclusively lockable resource, modelled as a single-instance mutex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub(crate) id: ResourceId,
    pub(crate) name: String,
    pub(crate) max_instances: u32,
    pub(crate) current_instances: u32,
    pub(crate) owner: Option<CustomerId>,
    /// Blocked customers in arrival order; display only, grants are not FIFO
    pub(crate) wait_queue: Vec<CustomerId>,
}

impl Resource {
    pub fn new(id: ResourceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            max_instances: 1,
            current_instances: 0,
            owner: None,
            wait_queue: Vec::new(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_instances(&self) -> u32 {
        self.max_instances
    }

    pub fn current_instances(&self) -> u32 {
        self.current_instances
    }

    pub fn owner(&self) -> Option<CustomerId> {
        self.owner
    }

    pub fn wait_queue(&self) -> &[CustomerId] {
        &self.wait_queue
    }

    pub fn is_free(&self) -> bool {
        self.current_instances < self.max_instances
    }

    /// Held by somebody other than `customer`
    pub fn is_held_by_other(&self, customer: CustomerId) -> bool {
        matches!(self.owner, Some(owner) if owner != customer)
    }
}
