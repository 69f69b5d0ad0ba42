use serde::{Deserialize, Serialize};

/// Stable identifier of a simulated customer (thread)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerId(pub(crate) usize);

impl CustomerId {
    /// Create a customer ID from its roster index
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the customer in the roster
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Stable identifier of a simulated resource (mutex)
///
/// The creation index doubles as the resource's position in the global
/// acquisition order used by prevention mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub(crate) usize);

impl ResourceId {
    /// Create a resource ID from its creation index
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Creation index of the resource
    pub fn index(&self) -> usize {
        self.0
    }

    /// Position in the global acquisition order
    pub fn ordinal(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// A node of the wait-for graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeId {
    Customer(CustomerId),
    Resource(ResourceId),
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeId::Customer(id) => write!(f, "{}", id),
            NodeId::Resource(id) => write!(f, "{}", id),
        }
    }
}

impl From<CustomerId> for NodeId {
    fn from(id: CustomerId) -> Self {
        NodeId::Customer(id)
    }
}

impl From<ResourceId> for NodeId {
    fn from(id: ResourceId) -> Self {
        NodeId::Resource(id)
    }
}
