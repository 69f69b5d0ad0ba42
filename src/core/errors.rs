use super::status::SimulationStatus;
use super::types::{CustomerId, ResourceId};

/// Errors raised by the simulation core
///
/// Everything except `InvalidConfig` signals a broken holds/waits invariant,
/// i.e. a logic bug in the allocation policy or the recovery manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    UnknownCustomer(CustomerId),
    UnknownResource(ResourceId),
    AlreadyHeld(CustomerId, ResourceId),
    CapacityExceeded(ResourceId),
    NotHeld(CustomerId, ResourceId),
    WaitOnFreeResource(CustomerId, ResourceId),
    WaitOnOwnResource(CustomerId, ResourceId),
    AlreadyWaiting(CustomerId, ResourceId),
    IllegalTransition {
        from: SimulationStatus,
        to: SimulationStatus,
    },
    BrokenInvariant(String),
    InvalidConfig(String),
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::UnknownCustomer(c) => write!(f, "unknown customer {}", c),
            SimError::UnknownResource(r) => write!(f, "unknown resource {}", r),
            SimError::AlreadyHeld(c, r) => write!(f, "{} already holds {}", c, r),
            SimError::CapacityExceeded(r) => write!(f, "{} is already at capacity", r),
            SimError::NotHeld(c, r) => write!(f, "{} does not hold {}", c, r),
            SimError::WaitOnFreeResource(c, r) => {
                write!(f, "{} cannot wait on free resource {}", c, r)
            }
            SimError::WaitOnOwnResource(c, r) => {
                write!(f, "{} cannot wait on {} which it holds", c, r)
            }
            SimError::AlreadyWaiting(c, r) => write!(f, "{} is already waiting on {}", c, r),
            SimError::IllegalTransition { from, to } => {
                write!(f, "illegal status transition {} -> {}", from, to)
            }
            SimError::BrokenInvariant(msg) => write!(f, "broken invariant: {}", msg),
            SimError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for SimError {}

pub type SimResult<T> = Result<T, SimError>;
