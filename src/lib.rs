pub mod core;

// Re-export commonly used types
pub use crate::core::entities::{Customer, CustomerState, EntityStore, Resource};
pub use crate::core::errors::{SimError, SimResult};
pub use crate::core::event::{EventKind, EventLog, SimEvent};
pub use crate::core::execution::{
    BatchRunner, ConcurrencyMode, Simulation, SimulationConfig, SimulationSnapshot, TickReport,
};
pub use crate::core::graph::{detect_cycle, CycleReport, WaitForGraph};
pub use crate::core::metrics::Counters;
pub use crate::core::policy::{RequestOutcome, SafetyModel, StrategyFlags, StrategyKind};
pub use crate::core::scenario::Scenario;
pub use crate::core::status::SimulationStatus;
pub use crate::core::types::{CustomerId, ResourceId};
