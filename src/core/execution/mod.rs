pub mod batch;
pub mod config;
pub mod scheduler;
pub mod simulation_engine;

// Re-export commonly used types
pub use batch::{BatchOutcome, BatchRunner, BatchSummary};
pub use config::{ConcurrencyMode, SimulationConfig};
pub use scheduler::{ActionHandle, DeferredAction, DeferredScheduler};
pub use simulation_engine::{stress_roster_size, Simulation, SimulationSnapshot, TickReport};
