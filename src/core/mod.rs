pub mod entities;
pub mod errors;
pub mod event;
pub mod execution;
pub mod graph;
pub mod metrics;
pub mod policy;
pub mod recovery;
pub mod scenario;
pub mod status;
pub mod types;

#[cfg(test)]
mod tests;
