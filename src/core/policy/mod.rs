pub mod allocation;
pub mod ordering;
pub mod safety;

pub use allocation::{AllocationPolicy, AllocationSummary, DenialReason, RequestOutcome};
pub use ordering::is_order_admissible;
pub use safety::{BankerState, SafetyModel};

use serde::{Deserialize, Serialize};

/// Deadlock-handling discipline that can be toggled from the control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Prevention,
    Avoidance,
    Detection,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StrategyKind::Prevention => "prevention",
            StrategyKind::Avoidance => "avoidance",
            StrategyKind::Detection => "detection",
        };
        f.write_str(label)
    }
}

/// How the allocation policy decides a grant this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationMode {
    /// Global lock ordering (prevention)
    Ordered,
    /// Safety check before grant (avoidance)
    SafetyChecked,
    /// Grant whatever is free; may deadlock
    Opportunistic,
}

/// Independently toggleable strategy switches
///
/// When both prevention and avoidance are on, prevention decides grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyFlags {
    pub prevention: bool,
    pub avoidance: bool,
    pub detection: bool,
}

impl Default for StrategyFlags {
    fn default() -> Self {
        Self {
            prevention: false,
            avoidance: false,
            detection: true,
        }
    }
}

impl StrategyFlags {
    pub fn none() -> Self {
        Self {
            prevention: false,
            avoidance: false,
            detection: false,
        }
    }

    pub fn with(mut self, kind: StrategyKind, enabled: bool) -> Self {
        self.set(kind, enabled);
        self
    }

    pub fn set(&mut self, kind: StrategyKind, enabled: bool) {
        match kind {
            StrategyKind::Prevention => self.prevention = enabled,
            StrategyKind::Avoidance => self.avoidance = enabled,
            StrategyKind::Detection => self.detection = enabled,
        }
    }

    pub fn is_enabled(&self, kind: StrategyKind) -> bool {
        match kind {
            StrategyKind::Prevention => self.prevention,
            StrategyKind::Avoidance => self.avoidance,
            StrategyKind::Detection => self.detection,
        }
    }

    pub fn allocation_mode(&self) -> AllocationMode {
        if self.prevention {
            AllocationMode::Ordered
        } else if self.avoidance {
            AllocationMode::SafetyChecked
        } else {
            AllocationMode::Opportunistic
        }
    }

    /// Whether a circular wait can form under these switches
    ///
    /// Prevention and Banker avoidance rule cycles out. The conservative
    /// safety model only vets grants, so waits can still close a cycle and the
    /// detector keeps running.
    pub fn scans_for_cycles(&self, model: SafetyModel) -> bool {
        match self.allocation_mode() {
            AllocationMode::Ordered => false,
            AllocationMode::SafetyChecked => model == SafetyModel::Conservative,
            AllocationMode::Opportunistic => true,
        }
    }
}
