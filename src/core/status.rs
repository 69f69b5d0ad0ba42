use super::errors::{SimError, SimResult};
use serde::{Deserialize, Serialize};

/// System-wide condition of the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    Idle,
    Running,
    Deadlock,
    Recovery,
}

impl std::fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SimulationStatus::Idle => "idle",
            SimulationStatus::Running => "running",
            SimulationStatus::Deadlock => "deadlock",
            SimulationStatus::Recovery => "recovery",
        };
        f.write_str(label)
    }
}

/// Guards the legal status transitions
///
/// `Idle` is only reachable through [`StatusMachine::halt`], which backs the
/// stop and reset controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMachine {
    status: SimulationStatus,
    /// Deadlock entered while detection was disabled; only a reset clears it
    stuck: bool,
    changed_at: u64,
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusMachine {
    pub fn new() -> Self {
        Self {
            status: SimulationStatus::Idle,
            stuck: false,
            changed_at: 0,
        }
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn is_stuck(&self) -> bool {
        self.stuck
    }

    /// Tick of the last status change
    pub fn changed_at(&self) -> u64 {
        self.changed_at
    }

    pub fn can_transition(&self, to: SimulationStatus) -> bool {
        use SimulationStatus::*;
        match (self.status, to) {
            (Idle | Running, Running) => true,
            (Recovery, Running) => true,
            (Idle | Running, Deadlock) => true,
            (Deadlock, Deadlock) => true,
            (Deadlock, Recovery) => true,
            _ => false,
        }
    }

    pub fn transition(&mut self, to: SimulationStatus, tick: u64) -> SimResult<()> {
        if !self.can_transition(to) {
            return Err(SimError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        if self.status != to {
            log::debug!("status {} -> {} at tick {}", self.status, to, tick);
            self.changed_at = tick;
        }
        if to != SimulationStatus::Deadlock {
            self.stuck = false;
        }
        self.status = to;
        Ok(())
    }

    /// Enter `deadlock`, remembering whether recovery can follow
    pub fn enter_deadlock(&mut self, recoverable: bool, tick: u64) -> SimResult<()> {
        self.transition(SimulationStatus::Deadlock, tick)?;
        self.stuck = !recoverable;
        Ok(())
    }

    /// Stop/reset: any state goes to idle
    pub fn halt(&mut self, tick: u64) {
        self.status = SimulationStatus::Idle;
        self.stuck = false;
        self.changed_at = tick;
    }
}
