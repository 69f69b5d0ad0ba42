use super::types::{CustomerId, ResourceId};
use serde::{Deserialize, Serialize};

/// A single scripted move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptAction {
    Request(ResourceId),
    Release(ResourceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub customer: CustomerId,
    pub action: ScriptAction,
}

/// Deterministic workload played one step per tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    name: String,
    steps: Vec<ScriptStep>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn request(mut self, customer: CustomerId, resource: ResourceId) -> Self {
        self.steps.push(ScriptStep {
            customer,
            action: ScriptAction::Request(resource),
        });
        self
    }

    pub fn release(mut self, customer: CustomerId, resource: ResourceId) -> Self {
        self.steps.push(ScriptStep {
            customer,
            action: ScriptAction::Release(resource),
        });
        self
    }

    /// Classic lock-ordering hazard over R0 and R1
    ///
    /// Even customers take R0 then R1, odd customers R1 then R0. Every
    /// customer first takes its first lock, then asks for its second, then
    /// releases both. With two or more customers and nothing preventing it,
    /// the second phase closes a circular wait.
    pub fn crossing_order(customers: usize) -> Self {
        let (r0, r1) = (ResourceId::new(0), ResourceId::new(1));
        let order = |index: usize| if index % 2 == 0 { (r0, r1) } else { (r1, r0) };
        Self::two_phase("crossing-order", customers, order)
    }

    /// Same workload as [`Scenario::crossing_order`], every customer in global order
    pub fn ordered(customers: usize) -> Self {
        let (r0, r1) = (ResourceId::new(0), ResourceId::new(1));
        Self::two_phase("ordered", customers, |_| (r0, r1))
    }

    fn two_phase<F>(name: &str, customers: usize, order: F) -> Self
    where
        F: Fn(usize) -> (ResourceId, ResourceId),
    {
        let ids: Vec<CustomerId> = (0..customers).map(CustomerId::new).collect();
        let mut scenario = Scenario::new(name);
        for (index, id) in ids.iter().enumerate() {
            scenario = scenario.request(*id, order(index).0);
        }
        for (index, id) in ids.iter().enumerate() {
            scenario = scenario.request(*id, order(index).1);
        }
        for (index, id) in ids.iter().enumerate() {
            let (first, second) = order(index);
            scenario = scenario.release(*id, second).release(*id, first);
        }
        scenario
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Smallest roster able to play the script
    pub fn customers_needed(&self) -> usize {
        self.steps
            .iter()
            .map(|s| s.customer.index() + 1)
            .max()
            .unwrap_or(0)
    }
}
