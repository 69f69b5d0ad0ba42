use super::cycle_detector::CycleReport;
use crate::core::entities::EntityStore;
use crate::core::types::{CustomerId, NodeId, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Customer,
    Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// resource -> customer: the resource is owned by the customer
    Holds,
    /// customer -> resource: the customer is blocked on the resource
    Waits,
}

/// Node with display metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    /// Customer state, or "available"/"held" for resources
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    /// Display hint only; the detector's report is authoritative
    pub cycle: bool,
}

/// Projection of current holds and waits over customers and resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitForGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl WaitForGraph {
    /// Derive the graph from entity state; cycle flags start cleared
    pub fn build(store: &EntityStore) -> Self {
        let mut nodes = Vec::with_capacity(store.customers().len() + store.resources().len());
        let mut edges = Vec::new();

        for customer in store.customers() {
            nodes.push(GraphNode {
                id: customer.id().into(),
                label: customer.name().to_string(),
                kind: NodeKind::Customer,
                state: customer.state().to_string(),
            });
        }
        for resource in store.resources() {
            nodes.push(GraphNode {
                id: resource.id().into(),
                label: resource.name().to_string(),
                kind: NodeKind::Resource,
                state: if resource.is_free() { "available" } else { "held" }.to_string(),
            });
        }

        for resource in store.resources() {
            if let Some(owner) = resource.owner() {
                edges.push(GraphEdge {
                    from: resource.id().into(),
                    to: owner.into(),
                    kind: EdgeKind::Holds,
                    cycle: false,
                });
            }
        }
        for customer in store.customers() {
            if let Some(target) = customer.waiting() {
                edges.push(GraphEdge {
                    from: customer.id().into(),
                    to: target.into(),
                    kind: EdgeKind::Waits,
                    cycle: false,
                });
            }
        }

        Self { nodes, edges }
    }

    /// Collapse `customer -waits-> resource -holds-> customer` paths into
    /// direct waits-for edges, keeping the resource that links them.
    pub fn customer_edges(&self) -> BTreeMap<CustomerId, Vec<(ResourceId, CustomerId)>> {
        let mut owners: BTreeMap<ResourceId, Vec<CustomerId>> = BTreeMap::new();
        let mut adjacency: BTreeMap<CustomerId, Vec<(ResourceId, CustomerId)>> = BTreeMap::new();

        for node in &self.nodes {
            if let NodeId::Customer(id) = node.id {
                adjacency.entry(id).or_default();
            }
        }
        for edge in &self.edges {
            if let (EdgeKind::Holds, NodeId::Resource(r), NodeId::Customer(c)) =
                (edge.kind, edge.from, edge.to)
            {
                owners.entry(r).or_default().push(c);
            }
        }
        for edge in &self.edges {
            if let (EdgeKind::Waits, NodeId::Customer(c), NodeId::Resource(r)) =
                (edge.kind, edge.from, edge.to)
            {
                for owner in owners.get(&r).into_iter().flatten() {
                    adjacency.entry(c).or_default().push((r, *owner));
                }
            }
        }
        adjacency
    }

    /// Flag every edge lying on `cycle`
    pub fn mark_cycle(&mut self, cycle: &CycleReport) {
        let hops = cycle.hops();
        for edge in &mut self.edges {
            let on_cycle = hops.iter().any(|(waiter, resource, holder)| match edge.kind {
                EdgeKind::Waits => {
                    edge.from == NodeId::Customer(*waiter) && edge.to == NodeId::Resource(*resource)
                }
                EdgeKind::Holds => {
                    edge.from == NodeId::Resource(*resource) && edge.to == NodeId::Customer(*holder)
                }
            });
            if on_cycle {
                edge.cycle = true;
            }
        }
    }

    pub fn clear_cycle_flags(&mut self) {
        for edge in &mut self.edges {
            edge.cycle = false;
        }
    }

    pub fn cycle_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(|e| e.cycle)
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entities::CustomerState;

    #[test]
    fn test_build_projects_holds_and_waits() {
        let mut store = EntityStore::with_defaults(2, 2, 2);
        let (c0, c1, r0) = (CustomerId::new(0), CustomerId::new(1), ResourceId::new(0));
        store.grant(r0, c0).unwrap();
        store.enqueue_wait(r0, c1).unwrap();
        store.set_state(c1, CustomerState::Waiting).unwrap();

        let graph = WaitForGraph::build(&store);
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.edges_of_kind(EdgeKind::Holds).count(), 1);
        assert_eq!(graph.edges_of_kind(EdgeKind::Waits).count(), 1);
        assert_eq!(graph.cycle_edges().count(), 0);

        let collapsed = graph.customer_edges();
        assert_eq!(collapsed[&c1], vec![(r0, c0)]);
        assert!(collapsed[&c0].is_empty());
    }
}
