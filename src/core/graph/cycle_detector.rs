use super::wait_for::WaitForGraph;
use crate::core::types::{CustomerId, NodeId, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A confirmed circular wait
///
/// `customers[i]` waits on `resources[i]`, which is held by
/// `customers[(i + 1) % len]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub customers: Vec<CustomerId>,
    pub resources: Vec<ResourceId>,
}

impl CycleReport {
    /// Cycle membership as graph nodes, alternating customer and resource
    pub fn nodes(&self) -> Vec<NodeId> {
        self.customers
            .iter()
            .zip(&self.resources)
            .flat_map(|(c, r)| [NodeId::Customer(*c), NodeId::Resource(*r)])
            .collect()
    }

    /// (waiter, resource, holder) triples around the cycle
    pub fn hops(&self) -> Vec<(CustomerId, ResourceId, CustomerId)> {
        let len = self.customers.len();
        (0..len)
            .map(|i| (self.customers[i], self.resources[i], self.customers[(i + 1) % len]))
            .collect()
    }

    pub fn contains(&self, customer: CustomerId) -> bool {
        self.customers.contains(&customer)
    }

    /// Lowest-id participant
    pub fn victim(&self) -> Option<CustomerId> {
        self.customers.iter().min().copied()
    }

    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .customers
            .iter()
            .zip(&self.resources)
            .map(|(c, r)| format!("{} -> {}", c, r))
            .collect();
        if let Some(first) = self.customers.first() {
            parts.push(first.to_string());
        }
        parts.join(" -> ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnStack,
    Done,
}

struct Frame {
    node: CustomerId,
    next_edge: usize,
}

type Adjacency = BTreeMap<CustomerId, Vec<(ResourceId, CustomerId)>>;

/// Iterative DFS over the collapsed customer graph
///
/// Visit marks live only for the duration of the call. Each back edge to a
/// node still on the recursion stack yields one cycle, cut from that node to
/// the top of the stack. Stops after the first cycle when `first_only`.
fn scan(adjacency: &Adjacency, first_only: bool) -> Vec<CycleReport> {
    let mut marks: HashMap<CustomerId, Mark> = HashMap::new();
    let mut cycles = Vec::new();

    for &root in adjacency.keys() {
        if marks.contains_key(&root) {
            continue;
        }

        let mut stack = vec![Frame {
            node: root,
            next_edge: 0,
        }];
        // via[i] is the resource linking stack[i] to stack[i + 1]
        let mut via: Vec<ResourceId> = Vec::new();
        marks.insert(root, Mark::OnStack);

        while let Some(frame) = stack.last_mut() {
            let edges = adjacency.get(&frame.node).map(Vec::as_slice).unwrap_or(&[]);
            if frame.next_edge >= edges.len() {
                marks.insert(frame.node, Mark::Done);
                stack.pop();
                via.pop();
                continue;
            }

            let (resource, next) = edges[frame.next_edge];
            frame.next_edge += 1;

            match marks.get(&next).copied() {
                Some(Mark::OnStack) => {
                    let start = stack
                        .iter()
                        .position(|f| f.node == next)
                        .unwrap_or(0);
                    let customers = stack[start..].iter().map(|f| f.node).collect();
                    let mut resources: Vec<ResourceId> = via[start..].to_vec();
                    resources.push(resource);
                    cycles.push(CycleReport {
                        customers,
                        resources,
                    });
                    if first_only {
                        return cycles;
                    }
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(next, Mark::OnStack);
                    via.push(resource);
                    stack.push(Frame {
                        node: next,
                        next_edge: 0,
                    });
                }
            }
        }
    }
    cycles
}

/// First cycle in the wait-for graph, if any
pub fn detect_cycle(graph: &WaitForGraph) -> Option<CycleReport> {
    scan(&graph.customer_edges(), true).into_iter().next()
}

/// Every cycle reachable through a distinct back edge
pub fn detect_all_cycles(graph: &WaitForGraph) -> Vec<CycleReport> {
    scan(&graph.customer_edges(), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entities::{CustomerState, EntityStore};

    fn wait(store: &mut EntityStore, c: usize, r: usize) {
        store.enqueue_wait(ResourceId::new(r), CustomerId::new(c)).unwrap();
        store.set_state(CustomerId::new(c), CustomerState::Waiting).unwrap();
    }

    fn hold(store: &mut EntityStore, c: usize, r: usize) {
        store.set_state(CustomerId::new(c), CustomerState::Running).unwrap();
        store.grant(ResourceId::new(r), CustomerId::new(c)).unwrap();
    }

    #[test]
    fn test_two_customer_cycle() {
        let mut store = EntityStore::with_defaults(2, 2, 2);
        hold(&mut store, 0, 0);
        hold(&mut store, 1, 1);
        wait(&mut store, 0, 1);
        wait(&mut store, 1, 0);

        let cycle = detect_cycle(&WaitForGraph::build(&store)).expect("cycle");
        assert!(cycle.contains(CustomerId::new(0)));
        assert!(cycle.contains(CustomerId::new(1)));
        assert_eq!(cycle.resources.len(), 2);
        assert_eq!(cycle.victim(), Some(CustomerId::new(0)));
    }

    #[test]
    fn test_chain_without_cycle() {
        let mut store = EntityStore::with_defaults(3, 3, 2);
        hold(&mut store, 0, 0);
        hold(&mut store, 1, 1);
        wait(&mut store, 1, 0);
        wait(&mut store, 2, 1);

        assert_eq!(detect_cycle(&WaitForGraph::build(&store)), None);
    }

    #[test]
    fn test_cycle_excludes_tail_on_stack() {
        // C0 waits into the C1 <-> C2 cycle but is not part of it
        let mut store = EntityStore::with_defaults(3, 3, 2);
        hold(&mut store, 1, 1);
        hold(&mut store, 2, 2);
        wait(&mut store, 0, 1);
        wait(&mut store, 1, 2);
        wait(&mut store, 2, 1);

        let cycle = detect_cycle(&WaitForGraph::build(&store)).expect("cycle");
        assert_eq!(cycle.customers, vec![CustomerId::new(1), CustomerId::new(2)]);
        assert_eq!(cycle.resources, vec![ResourceId::new(2), ResourceId::new(1)]);
    }

    #[test]
    fn test_finds_disjoint_cycles() {
        let mut store = EntityStore::with_defaults(4, 4, 2);
        for i in 0..4 {
            hold(&mut store, i, i);
        }
        wait(&mut store, 0, 1);
        wait(&mut store, 1, 0);
        wait(&mut store, 2, 3);
        wait(&mut store, 3, 2);

        let cycles = detect_all_cycles(&WaitForGraph::build(&store));
        assert_eq!(cycles.len(), 2);
        assert!(cycles[1].contains(CustomerId::new(3)));
    }

    #[test]
    fn test_describe_closes_loop() {
        let report = CycleReport {
            customers: vec![CustomerId::new(0), CustomerId::new(1)],
            resources: vec![ResourceId::new(1), ResourceId::new(0)],
        };
        assert_eq!(report.describe(), "C0 -> R1 -> C1 -> R0 -> C0");
        assert_eq!(report.nodes().len(), 4);
    }
}
