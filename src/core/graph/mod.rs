pub mod cycle_detector;
pub mod dot;
pub mod wait_for;

pub use cycle_detector::{detect_all_cycles, detect_cycle, CycleReport};
pub use dot::to_dot;
pub use wait_for::{EdgeKind, GraphEdge, GraphNode, NodeKind, WaitForGraph};
