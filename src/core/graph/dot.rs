use super::wait_for::{EdgeKind, NodeKind, WaitForGraph};

/// Render the graph in Graphviz DOT
///
/// Customers are circles, resources boxes; cycle edges are drawn red and bold.
pub fn to_dot(graph: &WaitForGraph) -> String {
    let mut out = String::from("digraph RAG {\n");

    for node in &graph.nodes {
        let shape = match node.kind {
            NodeKind::Customer => "circle",
            NodeKind::Resource => "box",
        };
        out.push_str(&format!(
            "  {} [shape={}, label=\"{}\\n{}\"];\n",
            node.id, shape, node.label, node.state
        ));
    }

    for edge in &graph.edges {
        let style = match (edge.kind, edge.cycle) {
            (_, true) => " [color=red, style=bold]",
            (EdgeKind::Waits, false) => " [style=dashed]",
            (EdgeKind::Holds, false) => "",
        };
        out.push_str(&format!("  {} -> {}{};\n", edge.from, edge.to, style));
    }

    out.push_str("}\n");
    out
}
