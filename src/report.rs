use crate::graph::{Graph, Mode, Node};
use ahash::AHashSet;
use std::fmt::Write;

/// Formats the mode of every node, grouped by group title, into a plain-text report.
pub struct ModeReport;

impl ModeReport {
    /// One section per group in z-order, then a section for nodes outside every group.
    /// A node inside overlapping groups is listed under each of them.
    pub fn format(graph: &Graph) -> String {
        let accessor = graph.accessor();
        let mut grouped = AHashSet::new();
        let mut out = String::new();

        for group in accessor.all_groups() {
            let members = accessor.nodes_in(group);
            let _ = writeln!(out, "[{}]", Self::group_heading(&group.title, &members));
            for node in members {
                grouped.insert(node.id);
                let _ = writeln!(out, "  {}", Self::format_node(node));
            }
        }

        let loose: Vec<&Node> = graph.nodes().filter(|n| !grouped.contains(&n.id)).collect();
        if !loose.is_empty() {
            let _ = writeln!(out, "[ungrouped]");
            for node in loose {
                let _ = writeln!(out, "  {}", Self::format_node(node));
            }
        }
        out
    }

    fn group_heading(title: &str, members: &[&Node]) -> String {
        let active = members.iter().filter(|n| n.mode == Mode::Active).count();
        format!("{} ({}/{} active)", title, active, members.len())
    }

    fn format_node(node: &Node) -> String {
        let mode = match node.mode {
            Mode::Active => "active",
            Mode::Bypassed => "bypassed",
        };
        format!("#{} {} <{}>: {}", node.id, node.title, node.type_tag, mode)
    }
}
