//! Rendering of generated attribute files
//!
//! The via_cookbook strategy writes a package attribute file whose content
//! lists, per node type or per node name, the priority-bucket values to
//! apply at configuration time. One artifact serves the whole topology:
//! typed nodes share a single type-guarded block.

use chrono::{Datelike, Utc};
use serde_json::Value;

use crate::attr::{AttrMap, Priority};
use crate::topology::EffectiveNode;

/// Render the attribute file for a topology's effective nodes.
pub fn render(topo_name: &str, nodes: &[EffectiveNode], copyright: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("#\n");
    out.push_str(&format!("# Topology attributes for {}\n", topo_name));
    if let Some(holder) = copyright {
        out.push_str(&format!(
            "# Copyright (c) {} {}\n",
            Utc::now().year(),
            holder
        ));
    }
    out.push_str("#\n");
    out.push_str("# Generated file; regenerate rather than editing in place.\n");

    let mut seen_types: Vec<&str> = Vec::new();
    for node in nodes {
        let guard = match node_type_of(node) {
            Some(node_type) => {
                if seen_types.contains(&node_type) {
                    continue;
                }
                seen_types.push(node_type);
                format!(
                    "if node['topo'] && node['topo']['node_type'] == '{}'",
                    node_type
                )
            }
            None => format!("if node.name == '{}'", node.name),
        };

        let mut lines = Vec::new();
        for priority in Priority::ALL {
            if let Some(bucket) = node.buckets.get(priority) {
                push_assignments(&mut lines, priority.key(), &mut Vec::new(), bucket);
            }
        }
        if lines.is_empty() {
            continue;
        }

        out.push('\n');
        out.push_str(&guard);
        out.push('\n');
        for line in lines {
            out.push_str("  ");
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str("end\n");
    }

    out
}

/// Explicit `node_type` wins; documents may also carry the type only in
/// the stamped `normal.topo` map.
fn node_type_of(node: &EffectiveNode) -> Option<&str> {
    if let Some(node_type) = &node.node_type {
        return Some(node_type);
    }
    node.buckets
        .normal
        .as_ref()?
        .get("topo")?
        .get("node_type")?
        .as_str()
}

/// One assignment line per leaf value, e.g.
/// `force_override['a']['b'] = "value"`.
fn push_assignments(lines: &mut Vec<String>, bucket: &str, path: &mut Vec<String>, map: &AttrMap) {
    for (key, value) in map {
        path.push(key.clone());
        match value {
            Value::Object(nested) => push_assignments(lines, bucket, path, nested),
            leaf => {
                let subscript: String = path.iter().map(|k| format!("['{}']", k)).collect();
                lines.push(format!("{}{} = {}", bucket, subscript, leaf));
            }
        }
        path.pop();
    }
}
