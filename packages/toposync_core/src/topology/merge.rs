//! Merging topology defaults into nodes
//!
//! Pure functions: topology defaults x node overrides -> effective node.
//! The topology's stored buckets are cloned at the merge boundary, so
//! merging one node can never leak state into the next node's merge.

use serde_json::Value;

use crate::attr::AttrMap;

use super::model::{NodeSpec, Topology};

/// A node spec after topology defaults have been deep-merged in and the
/// topology identity stamped. Same shape as [`NodeSpec`]; the legacy
/// `attributes` field is always empty here.
pub type EffectiveNode = NodeSpec;

impl Topology {
    /// Compute the effective node for one node spec.
    ///
    /// Deterministic and idempotent: re-merging an already-merged node
    /// yields the same result, and the topology itself is never mutated.
    pub fn merge_node(&self, node: &NodeSpec) -> EffectiveNode {
        let mut merged = node.clone();

        merged.buckets = self.buckets.merged_with(&node.buckets);

        // presence rule, not a deep merge: the node's own environment wins
        if merged
            .chef_environment
            .as_deref()
            .map_or(true, str::is_empty)
        {
            merged.chef_environment = self.chef_environment.clone();
        }

        merged.tags = union_tags(&node.tags, &self.tags);

        // Identity stamp, applied after all other merges so it wins over
        // anything the node supplied itself.
        let node_type = merged.node_type.clone();
        let normal = merged.buckets.normal_mut();
        if !matches!(normal.get("topo"), Some(Value::Object(_))) {
            normal.insert("topo".to_string(), Value::Object(AttrMap::new()));
        }
        if let Some(Value::Object(topo_id)) = normal.get_mut("topo") {
            topo_id.insert("name".to_string(), Value::String(self.name.clone()));
            if let Some(node_type) = node_type {
                topo_id.insert("node_type".to_string(), Value::String(node_type));
            }
        }

        merged
    }

    /// Effective nodes for the whole topology, in declared order.
    pub fn merged_nodes(&self) -> Vec<EffectiveNode> {
        self.nodes.iter().map(|node| self.merge_node(node)).collect()
    }
}

/// Tag union: node tags first in their own order, then topology tags not
/// already present. No duplicates.
fn union_tags(node_tags: &[String], topo_tags: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(node_tags.len() + topo_tags.len());
    for tag in node_tags.iter().chain(topo_tags.iter()) {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
    tags
}
