//! Legacy (v1) topology documents
//!
//! V1 documents express attribute delivery through a top-level
//! `cookbook_attributes` list of per-package blocks instead of the
//! `strategy`/`strategy_data` pair. The converter folds those blocks into
//! the nodes, infers the strategy, and removes the legacy key.

use serde_json::Value;

use crate::attr::{merge_at_key, AttrMap, Priority};
use crate::topology::{DEFAULT_STRATEGY, VIA_COOKBOOK_STRATEGY};

use super::{ConvertError, Converter};

/// Converts legacy v1 documents to the canonical shape.
pub struct V1Converter;

impl Converter for V1Converter {
    fn convert(&self, doc: Value) -> Result<Value, ConvertError> {
        let Value::Object(mut root) = doc else {
            return Err(ConvertError::Invalid("expected a JSON object".to_string()));
        };

        let blocks = cookbook_blocks(&root);
        infer_strategy(&mut root, &blocks);

        let nodes = match root.get("nodes") {
            Some(Value::Array(nodes)) => nodes.clone(),
            _ => Vec::new(),
        };
        let converted: Vec<Value> = nodes
            .iter()
            .map(|node| match node {
                Value::Object(node) => Value::Object(convert_node(node, &blocks)),
                other => other.clone(),
            })
            .collect();
        root.insert("nodes".to_string(), Value::Array(converted));

        root.remove("cookbook_attributes");
        Ok(Value::Object(root))
    }
}

/// The legacy package-attribute blocks, in document order.
fn cookbook_blocks(root: &AttrMap) -> Vec<AttrMap> {
    match root.get("cookbook_attributes") {
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|b| b.as_object().cloned())
            .collect(),
        _ => Vec::new(),
    }
}

/// Default to direct_to_node; the first block that declares conditional
/// entries or populates any priority bucket switches the strategy to
/// via_cookbook and supplies the strategy data. Scanning stops there.
fn infer_strategy(root: &mut AttrMap, blocks: &[AttrMap]) {
    root.insert(
        "strategy".to_string(),
        Value::String(DEFAULT_STRATEGY.to_string()),
    );

    for block in blocks {
        let has_conditionals = matches!(
            block.get("conditional"),
            Some(Value::Array(conds)) if !conds.is_empty()
        );
        let has_buckets = Priority::ALL.iter().any(|p| block.contains_key(p.key()));
        if !has_conditionals && !has_buckets {
            continue;
        }

        let topo_name = root.get("name").cloned().unwrap_or(Value::Null);
        let cookbook = block.get("cookbook").cloned().unwrap_or(topo_name);
        let filename = block
            .get("filename")
            .cloned()
            .unwrap_or_else(|| Value::String("attributes".to_string()));

        root.insert(
            "strategy".to_string(),
            Value::String(VIA_COOKBOOK_STRATEGY.to_string()),
        );
        let mut data = AttrMap::new();
        data.insert("cookbook".to_string(), cookbook);
        data.insert("filename".to_string(), filename);
        root.insert("strategy_data".to_string(), Value::Object(data));
        break;
    }
}

/// Fold every block's buckets into one node, apply matching conditional
/// entries, then resolve the node type.
fn convert_node(node: &AttrMap, blocks: &[AttrMap]) -> AttrMap {
    let mut combined = node.clone();

    for block in blocks {
        merge_buckets(&mut combined, block);

        if let Some(Value::Array(conds)) = block.get("conditional") {
            merge_conditionals(&mut combined, conds);
        }
    }

    if !combined.contains_key("node_type") {
        if let Some(node_type) = node_type_of(node) {
            combined.insert("node_type".to_string(), Value::String(node_type));
        }
    }

    combined
}

/// Merge a block's priority buckets into the node, one bucket at a time in
/// most-authoritative-first order. Block values win over the node's own.
fn merge_buckets(dest: &mut AttrMap, source: &AttrMap) {
    for priority in Priority::ALL.iter().rev() {
        if let Some(Value::Object(bucket)) = source.get(priority.key()) {
            merge_at_key(dest, priority.key(), bucket);
        }
    }
}

/// Apply the conditional entries whose qualifier matches the node's
/// already-resolved `normal.topo` value, in document order.
fn merge_conditionals(combined: &mut AttrMap, conds: &[Value]) {
    let topo_id: AttrMap = combined
        .get("normal")
        .and_then(|n| n.get("topo"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    for cond in conds.iter().filter_map(Value::as_object) {
        let Some(qualifier) = cond.get("qualifier").and_then(Value::as_str) else {
            continue;
        };
        if topo_id.get(qualifier) == cond.get("value") {
            merge_buckets(combined, cond);
        }
    }
}

/// Explicit `node_type` wins; otherwise it is derived from the node's
/// `normal.topo.node_type`.
fn node_type_of(node: &AttrMap) -> Option<String> {
    if let Some(Value::String(node_type)) = node.get("node_type") {
        return Some(node_type.clone());
    }
    node.get("normal")?
        .get("topo")?
        .get("node_type")?
        .as_str()
        .map(str::to_string)
}
