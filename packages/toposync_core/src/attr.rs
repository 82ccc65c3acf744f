//! Attribute maps and the deep-merge rules applied to them
//!
//! Attributes are arbitrary nested JSON maps grouped into five priority
//! buckets. The buckets only encode the precedence used by the downstream
//! configuration-apply engine; the merge here treats each bucket
//! independently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Nested attribute map, as found in topology and node documents.
pub type AttrMap = serde_json::Map<String, Value>;

/// Deep-merge `overlay` into `base`, in place.
///
/// For a key present in both, two maps recurse; any other combination is
/// replaced wholesale by the overlay value (arrays included). Keys only in
/// `base` are retained, keys only in `overlay` are added.
pub fn deep_merge(base: &mut AttrMap, overlay: &AttrMap) {
    for (key, incoming) in overlay {
        if let Some(Value::Object(existing)) = base.get_mut(key) {
            if let Value::Object(incoming) = incoming {
                deep_merge(existing, incoming);
                continue;
            }
        }
        base.insert(key.clone(), incoming.clone());
    }
}

/// Deep-merge `overlay` into the map stored at `map[key]`, creating the
/// entry if it is absent or replacing it if it is not a map.
pub fn merge_at_key(map: &mut AttrMap, key: &str, overlay: &AttrMap) {
    if let Some(Value::Object(existing)) = map.get_mut(key) {
        deep_merge(existing, overlay);
        return;
    }
    map.insert(key.to_string(), Value::Object(overlay.clone()));
}

/// The five attribute priority levels, least to most authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Default,
    ForceDefault,
    Normal,
    Override,
    ForceOverride,
}

impl Priority {
    /// All priorities in ascending order of authority.
    pub const ALL: [Priority; 5] = [
        Priority::Default,
        Priority::ForceDefault,
        Priority::Normal,
        Priority::Override,
        Priority::ForceOverride,
    ];

    /// The document key for this priority level.
    pub fn key(self) -> &'static str {
        match self {
            Priority::Default => "default",
            Priority::ForceDefault => "force_default",
            Priority::Normal => "normal",
            Priority::Override => "override",
            Priority::ForceOverride => "force_override",
        }
    }
}

/// The five optional priority buckets carried by topologies and nodes.
///
/// Serialized flattened into the parent document, so each bucket appears
/// as a top-level key (`default`, `force_default`, ...) when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityBuckets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<AttrMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_default: Option<AttrMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal: Option<AttrMap>,
    #[serde(default, rename = "override", skip_serializing_if = "Option::is_none")]
    pub override_: Option<AttrMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_override: Option<AttrMap>,
}

impl PriorityBuckets {
    pub fn get(&self, priority: Priority) -> Option<&AttrMap> {
        match priority {
            Priority::Default => self.default.as_ref(),
            Priority::ForceDefault => self.force_default.as_ref(),
            Priority::Normal => self.normal.as_ref(),
            Priority::Override => self.override_.as_ref(),
            Priority::ForceOverride => self.force_override.as_ref(),
        }
    }

    pub fn set(&mut self, priority: Priority, bucket: Option<AttrMap>) {
        match priority {
            Priority::Default => self.default = bucket,
            Priority::ForceDefault => self.force_default = bucket,
            Priority::Normal => self.normal = bucket,
            Priority::Override => self.override_ = bucket,
            Priority::ForceOverride => self.force_override = bucket,
        }
    }

    /// The `normal` bucket, created empty if absent.
    pub fn normal_mut(&mut self) -> &mut AttrMap {
        self.normal.get_or_insert_with(AttrMap::new)
    }

    pub fn is_empty(&self) -> bool {
        Priority::ALL.iter().all(|p| self.get(*p).is_none())
    }

    /// Per-bucket deep merge of `overlay` over `self`, producing a new set
    /// of buckets. `self` is the base and is never modified; each bucket is
    /// cloned before the overlay is merged in.
    pub fn merged_with(&self, overlay: &PriorityBuckets) -> PriorityBuckets {
        let mut out = PriorityBuckets::default();
        for priority in Priority::ALL {
            let merged = match (self.get(priority), overlay.get(priority)) {
                (None, None) => None,
                (Some(base), None) => Some(base.clone()),
                (None, Some(over)) => Some(over.clone()),
                (Some(base), Some(over)) => {
                    let mut merged = base.clone();
                    deep_merge(&mut merged, over);
                    Some(merged)
                }
            };
            out.set(priority, merged);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> AttrMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_deep_merge_recurses_into_maps() {
        let mut base = as_map(json!({"a": {"x": 1, "y": 2}, "keep": true}));
        let overlay = as_map(json!({"a": {"y": 3, "z": 4}}));

        deep_merge(&mut base, &overlay);

        assert_eq!(
            Value::Object(base),
            json!({"a": {"x": 1, "y": 3, "z": 4}, "keep": true})
        );
    }

    #[test]
    fn test_deep_merge_replaces_non_map_values() {
        let mut base = as_map(json!({"a": {"x": 1}, "b": [1, 2, 3]}));
        let overlay = as_map(json!({"a": "scalar", "b": [9]}));

        deep_merge(&mut base, &overlay);

        // Arrays are replaced wholesale, never concatenated
        assert_eq!(Value::Object(base), json!({"a": "scalar", "b": [9]}));
    }

    #[test]
    fn test_deep_merge_map_replaces_scalar() {
        let mut base = as_map(json!({"a": "scalar"}));
        let overlay = as_map(json!({"a": {"x": 1}}));

        deep_merge(&mut base, &overlay);

        assert_eq!(Value::Object(base), json!({"a": {"x": 1}}));
    }

    #[test]
    fn test_merge_at_key_creates_and_merges() {
        let mut map = as_map(json!({}));
        let overlay = as_map(json!({"name": "topo1"}));

        merge_at_key(&mut map, "topo", &overlay);
        assert_eq!(Value::Object(map.clone()), json!({"topo": {"name": "topo1"}}));

        let more = as_map(json!({"node_type": "appserver"}));
        merge_at_key(&mut map, "topo", &more);
        assert_eq!(
            Value::Object(map),
            json!({"topo": {"name": "topo1", "node_type": "appserver"}})
        );
    }

    #[test]
    fn test_priority_order_and_keys() {
        let keys: Vec<&str> = Priority::ALL.iter().map(|p| p.key()).collect();
        assert_eq!(
            keys,
            vec!["default", "force_default", "normal", "override", "force_override"]
        );
    }

    #[test]
    fn test_buckets_merged_with_does_not_touch_base() {
        let mut base = PriorityBuckets::default();
        base.default = Some(as_map(json!({"a": 1})));

        let mut overlay = PriorityBuckets::default();
        overlay.default = Some(as_map(json!({"b": 2})));
        overlay.override_ = Some(as_map(json!({"c": 3})));

        let merged = base.merged_with(&overlay);

        assert_eq!(
            merged.default.as_ref().map(|m| Value::Object(m.clone())),
            Some(json!({"a": 1, "b": 2}))
        );
        assert_eq!(
            merged.override_.as_ref().map(|m| Value::Object(m.clone())),
            Some(json!({"c": 3}))
        );
        // base retains only its own keys
        assert_eq!(
            base.default.as_ref().map(|m| Value::Object(m.clone())),
            Some(json!({"a": 1}))
        );
        assert!(base.override_.is_none());
    }

    #[test]
    fn test_buckets_serde_round_trip() {
        let doc = json!({
            "default": {"a": 1},
            "override": {"b": 2}
        });
        let buckets: PriorityBuckets = serde_json::from_value(doc.clone()).unwrap();
        assert!(buckets.normal.is_none());
        assert_eq!(serde_json::to_value(&buckets).unwrap(), doc);
    }
}
