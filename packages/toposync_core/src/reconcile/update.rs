//! Attributes-only updates of existing nodes
//!
//! Applies an effective node's data onto the remote record without
//! provisioning: normal attributes deep-merged (tags handled separately),
//! run list replaced wholesale when different, environment set when the
//! node's explicit value differs from the record's, tags unioned in. The
//! record is only saved when something actually changed.

use crate::attr::deep_merge;
use crate::inventory::{InventoryError, InventoryService, NodeRecord};
use crate::topology::EffectiveNode;

use super::ensure_environment;

/// Load, update, and save the remote record for one node. Returns the
/// changed property names, or None when the node has not been created yet.
pub fn update_node(
    inventory: &dyn InventoryService,
    desired: &EffectiveNode,
) -> Result<Option<Vec<&'static str>>, InventoryError> {
    let Some(mut record) = inventory.fetch_node(&desired.name)? else {
        log::debug!("node {} has not been created - nothing to update", desired.name);
        return Ok(None);
    };

    // the target environment must exist before a record can point at it
    if let Some(environment) = &desired.chef_environment {
        if record.chef_environment.as_deref() != Some(environment.as_str()) {
            ensure_environment(inventory, environment)?;
        }
    }

    let updated = apply_updates(&mut record, desired);
    if updated.is_empty() {
        log::info!("No updates found for node {}", record.name);
    } else {
        log::info!("Updating {} on node {}", updated.join(", "), record.name);
        inventory.save_node(&record)?;
    }
    Ok(Some(updated))
}

/// Apply the desired state onto a record, returning which properties
/// changed.
pub fn apply_updates(record: &mut NodeRecord, desired: &EffectiveNode) -> Vec<&'static str> {
    let mut updated = Vec::new();

    // merge the normal attributes (but not tags)
    if let Some(normal) = &desired.buckets.normal {
        let mut incoming = normal.clone();
        incoming.remove("tags");
        let original = record.normal.clone();
        deep_merge(&mut record.normal, &incoming);
        if record.normal != original {
            updated.push("normal");
        }
    }

    // the run list is replaced wholesale, never concatenated
    if !desired.run_list.is_empty() && desired.run_list != record.run_list {
        record.run_list = desired.run_list.clone();
        updated.push("run_list");
    }

    // the node's explicit environment wins over whatever the record has
    if let Some(environment) = &desired.chef_environment {
        if record.chef_environment.as_deref() != Some(environment.as_str()) {
            record.chef_environment = Some(environment.clone());
            updated.push("chef_environment");
        }
    }

    let tags_before = record.tags.len();
    for tag in &desired.tags {
        if !record.tags.contains(tag) {
            record.tags.push(tag.clone());
        }
    }
    if record.tags.len() > tags_before {
        updated.push("tags");
    }

    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::MemoryInventory;
    use crate::topology::NodeSpec;
    use serde_json::json;

    fn make_desired(value: serde_json::Value) -> EffectiveNode {
        serde_json::from_value::<NodeSpec>(value).unwrap()
    }

    fn make_record() -> NodeRecord {
        NodeRecord {
            name: "node1".to_string(),
            chef_environment: Some("prod".to_string()),
            run_list: vec!["recipe[base]".to_string()],
            tags: vec!["existing".to_string()],
            normal: serde_json::from_value(json!({"app": {"port": 80}})).unwrap(),
        }
    }

    #[test]
    fn test_normal_attributes_deep_merge_without_tags() {
        let mut record = make_record();
        let desired = make_desired(json!({
            "name": "node1",
            "normal": {"app": {"debug": true}, "tags": ["sneaky"]}
        }));

        let updated = apply_updates(&mut record, &desired);

        assert_eq!(updated, vec!["normal"]);
        assert_eq!(
            serde_json::to_value(&record.normal).unwrap(),
            json!({"app": {"port": 80, "debug": true}})
        );
    }

    #[test]
    fn test_run_list_replaced_wholesale() {
        let mut record = make_record();
        let desired = make_desired(json!({
            "name": "node1",
            "run_list": ["recipe[base]", "role[web]"]
        }));

        let updated = apply_updates(&mut record, &desired);

        assert_eq!(updated, vec!["run_list"]);
        assert_eq!(record.run_list, vec!["recipe[base]", "role[web]"]);
    }

    #[test]
    fn test_explicit_environment_wins() {
        let mut record = make_record();
        let desired = make_desired(json!({"name": "node1", "chef_environment": "dev"}));

        let updated = apply_updates(&mut record, &desired);

        assert!(updated.contains(&"chef_environment"));
        assert_eq!(record.chef_environment.as_deref(), Some("dev"));
    }

    #[test]
    fn test_tags_union_in() {
        let mut record = make_record();
        let desired = make_desired(json!({"name": "node1", "tags": ["existing", "new"]}));

        let updated = apply_updates(&mut record, &desired);

        assert_eq!(updated, vec!["tags"]);
        assert_eq!(record.tags, vec!["existing", "new"]);
    }

    #[test]
    fn test_no_change_reports_nothing() {
        let mut record = make_record();
        let desired = make_desired(json!({
            "name": "node1",
            "chef_environment": "prod",
            "run_list": ["recipe[base]"],
            "tags": ["existing"],
            "normal": {"app": {"port": 80}}
        }));

        assert!(apply_updates(&mut record, &desired).is_empty());
    }

    #[test]
    fn test_update_node_saves_only_on_change() {
        let inventory = MemoryInventory::new();
        inventory.add_node(make_record());
        inventory.add_environment("prod");

        let desired = make_desired(json!({
            "name": "node1",
            "chef_environment": "dev",
            "normal": {"app": {"debug": true}}
        }));

        let updated = update_node(&inventory, &desired).unwrap().unwrap();
        assert!(updated.contains(&"normal"));
        assert!(updated.contains(&"chef_environment"));

        // the target environment was created before the save
        assert!(inventory.has_environment("dev"));
        let record = inventory.node("node1").unwrap();
        assert_eq!(record.chef_environment.as_deref(), Some("dev"));

        // a second run is a no-op
        let updated = update_node(&inventory, &desired).unwrap().unwrap();
        assert!(updated.is_empty());
    }

    #[test]
    fn test_update_node_tolerates_missing_node() {
        let inventory = MemoryInventory::new();
        let desired = make_desired(json!({"name": "ghost"}));
        assert_eq!(update_node(&inventory, &desired).unwrap(), None);
    }
}
