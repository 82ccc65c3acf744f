//! `toposync export` - print topologies as canonical JSON
//!
//! With a topology name, prints the server copy (or a starter template
//! when there is none) with any named nodes' live inventory state merged
//! in. Without one, prints every topology on the server.

use serde_json::{json, Value};

use toposync_core::inventory::{InventoryService, NodeRecord};

use super::App;

pub fn run(app: &App, topo_name: Option<&str>, node_names: &[String]) -> anyhow::Result<()> {
    let export = match topo_name {
        Some(name) => {
            let mut doc = match app.inventory.fetch_topology(name)? {
                Some(topo) => topo.to_document()?,
                None => template(name, node_names.is_empty()),
            };
            for node_name in node_names {
                merge_node_export(app, &mut doc, node_name)?;
            }
            doc
        }
        None => {
            let mut all = Vec::new();
            for name in app.inventory.list_topologies()? {
                if let Some(topo) = app.inventory.fetch_topology(&name)? {
                    all.push(topo.to_document()?);
                }
            }
            Value::Array(all)
        }
    };

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

/// Starter template for a topology that does not exist yet.
fn template(name: &str, with_sample_node: bool) -> Value {
    let nodes = if with_sample_node {
        json!([empty_node("node1")])
    } else {
        json!([])
    };
    json!({
        "id": name,
        "name": name,
        "chef_environment": "_default",
        "tags": [],
        "strategy": "direct_to_node",
        "nodes": nodes
    })
}

fn empty_node(name: &str) -> Value {
    json!({
        "name": name,
        "ssh_host": name,
        "ssh_port": 22,
        "chef_environment": "_default",
        "tags": [],
        "run_list": [],
        "normal": {}
    })
}

/// Replace or append the node's entry with its current inventory state.
fn merge_node_export(app: &App, doc: &mut Value, node_name: &str) -> anyhow::Result<()> {
    let entry = match app.inventory.fetch_node(node_name)? {
        Some(record) => node_export(&record)?,
        None => empty_node(node_name),
    };

    let Some(Value::Array(nodes)) = doc.get_mut("nodes") else {
        return Ok(());
    };
    match nodes
        .iter_mut()
        .find(|n| n.get("name").and_then(Value::as_str) == Some(node_name))
    {
        Some(existing) => *existing = entry,
        None => nodes.push(entry),
    }
    Ok(())
}

fn node_export(record: &NodeRecord) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(record)?)
}
