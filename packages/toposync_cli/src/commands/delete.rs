//! `toposync delete` - remove a topology record and detach its nodes

use anyhow::bail;
use serde_json::Value;

use toposync_core::inventory::InventoryService;

use super::{confirm, App};

pub fn run(app: &App, name: &str, yes: bool) -> anyhow::Result<()> {
    let Some(topo) = app.inventory.fetch_topology(name)? else {
        log::info!("Topology {} does not exist on the server", name);
        return Ok(());
    };

    let prompt = format!(
        "Do you want to delete topology {} - this does not delete the nodes",
        name
    );
    if !confirm(&prompt, yes)? {
        bail!("delete of topology {} declined", name);
    }

    // remove the topology stamp so searches know the nodes are detached
    for node in &topo.nodes {
        remove_node_stamp(app, &node.name, &topo.name)?;
    }

    app.inventory.delete_topology(&topo.id)?;
    log::info!("Deleted topology {}", name);
    Ok(())
}

fn remove_node_stamp(app: &App, node_name: &str, topo_name: &str) -> anyhow::Result<()> {
    let Some(mut record) = app.inventory.fetch_node(node_name)? else {
        return Ok(());
    };

    let stamped = record
        .normal
        .get("topo")
        .and_then(|t| t.get("name"))
        .and_then(Value::as_str)
        == Some(topo_name);
    if stamped {
        if let Some(Value::Object(topo_id)) = record.normal.get_mut("topo") {
            topo_id.remove("name");
        }
        log::info!("Removing node {} from topology", node_name);
        app.inventory.save_node(&record)?;
    }
    Ok(())
}
