//! `toposync bootstrap` - provision a server-side topology's nodes

use anyhow::bail;

use toposync_core::inventory::InventoryService;
use toposync_core::provision::CommandProvisioner;
use toposync_core::reconcile::{ReconcileOptions, Reconciler};
use toposync_core::strategy::CommandPackageStore;

use super::{print_report, App};

pub fn run(app: &App, name: &str, overwrite: bool) -> anyhow::Result<()> {
    let Some(topo) = app.inventory.fetch_topology(name)? else {
        bail!(
            "Topology {} does not exist on the server - use 'toposync create' first",
            name
        );
    };

    let processor = app.strategies.processor_for(&topo)?;
    let provisioner = CommandProvisioner::new(&app.agent);
    let store = CommandPackageStore::new(&app.uploader);
    let opts = ReconcileOptions {
        bootstrap_mode: true,
        overwrite,
        raise_on_failure: app.raise_on_failure,
    };

    // bootstrap never uploads packages; artifact_ctx(false) skips that phase
    let report = Reconciler::new(&app.inventory, &provisioner, opts).run(
        &topo,
        processor.as_ref(),
        &app.artifact_ctx(false),
        &store,
    )?;

    if report.total() == 0 {
        log::info!("No nodes found for topology {}", topo.name);
    }
    print_report(&report, true);
    Ok(())
}
