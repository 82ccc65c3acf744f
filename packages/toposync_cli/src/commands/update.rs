//! `toposync update` - push local changes to an existing topology

use anyhow::{bail, Context};

use toposync_core::inventory::InventoryService;
use toposync_core::loader;
use toposync_core::provision::CommandProvisioner;
use toposync_core::reconcile::{ReconcileOptions, Reconciler};
use toposync_core::strategy::CommandPackageStore;

use super::{print_report, App};

pub fn run(
    app: &App,
    name: &str,
    bootstrap: bool,
    overwrite: bool,
    disable_upload: bool,
) -> anyhow::Result<()> {
    if app.inventory.fetch_topology(name)?.is_none() {
        bail!(
            "Topology {} does not exist on the server - use 'toposync create' first",
            name
        );
    }

    let path = loader::local_topology_path(&app.dir, name);
    let topo = loader::load_topology_file(&path, &app.converters).with_context(|| {
        format!(
            "cannot load topology {} from {} - use 'toposync import' first",
            name,
            path.display()
        )
    })?;
    let processor = app.strategies.processor_for(&topo)?;

    app.inventory.update_topology(&topo)?;
    log::info!("Updated topology record for {}", topo.display_name());

    let provisioner = CommandProvisioner::new(&app.agent);
    let store = CommandPackageStore::new(&app.uploader);
    let opts = ReconcileOptions {
        bootstrap_mode: bootstrap,
        overwrite,
        raise_on_failure: app.raise_on_failure,
    };
    let report = Reconciler::new(&app.inventory, &provisioner, opts).run(
        &topo,
        processor.as_ref(),
        &app.artifact_ctx(!disable_upload),
        &store,
    )?;

    print_report(&report, bootstrap);
    Ok(())
}
