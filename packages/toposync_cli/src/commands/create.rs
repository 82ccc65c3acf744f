//! `toposync create` - create the topology record and reconcile its nodes

use anyhow::{bail, Context};

use toposync_core::inventory::{InventoryError, InventoryService};
use toposync_core::loader;
use toposync_core::provision::CommandProvisioner;
use toposync_core::reconcile::{ReconcileOptions, Reconciler};
use toposync_core::strategy::CommandPackageStore;
use toposync_core::topology::Topology;

use super::{confirm, print_report, App};

pub fn run(
    app: &App,
    name: &str,
    bootstrap: bool,
    overwrite: bool,
    disable_upload: bool,
    yes: bool,
) -> anyhow::Result<()> {
    let path = loader::local_topology_path(&app.dir, name);
    let topo = loader::load_topology_file(&path, &app.converters).with_context(|| {
        format!(
            "cannot load topology {} from {} - use 'toposync import' first",
            name,
            path.display()
        )
    })?;

    // unknown strategies fail here, before any remote work
    let processor = app.strategies.processor_for(&topo)?;

    create_or_confirm_update(app, &topo, yes)?;

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

/// Create the remote record; an existing record becomes a
/// confirm-then-update. Declining leaves remote state untouched.
fn create_or_confirm_update(app: &App, topo: &Topology, yes: bool) -> anyhow::Result<()> {
    match app.inventory.create_topology(topo) {
        Ok(()) => {
            log::info!("Created topology record for {}", topo.display_name());
            Ok(())
        }
        Err(InventoryError::Conflict(_)) => {
            let prompt = match topo.version_string() {
                Some(version) => format!(
                    "Topology {} already exists - do you want to update it to version {}",
                    topo.name, version
                ),
                None => format!(
                    "Topology {} already exists - do you want to update it",
                    topo.name
                ),
            };
            if !confirm(&prompt, yes)? {
                bail!("update of topology {} declined", topo.name);
            }
            app.inventory.update_topology(topo)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
