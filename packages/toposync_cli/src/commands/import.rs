//! `toposync import` - normalize topology files into the local store

use std::path::Path;

use anyhow::Context;

use toposync_core::loader;

use super::App;

pub fn run(app: &App, file: &Path, names: &[String]) -> anyhow::Result<()> {
    let topos = loader::load_topology_documents(file, &app.converters)
        .with_context(|| format!("cannot import {}", file.display()))?;

    let mut remaining: Vec<&str> = names.iter().map(String::as_str).collect();
    for topo in &topos {
        if !names.is_empty() {
            match remaining.iter().position(|n| *n == topo.name) {
                Some(pos) => {
                    remaining.remove(pos);
                }
                None => continue,
            }
        }

        let path = loader::write_topology_file(&app.dir, topo)?;
        log::info!("Created topology definition in {}", path.display());

        // generate (but do not upload) any strategy artifacts now, so the
        // package exists before a later create run pushes it
        let processor = app.strategies.processor_for(topo)?;
        processor.generate_artifacts(topo, &app.artifact_ctx(false))?;

        log::info!("Imported topology {}", topo.display_info());
    }

    if !remaining.is_empty() {
        log::warn!(
            "Did not find topologies {} in {}",
            remaining.join(", "),
            file.display()
        );
    }
    log::info!("Import finished");
    Ok(())
}
