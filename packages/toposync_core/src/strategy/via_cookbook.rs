//! The via_cookbook strategy
//!
//! Nodes resolve exactly as they do under direct_to_node; what changes is
//! attribute delivery. The processor synthesizes a configuration-package
//! skeleton named from the strategy data (or the topology) and writes a
//! generated attribute file into it, then pushes the package to the
//! remote store when the caller is in upload mode.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::topology::{EffectiveNode, Topology};

use super::attr_file;
use super::{ArtifactContext, PackageStore, Processor, StrategyError};

pub struct ViaCookbookProcessor {
    cookbook: String,
    filename: String,
}

impl ViaCookbookProcessor {
    pub fn new(topo: &Topology) -> Self {
        let data = &topo.strategy_data;
        let cookbook = data
            .get("cookbook")
            .and_then(Value::as_str)
            .unwrap_or(&topo.name)
            .to_string();
        let filename = data
            .get("filename")
            .and_then(Value::as_str)
            .unwrap_or("topology")
            .to_string();
        Self { cookbook, filename }
    }

    pub fn cookbook(&self) -> &str {
        &self.cookbook
    }

    fn package_root(&self, package_dir: &Path) -> PathBuf {
        package_dir.join(&self.cookbook)
    }

    fn attr_file_path(&self, package_dir: &Path) -> PathBuf {
        let mut name = self.filename.clone();
        if !name.ends_with(".rb") {
            name.push_str(".rb");
        }
        self.package_root(package_dir).join("attributes").join(name)
    }

    fn create_skeleton(&self, topo: &Topology, package_dir: &Path) -> Result<(), StrategyError> {
        let root = self.package_root(package_dir);
        fs::create_dir_all(root.join("attributes"))
            .map_err(|e| StrategyError::Artifact(e.to_string()))?;

        let metadata = root.join("metadata.rb");
        if !metadata.exists() {
            let contents = format!(
                "name '{}'\nversion '0.1.0'\ndescription 'Topology attributes for {}'\n",
                self.cookbook, topo.name
            );
            fs::write(metadata, contents).map_err(|e| StrategyError::Artifact(e.to_string()))?;
        }
        Ok(())
    }
}

impl Processor for ViaCookbookProcessor {
    fn generate_nodes(&self, topo: &Topology) -> Result<Vec<EffectiveNode>, StrategyError> {
        Ok(topo.merged_nodes())
    }

    fn generate_artifacts(
        &self,
        topo: &Topology,
        ctx: &ArtifactContext,
    ) -> Result<(), StrategyError> {
        let Some(package_dir) = &ctx.package_dir else {
            log::debug!(
                "no package directory configured - skipping artifacts for {}",
                self.cookbook
            );
            return Ok(());
        };

        self.create_skeleton(topo, package_dir)?;

        let nodes = self.generate_nodes(topo)?;
        let contents = attr_file::render(&topo.name, &nodes, ctx.copyright.as_deref());
        let path = self.attr_file_path(package_dir);
        log::info!("** Creating attribute file: {}", path.display());
        fs::write(path, contents).map_err(|e| StrategyError::Artifact(e.to_string()))?;
        Ok(())
    }

    fn upload_artifacts(
        &self,
        _topo: &Topology,
        ctx: &ArtifactContext,
        store: &dyn PackageStore,
    ) -> Result<(), StrategyError> {
        if !ctx.upload {
            log::debug!("uploads disabled - skipping package {}", self.cookbook);
            return Ok(());
        }
        let Some(package_dir) = &ctx.package_dir else {
            log::debug!(
                "no package directory configured - skipping upload of {}",
                self.cookbook
            );
            return Ok(());
        };

        match store.upload_package(&self.cookbook, &self.package_root(package_dir)) {
            Ok(()) => Ok(()),
            Err(e) if ctx.raise_on_failure => Err(e),
            Err(e) => {
                log::warn!("Upload of package {} exited with error: {}", self.cookbook, e);
                Ok(())
            }
        }
    }
}
