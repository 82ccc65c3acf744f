//! Attribute-delivery strategies
//!
//! A strategy decides how a topology's merged attributes reach its hosts:
//! embedded directly in each host's inventory record, or deferred to a
//! generated configuration package. Every strategy is a [`Processor`]; the
//! registry is a fixed name -> constructor table populated at startup, so
//! an unknown strategy name fails before any remote work begins.

pub mod attr_file;
pub mod via_cookbook;

pub use via_cookbook::ViaCookbookProcessor;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::topology::{EffectiveNode, Topology, DEFAULT_STRATEGY, VIA_COOKBOOK_STRATEGY};

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("{0} is not a known strategy")]
    UnknownStrategy(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("upload of package {0} failed: {1}")]
    Upload(String, String),
}

/// Caller-supplied context for artifact generation and upload.
#[derive(Debug, Clone, Default)]
pub struct ArtifactContext {
    /// Directory configuration packages are generated under. None means
    /// the caller has nowhere to put artifacts and generation is skipped.
    pub package_dir: Option<PathBuf>,
    /// Whether the caller is in upload mode at all.
    pub upload: bool,
    /// Re-raise artifact/upload failures instead of warning and moving on.
    pub raise_on_failure: bool,
    /// Copyright holder named in generated files.
    pub copyright: Option<String>,
}

/// Remote store that configuration packages are pushed to.
pub trait PackageStore {
    fn upload_package(&self, name: &str, root: &Path) -> Result<(), StrategyError>;
}

/// Pushes a package by invoking an external uploader command with the
/// package name and its on-disk root.
pub struct CommandPackageStore {
    program: String,
}

impl CommandPackageStore {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PackageStore for CommandPackageStore {
    fn upload_package(&self, name: &str, root: &Path) -> Result<(), StrategyError> {
        let status = Command::new(&self.program)
            .arg(name)
            .arg(root)
            .status()
            .map_err(|e| StrategyError::Upload(name.to_string(), e.to_string()))?;
        if !status.success() {
            return Err(StrategyError::Upload(
                name.to_string(),
                format!("uploader exited with {}", status),
            ));
        }
        Ok(())
    }
}

/// One attribute-delivery strategy, polymorphic over node generation and
/// the two artifact phases.
pub trait Processor {
    /// The final list of effective nodes for the topology.
    fn generate_nodes(&self, topo: &Topology) -> Result<Vec<EffectiveNode>, StrategyError>;

    /// Produce any on-disk artifacts the strategy needs (no-op for most).
    fn generate_artifacts(&self, topo: &Topology, ctx: &ArtifactContext)
        -> Result<(), StrategyError>;

    /// Push generated artifacts to the remote store. Skips silently when
    /// the caller is not in upload mode.
    fn upload_artifacts(
        &self,
        topo: &Topology,
        ctx: &ArtifactContext,
        store: &dyn PackageStore,
    ) -> Result<(), StrategyError>;
}

/// The default strategy: effective nodes carry their merged attributes
/// directly, and there are no artifacts.
pub struct DirectToNodeProcessor;

impl Processor for DirectToNodeProcessor {
    fn generate_nodes(&self, topo: &Topology) -> Result<Vec<EffectiveNode>, StrategyError> {
        Ok(topo.merged_nodes())
    }

    fn generate_artifacts(
        &self,
        _topo: &Topology,
        _ctx: &ArtifactContext,
    ) -> Result<(), StrategyError> {
        Ok(())
    }

    fn upload_artifacts(
        &self,
        _topo: &Topology,
        _ctx: &ArtifactContext,
        _store: &dyn PackageStore,
    ) -> Result<(), StrategyError> {
        Ok(())
    }
}

type ProcessorCtor = fn(&Topology) -> Box<dyn Processor>;

/// Name -> processor constructor table.
pub struct StrategyRegistry {
    processors: HashMap<String, ProcessorCtor>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut registry = Self {
            processors: HashMap::new(),
        };
        registry.register(DEFAULT_STRATEGY, |_| Box::new(DirectToNodeProcessor));
        registry.register(VIA_COOKBOOK_STRATEGY, |topo| {
            Box::new(ViaCookbookProcessor::new(topo))
        });
        registry
    }
}

impl StrategyRegistry {
    /// Register a processor under a strategy name, replacing any previous
    /// registration.
    pub fn register(&mut self, strategy: &str, ctor: ProcessorCtor) {
        self.processors.insert(strategy.to_string(), ctor);
    }

    pub fn is_known(&self, strategy: &str) -> bool {
        self.processors.contains_key(strategy)
    }

    /// The processor for a topology's declared strategy. Unknown names are
    /// fatal to the run and never retried.
    pub fn processor_for(&self, topo: &Topology) -> Result<Box<dyn Processor>, StrategyError> {
        self.processors
            .get(&topo.strategy)
            .map(|ctor| ctor(topo))
            .ok_or_else(|| StrategyError::UnknownStrategy(topo.strategy.clone()))
    }
}
