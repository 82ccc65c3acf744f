//! Command implementations and shared wiring

pub mod bootstrap;
pub mod create;
pub mod delete;
pub mod export;
pub mod import;
pub mod update;

use std::io::{self, Write};
use std::path::PathBuf;

use toposync_core::convert::ConverterRegistry;
use toposync_core::inventory::HttpInventory;
use toposync_core::reconcile::ReconcileReport;
use toposync_core::strategy::{ArtifactContext, StrategyRegistry};

/// Shared collaborators and settings, built once per invocation.
pub struct App {
    pub inventory: HttpInventory,
    pub converters: ConverterRegistry,
    pub strategies: StrategyRegistry,
    pub dir: PathBuf,
    pub agent: String,
    pub uploader: String,
    pub copyright: Option<String>,
    pub raise_on_failure: bool,
}

impl App {
    /// Artifact context rooted at the local package directory.
    pub fn artifact_ctx(&self, upload: bool) -> ArtifactContext {
        ArtifactContext {
            package_dir: Some(self.dir.join("cookbooks")),
            upload,
            raise_on_failure: self.raise_on_failure,
            copyright: self.copyright.clone(),
        }
    }
}

/// Interactive yes/no prompt; `assume_yes` short-circuits it.
pub fn confirm(prompt: &str, assume_yes: bool) -> io::Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    print!("{}? (Y/N) ", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Per-node outcomes are reported once, at the end of a run.
pub fn print_report(report: &ReconcileReport, bootstrap_mode: bool) {
    for line in report.summary(bootstrap_mode) {
        println!("{}", line);
    }
}
