//! Per-node reconciliation
//!
//! Walks a topology's effective nodes strictly in declared order and turns
//! each into one of five terminal outcomes, driven by the node's
//! provisionability, a remote existence probe, and the caller's overwrite
//! and bootstrap flags. Shared side effects (environment-ensure, artifact
//! upload) complete before any node-level work begins.

pub mod update;

use thiserror::Error;

use crate::inventory::{InventoryError, InventoryService};
use crate::provision::{ProvisionError, ProvisionRequest, Provisioner};
use crate::strategy::{ArtifactContext, PackageStore, Processor, StrategyError};
use crate::topology::{EffectiveNode, Topology};

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("provisioning of node {node} failed: {source}")]
    Provision {
        node: String,
        source: ProvisionError,
    },
}

/// Caller flags steering a reconciliation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Provision new hosts, as opposed to an attributes-only sync.
    pub bootstrap_mode: bool,
    /// Re-provision hosts that already exist.
    pub overwrite: bool,
    /// Abort the whole run on the first provisioning failure instead of
    /// recording it and continuing (debug verbosity).
    pub raise_on_failure: bool,
}

/// Terminal outcome for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Bootstrapped,
    Existed,
    Skipped,
    SkippedSsh,
    Failed,
}

/// Node names grouped by outcome, plus the topology they came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub topology: String,
    pub bootstrapped: Vec<String>,
    pub existed: Vec<String>,
    pub skipped: Vec<String>,
    pub skipped_ssh: Vec<String>,
    pub failed: Vec<String>,
}

impl ReconcileReport {
    pub fn new(topology: String) -> Self {
        Self {
            topology,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: Outcome, name: &str) {
        let bucket = match outcome {
            Outcome::Bootstrapped => &mut self.bootstrapped,
            Outcome::Existed => &mut self.existed,
            Outcome::Skipped => &mut self.skipped,
            Outcome::SkippedSsh => &mut self.skipped_ssh,
            Outcome::Failed => &mut self.failed,
        };
        bucket.push(name.to_string());
    }

    pub fn total(&self) -> usize {
        self.bootstrapped.len()
            + self.existed.len()
            + self.skipped.len()
            + self.skipped_ssh.len()
            + self.failed.len()
    }

    /// Every recorded node name, across all buckets.
    pub fn all_names(&self) -> Vec<&str> {
        self.bootstrapped
            .iter()
            .chain(&self.existed)
            .chain(&self.skipped)
            .chain(&self.skipped_ssh)
            .chain(&self.failed)
            .map(String::as_str)
            .collect()
    }

    /// Rendered summary lines for the end of a run; only non-empty buckets
    /// appear. Message wording depends on the run mode.
    pub fn summary(&self, bootstrap_mode: bool) -> Vec<String> {
        let mut lines = Vec::new();
        let mut line = |names: &[String], template: &str| {
            if !names.is_empty() {
                lines.push(format!(
                    "{} in topology {}",
                    template
                        .replace("%num%", &names.len().to_string())
                        .replace("%list%", &names.join(", ")),
                    self.topology
                ));
            }
        };

        if bootstrap_mode {
            line(&self.bootstrapped, "Bootstrapped %num% nodes [ %list% ]");
            line(
                &self.existed,
                "Updated but did not bootstrap %num% existing nodes [ %list% ] - \
                 specify overwrite to re-bootstrap",
            );
            line(&self.skipped, "Skipped %num% nodes [ %list% ]");
            line(
                &self.skipped_ssh,
                "Did not bootstrap %num% nodes [ %list% ] because they have no ssh_host",
            );
            line(&self.failed, "%num% nodes [ %list% ] failed to bootstrap");
        } else {
            line(&self.existed, "Applied updates (if any) to %num% nodes [ %list% ]");
            line(
                &self.skipped,
                "Skipped %num% nodes [ %list% ] because they do not exist",
            );
            line(&self.bootstrapped, "Bootstrapped %num% nodes [ %list% ]");
            line(&self.skipped_ssh, "Skipped %num% nodes [ %list% ]");
            line(&self.failed, "%num% nodes [ %list% ] failed");
        }
        lines
    }
}

/// Ensure an environment exists in the inventory service, creating it when
/// the read comes back not-found.
pub fn ensure_environment(
    inventory: &dyn InventoryService,
    name: &str,
) -> Result<(), InventoryError> {
    if !inventory.environment_exists(name)? {
        log::info!("Creating environment {}", name);
        inventory.create_environment(name)?;
    }
    Ok(())
}

/// Drives one reconciliation run against the inventory service and the
/// provisioning agent.
pub struct Reconciler<'a> {
    inventory: &'a dyn InventoryService,
    provisioner: &'a dyn Provisioner,
    opts: ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        inventory: &'a dyn InventoryService,
        provisioner: &'a dyn Provisioner,
        opts: ReconcileOptions,
    ) -> Self {
        Self {
            inventory,
            provisioner,
            opts,
        }
    }

    /// Full run: environment-ensure, then artifact upload, then every node
    /// exactly once in declared order, then the report.
    pub fn run(
        &self,
        topo: &Topology,
        processor: &dyn Processor,
        ctx: &ArtifactContext,
        store: &dyn PackageStore,
    ) -> Result<ReconcileReport, ReconcileError> {
        if let Some(environment) = &topo.chef_environment {
            ensure_environment(self.inventory, environment)?;
        }
        processor.upload_artifacts(topo, ctx, store)?;

        let nodes = processor.generate_nodes(topo)?;
        self.run_nodes(topo, &nodes)
    }

    /// Reconcile an already-generated node list.
    pub fn run_nodes(
        &self,
        topo: &Topology,
        nodes: &[EffectiveNode],
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::new(topo.display_name());
        for node in nodes {
            let outcome = self.reconcile_node(node)?;
            report.record(outcome, &node.name);
        }
        Ok(report)
    }

    fn reconcile_node(&self, node: &EffectiveNode) -> Result<Outcome, ReconcileError> {
        if self.opts.bootstrap_mode {
            if !node.is_provisionable() {
                log::info!(
                    "Node {} does not have ssh_host specified - skipping bootstrap",
                    node.name
                );
                return Ok(Outcome::SkippedSsh);
            }
            let exists = self.inventory.node_exists(&node.name)?;
            if !exists || self.opts.overwrite {
                self.bootstrap_node(node, exists)
            } else {
                update::update_node(self.inventory, node)?;
                Ok(Outcome::Existed)
            }
        } else if self.inventory.node_exists(&node.name)? {
            update::update_node(self.inventory, node)?;
            Ok(Outcome::Existed)
        } else {
            Ok(Outcome::Skipped)
        }
    }

    fn bootstrap_node(
        &self,
        node: &EffectiveNode,
        exists: bool,
    ) -> Result<Outcome, ReconcileError> {
        if exists {
            // remove the prior records first so credential refresh does not
            // pick up the stale host
            log::info!("Node {} exists and will be overwritten", node.name);
            self.inventory.delete_node(&node.name)?;
            self.inventory.delete_identity(&node.name)?;
        }

        let Some(request) = ProvisionRequest::from_node(node) else {
            return Ok(Outcome::SkippedSsh);
        };

        log::info!("Bootstrapping node {}", node.name);
        match self.provisioner.provision(&request) {
            Ok(()) => Ok(Outcome::Bootstrapped),
            Err(source) if self.opts.raise_on_failure => Err(ReconcileError::Provision {
                node: node.name.clone(),
                source,
            }),
            Err(e) => {
                log::warn!("bootstrap of node {} exited with error: {}", node.name, e);
                Ok(Outcome::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{MemoryInventory, NodeRecord};
    use crate::topology::NodeSpec;
    use serde_json::json;
    use std::sync::Mutex;

    /// Provisioner double that records requests and can be told to fail.
    #[derive(Default)]
    struct RecordingProvisioner {
        requests: Mutex<Vec<ProvisionRequest>>,
        fail: bool,
    }

    impl Provisioner for RecordingProvisioner {
        fn provision(&self, req: &ProvisionRequest) -> Result<(), ProvisionError> {
            self.requests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(req.clone());
            if self.fail {
                return Err(ProvisionError::AgentFailed("exit status: 1".to_string()));
            }
            Ok(())
        }
    }

    impl RecordingProvisioner {
        fn provisioned_nodes(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .map(|r| r.node_name.clone())
                .collect()
        }
    }

    fn make_test_topology() -> Topology {
        Topology::from_document(json!({
            "id": "topo1",
            "chef_environment": "test",
            "tags": ["topo_tag"],
            "default": {"anAttr": "aValue"},
            "nodes": [
                {"name": "node1", "ssh_host": "10.0.1.2"},
                {
                    "name": "node2",
                    "chef_environment": "dev",
                    "override": {"anotherAttr": "anotherValue"},
                    "tags": ["topo_tag", "second_tag"]
                }
            ]
        }))
        .unwrap()
    }

    fn reconcile(
        inventory: &MemoryInventory,
        provisioner: &RecordingProvisioner,
        opts: ReconcileOptions,
    ) -> ReconcileReport {
        let topo = make_test_topology();
        let nodes = topo.merged_nodes();
        Reconciler::new(inventory, provisioner, opts)
            .run_nodes(&topo, &nodes)
            .unwrap()
    }

    #[test]
    fn test_bootstrap_fresh_node_is_bootstrapped() {
        let inventory = MemoryInventory::new();
        let provisioner = RecordingProvisioner::default();

        let report = reconcile(
            &inventory,
            &provisioner,
            ReconcileOptions {
                bootstrap_mode: true,
                ..ReconcileOptions::default()
            },
        );

        // node1 has an ssh_host and does not exist yet; node2 has no ssh_host
        assert_eq!(report.bootstrapped, vec!["node1"]);
        assert_eq!(report.skipped_ssh, vec!["node2"]);
        assert!(report.failed.is_empty());
        assert_eq!(provisioner.provisioned_nodes(), vec!["node1"]);
    }

    #[test]
    fn test_bootstrap_existing_node_updates_instead() {
        let inventory = MemoryInventory::new();
        inventory.add_environment("test");
        inventory.add_node(NodeRecord::new("node1"));
        let provisioner = RecordingProvisioner::default();

        let report = reconcile(
            &inventory,
            &provisioner,
            ReconcileOptions {
                bootstrap_mode: true,
                ..ReconcileOptions::default()
            },
        );

        assert_eq!(report.existed, vec!["node1"]);
        assert_eq!(report.skipped_ssh, vec!["node2"]);
        // the agent is never invoked for the existing node
        assert!(provisioner.provisioned_nodes().is_empty());
        // and the attributes-only update was applied
        let record = inventory.node("node1").unwrap();
        assert_eq!(record.normal["topo"]["name"], json!("topo1"));
    }

    #[test]
    fn test_overwrite_deletes_then_reprovisions() {
        let inventory = MemoryInventory::new();
        inventory.add_node(NodeRecord::new("node1"));
        let provisioner = RecordingProvisioner::default();

        let report = reconcile(
            &inventory,
            &provisioner,
            ReconcileOptions {
                bootstrap_mode: true,
                overwrite: true,
                ..ReconcileOptions::default()
            },
        );

        assert_eq!(report.bootstrapped, vec!["node1"]);
        assert_eq!(provisioner.provisioned_nodes(), vec!["node1"]);
        // prior inventory and identity records were removed first
        assert!(!inventory.node_exists("node1").unwrap());
        assert!(!inventory.has_identity("node1"));
    }

    #[test]
    fn test_non_bootstrap_missing_node_is_skipped() {
        let inventory = MemoryInventory::new();
        let provisioner = RecordingProvisioner::default();

        let report = reconcile(&inventory, &provisioner, ReconcileOptions::default());

        assert_eq!(report.skipped, vec!["node1", "node2"]);
        assert!(provisioner.provisioned_nodes().is_empty());
        // nothing was ever written
        assert!(!inventory.node_exists("node1").unwrap());
    }

    #[test]
    fn test_non_bootstrap_existing_node_is_updated() {
        let inventory = MemoryInventory::new();
        inventory.add_environment("test");
        inventory.add_node(NodeRecord::new("node2"));
        let provisioner = RecordingProvisioner::default();

        let report = reconcile(&inventory, &provisioner, ReconcileOptions::default());

        assert_eq!(report.existed, vec!["node2"]);
        assert_eq!(report.skipped, vec!["node1"]);
        let record = inventory.node("node2").unwrap();
        assert_eq!(record.chef_environment.as_deref(), Some("dev"));
        assert_eq!(record.tags, vec!["topo_tag", "second_tag"]);
    }

    #[test]
    fn test_no_ssh_host_is_terminal_regardless_of_flags() {
        let inventory = MemoryInventory::new();
        inventory.add_node(NodeRecord::new("node2"));
        let provisioner = RecordingProvisioner::default();

        let report = reconcile(
            &inventory,
            &provisioner,
            ReconcileOptions {
                bootstrap_mode: true,
                overwrite: true,
                ..ReconcileOptions::default()
            },
        );

        assert_eq!(report.skipped_ssh, vec!["node2"]);
        // terminal: the existing record was neither deleted nor updated
        assert!(inventory.node_exists("node2").unwrap());
        assert_eq!(inventory.node("node2").unwrap(), NodeRecord::new("node2"));
    }

    #[test]
    fn test_provision_failure_is_node_local() {
        let inventory = MemoryInventory::new();
        let provisioner = RecordingProvisioner {
            fail: true,
            ..RecordingProvisioner::default()
        };

        let report = reconcile(
            &inventory,
            &provisioner,
            ReconcileOptions {
                bootstrap_mode: true,
                ..ReconcileOptions::default()
            },
        );

        // node1 fails but the run continues to node2
        assert_eq!(report.failed, vec!["node1"]);
        assert_eq!(report.skipped_ssh, vec!["node2"]);
    }

    #[test]
    fn test_provision_failure_aborts_when_raising() {
        let inventory = MemoryInventory::new();
        let provisioner = RecordingProvisioner {
            fail: true,
            ..RecordingProvisioner::default()
        };
        let topo = make_test_topology();
        let nodes = topo.merged_nodes();

        let err = Reconciler::new(
            &inventory,
            &provisioner,
            ReconcileOptions {
                bootstrap_mode: true,
                raise_on_failure: true,
                ..ReconcileOptions::default()
            },
        )
        .run_nodes(&topo, &nodes)
        .unwrap_err();

        assert!(matches!(err, ReconcileError::Provision { node, .. } if node == "node1"));
    }

    #[test]
    fn test_outcome_buckets_partition_the_node_set() {
        let inventory = MemoryInventory::new();
        inventory.add_environment("test");
        inventory.add_node(NodeRecord::new("node1"));
        let provisioner = RecordingProvisioner::default();

        for opts in [
            ReconcileOptions::default(),
            ReconcileOptions {
                bootstrap_mode: true,
                ..ReconcileOptions::default()
            },
            ReconcileOptions {
                bootstrap_mode: true,
                overwrite: true,
                ..ReconcileOptions::default()
            },
        ] {
            let report = reconcile(&inventory, &provisioner, opts);
            let mut names = report.all_names();
            names.sort_unstable();
            assert_eq!(names, vec!["node1", "node2"]);
            assert_eq!(report.total(), 2);
        }
    }

    #[test]
    fn test_run_ensures_environment_before_node_work() {
        let inventory = MemoryInventory::new();
        let provisioner = RecordingProvisioner::default();
        let topo = make_test_topology();
        let processor = crate::strategy::DirectToNodeProcessor;

        struct NoStore;
        impl PackageStore for NoStore {
            fn upload_package(
                &self,
                _name: &str,
                _root: &std::path::Path,
            ) -> Result<(), StrategyError> {
                Ok(())
            }
        }

        let report = Reconciler::new(
            &inventory,
            &provisioner,
            ReconcileOptions {
                bootstrap_mode: true,
                ..ReconcileOptions::default()
            },
        )
        .run(&topo, &processor, &ArtifactContext::default(), &NoStore)
        .unwrap();

        assert!(inventory.has_environment("test"));
        assert_eq!(report.bootstrapped, vec!["node1"]);
    }

    #[test]
    fn test_summary_reports_only_populated_buckets() {
        let mut report = ReconcileReport::new("topo1".to_string());
        report.record(Outcome::Bootstrapped, "node1");
        report.record(Outcome::SkippedSsh, "node2");

        let lines = report.summary(true);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Bootstrapped 1 nodes [ node1 ]"));
        assert!(lines[1].contains("node2"));

        let lines = ReconcileReport::new("topo1".to_string()).summary(false);
        assert!(lines.is_empty());
    }
}
