//! In-process inventory service
//!
//! Backs the reconciliation tests and local experimentation with a plain
//! in-memory store; no network involved. Behaves like the HTTP client:
//! reads return `None`/`false` for missing records, deletes are
//! idempotent, and creating an existing topology record is a conflict.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::topology::Topology;

use super::{InventoryError, InventoryService, NodeRecord};

#[derive(Default)]
struct State {
    nodes: HashMap<String, NodeRecord>,
    identities: HashSet<String>,
    environments: HashSet<String>,
    topologies: HashMap<String, Topology>,
}

#[derive(Default)]
pub struct MemoryInventory {
    state: Mutex<State>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an existing node record.
    pub fn add_node(&self, node: NodeRecord) {
        let mut state = self.lock();
        state.identities.insert(node.name.clone());
        state.nodes.insert(node.name.clone(), node);
    }

    /// Seed an existing environment.
    pub fn add_environment(&self, name: &str) {
        self.lock().environments.insert(name.to_string());
    }

    pub fn node(&self, name: &str) -> Option<NodeRecord> {
        self.lock().nodes.get(name).cloned()
    }

    pub fn has_identity(&self, name: &str) -> bool {
        self.lock().identities.contains(name)
    }

    pub fn has_environment(&self, name: &str) -> bool {
        self.lock().environments.contains(name)
    }
}

impl InventoryService for MemoryInventory {
    fn node_exists(&self, name: &str) -> Result<bool, InventoryError> {
        Ok(self.lock().nodes.contains_key(name))
    }

    fn fetch_node(&self, name: &str) -> Result<Option<NodeRecord>, InventoryError> {
        Ok(self.lock().nodes.get(name).cloned())
    }

    fn save_node(&self, node: &NodeRecord) -> Result<(), InventoryError> {
        self.lock().nodes.insert(node.name.clone(), node.clone());
        Ok(())
    }

    fn delete_node(&self, name: &str) -> Result<(), InventoryError> {
        self.lock().nodes.remove(name);
        Ok(())
    }

    fn delete_identity(&self, name: &str) -> Result<(), InventoryError> {
        self.lock().identities.remove(name);
        Ok(())
    }

    fn environment_exists(&self, name: &str) -> Result<bool, InventoryError> {
        Ok(self.lock().environments.contains(name))
    }

    fn create_environment(&self, name: &str) -> Result<(), InventoryError> {
        self.lock().environments.insert(name.to_string());
        Ok(())
    }

    fn fetch_topology(&self, name: &str) -> Result<Option<Topology>, InventoryError> {
        Ok(self.lock().topologies.get(name).cloned())
    }

    fn create_topology(&self, topo: &Topology) -> Result<(), InventoryError> {
        let mut state = self.lock();
        if state.topologies.contains_key(&topo.id) {
            return Err(InventoryError::Conflict(topo.id.clone()));
        }
        state.topologies.insert(topo.id.clone(), topo.clone());
        Ok(())
    }

    fn update_topology(&self, topo: &Topology) -> Result<(), InventoryError> {
        self.lock().topologies.insert(topo.id.clone(), topo.clone());
        Ok(())
    }

    fn delete_topology(&self, name: &str) -> Result<(), InventoryError> {
        self.lock().topologies.remove(name);
        Ok(())
    }

    fn list_topologies(&self) -> Result<Vec<String>, InventoryError> {
        let mut names: Vec<String> = self.lock().topologies.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_lifecycle() {
        let inventory = MemoryInventory::new();
        assert!(!inventory.node_exists("node1").unwrap());

        inventory.add_node(NodeRecord::new("node1"));
        assert!(inventory.node_exists("node1").unwrap());
        assert!(inventory.has_identity("node1"));

        inventory.delete_node("node1").unwrap();
        inventory.delete_identity("node1").unwrap();
        assert!(!inventory.node_exists("node1").unwrap());
        assert!(!inventory.has_identity("node1"));

        // deletes stay idempotent
        inventory.delete_node("node1").unwrap();
        inventory.delete_identity("node1").unwrap();
    }

    #[test]
    fn test_create_topology_conflicts_on_existing_record() {
        let inventory = MemoryInventory::new();
        let topo = Topology::from_document(serde_json::json!({"id": "topo1"})).unwrap();

        inventory.create_topology(&topo).unwrap();
        let err = inventory.create_topology(&topo).unwrap_err();
        assert!(matches!(err, InventoryError::Conflict(id) if id == "topo1"));

        // update resolves the conflict path
        inventory.update_topology(&topo).unwrap();
        assert_eq!(inventory.list_topologies().unwrap(), vec!["topo1"]);
    }
}
