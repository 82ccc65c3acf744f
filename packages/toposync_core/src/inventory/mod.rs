//! Inventory service collaborator
//!
//! The remote service that holds node records, environments, and topology
//! records. Not-found is a normal branch everywhere it means "does not yet
//! exist", so reads return `Option`/`bool` and deletes are idempotent;
//! only conflicts and genuine service failures surface as errors.

pub mod http;
pub mod memory;

pub use http::HttpInventory;
pub use memory::MemoryInventory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attr::AttrMap;
use crate::topology::Topology;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("conflict: {0} already exists")]
    Conflict(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("inventory service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A host's record as stored in the inventory service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chef_environment: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub run_list: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "AttrMap::is_empty")]
    pub normal: AttrMap,
}

impl NodeRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Operations the reconciliation engine needs from the inventory service.
pub trait InventoryService {
    /// Existence probe; a not-found response is `false`.
    fn node_exists(&self, name: &str) -> Result<bool, InventoryError>;

    fn fetch_node(&self, name: &str) -> Result<Option<NodeRecord>, InventoryError>;

    fn save_node(&self, node: &NodeRecord) -> Result<(), InventoryError>;

    /// Idempotent: deleting a node that does not exist is not an error.
    fn delete_node(&self, name: &str) -> Result<(), InventoryError>;

    /// Remove a host's identity/credential record. Idempotent like
    /// [`delete_node`](Self::delete_node).
    fn delete_identity(&self, name: &str) -> Result<(), InventoryError>;

    fn environment_exists(&self, name: &str) -> Result<bool, InventoryError>;

    fn create_environment(&self, name: &str) -> Result<(), InventoryError>;

    fn fetch_topology(&self, name: &str) -> Result<Option<Topology>, InventoryError>;

    /// Create the topology record; racing with a concurrent create surfaces
    /// as [`InventoryError::Conflict`] for the caller to resolve.
    fn create_topology(&self, topo: &Topology) -> Result<(), InventoryError>;

    fn update_topology(&self, topo: &Topology) -> Result<(), InventoryError>;

    fn delete_topology(&self, name: &str) -> Result<(), InventoryError>;

    fn list_topologies(&self) -> Result<Vec<String>, InventoryError>;
}
