//! Topology and node document types
//!
//! These mirror the canonical topology JSON. Construction goes through
//! [`Topology::from_document`], which normalizes the raw document: id/name
//! defaulting and folding of the legacy per-node `attributes` map into
//! `normal`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::attr::{deep_merge, AttrMap, PriorityBuckets};

use super::TopologyError;

/// Strategy applied when none is declared: attributes are embedded
/// directly in each host's inventory record.
pub const DEFAULT_STRATEGY: &str = "direct_to_node";

/// Strategy that defers attribute delivery to a generated configuration
/// package.
pub const VIA_COOKBOOK_STRATEGY: &str = "via_cookbook";

/// A topology: a named group of managed hosts plus shared defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topology {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chef_environment: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub strategy: String,
    #[serde(skip_serializing_if = "AttrMap::is_empty")]
    pub strategy_data: AttrMap,
    #[serde(flatten)]
    pub buckets: PriorityBuckets,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "buildid", skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    #[serde(rename = "buildstamp", skip_serializing_if = "Option::is_none")]
    pub build_stamp: Option<String>,
    pub nodes: Vec<NodeSpec>,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            chef_environment: None,
            tags: Vec::new(),
            strategy: DEFAULT_STRATEGY.to_string(),
            strategy_data: AttrMap::new(),
            buckets: PriorityBuckets::default(),
            version: None,
            build_id: None,
            build_stamp: None,
            nodes: Vec::new(),
        }
    }
}

impl Topology {
    /// Build a topology from a canonical JSON document, normalizing it.
    pub fn from_document(doc: Value) -> Result<Self, TopologyError> {
        let mut topo: Topology = serde_json::from_value(doc)
            .map_err(|e| TopologyError::Deserialization(e.to_string()))?;
        topo.normalize()?;
        Ok(topo)
    }

    /// Serialize back to the canonical JSON document.
    pub fn to_document(&self) -> Result<Value, TopologyError> {
        serde_json::to_value(self).map_err(|e| TopologyError::Serialization(e.to_string()))
    }

    /// Normalize a freshly loaded topology. Id and name are each derived
    /// from the other if missing; both missing is an error. Legacy node
    /// `attributes` are folded into `normal` and discarded.
    pub fn normalize(&mut self) -> Result<(), TopologyError> {
        if self.id.is_empty() && self.name.is_empty() {
            return Err(TopologyError::MissingName);
        }
        if self.id.is_empty() {
            self.id = self.name.clone();
        }
        if self.name.is_empty() {
            self.name = self.id.clone();
        }
        for node in &mut self.nodes {
            node.fold_legacy_attributes();
        }
        Ok(())
    }

    /// Version string, `version` plus `-buildid` when both are set.
    pub fn version_string(&self) -> Option<String> {
        self.version.as_ref().map(|version| match &self.build_id {
            Some(build_id) => format!("{}-{}", version, build_id),
            None => version.clone(),
        })
    }

    /// Name plus version, for user-facing messages.
    pub fn display_name(&self) -> String {
        match self.version_string() {
            Some(version) => format!("{} version: {}", self.name, version),
            None => self.name.clone(),
        }
    }

    /// Display name plus build stamp, when one is recorded.
    pub fn display_info(&self) -> String {
        match &self.build_stamp {
            Some(stamp) => format!("{} buildstamp: {}", self.display_name(), stamp),
            None => self.display_name(),
        }
    }

    /// Look up a node spec by name.
    pub fn find_node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// Declarative, pre-merge description of one managed host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "de_ssh_port")]
    pub ssh_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chef_environment: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub run_list: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(flatten)]
    pub buckets: PriorityBuckets,
    /// Legacy synonym for `normal`, folded in at load time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttrMap>,
}

impl NodeSpec {
    /// A node is provisionable only when it declares an `ssh_host`.
    pub fn is_provisionable(&self) -> bool {
        self.ssh_host.is_some()
    }

    /// Merge the legacy `attributes` map into `normal` (attributes win on
    /// conflict) and drop it, so it is never persisted alongside `normal`.
    pub(crate) fn fold_legacy_attributes(&mut self) {
        if let Some(attrs) = self.attributes.take() {
            deep_merge(self.buckets.normal_mut(), &attrs);
        }
    }
}

/// Accept `ssh_port` as either a number or a numeric string; older
/// documents carry it as a string.
fn de_ssh_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("ssh_port out of range: {}", n))),
        Some(Value::String(s)) => s
            .parse::<u16>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid ssh_port: {:?}", s))),
        Some(other) => Err(D::Error::custom(format!("invalid ssh_port: {}", other))),
    }
}
