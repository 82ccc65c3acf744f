//! Topology data model: groups of managed hosts plus shared defaults
//!
//! A topology is a named, versioned group of hosts (nodes) with shared
//! default attributes and tags. Nodes are declarative pre-merge specs; the
//! merge in [`merge`] turns them into effective nodes ready for
//! reconciliation.

pub mod merge;
pub mod model;

pub use merge::EffectiveNode;
pub use model::{NodeSpec, Topology, DEFAULT_STRATEGY, VIA_COOKBOOK_STRATEGY};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("topology has neither a name nor an id")]
    MissingName,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}
