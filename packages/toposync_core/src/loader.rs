//! Loading topology documents from disk
//!
//! Files are JSON, either a single topology document or an array of them,
//! in the canonical format or any format a converter is registered for.
//! The format is auto-detected per document and converted before the
//! topology is built.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::convert::{detect_format, ConvertError, ConverterRegistry};
use crate::topology::{Topology, TopologyError};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("topology file must be a .json file: {0}")]
    NotJson(String),

    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid JSON in {path}: {message}")]
    Parse { path: String, message: String },

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Path of a named topology under the local definitions directory.
pub fn local_topology_path(dir: &Path, name: &str) -> PathBuf {
    dir.join("topologies").join(format!("{}.json", name))
}

/// Load a single topology from a file. Multi-document files are not valid
/// here; use [`load_topology_documents`] for those.
pub fn load_topology_file(
    path: &Path,
    converters: &ConverterRegistry,
) -> Result<Topology, LoadError> {
    let doc = read_json(path)?;
    if doc.is_array() {
        return Err(LoadError::Parse {
            path: path.display().to_string(),
            message: "expected a single topology document, found an array".to_string(),
        });
    }
    convert_document(doc, converters)
}

/// Load every topology in a file, which may hold one document or an array.
pub fn load_topology_documents(
    path: &Path,
    converters: &ConverterRegistry,
) -> Result<Vec<Topology>, LoadError> {
    let doc = read_json(path)?;
    let docs = match doc {
        Value::Array(docs) => docs,
        single => vec![single],
    };
    docs.into_iter()
        .map(|doc| convert_document(doc, converters))
        .collect()
}

/// Write a topology's canonical document under the local definitions
/// directory, creating it as needed. Returns the written path.
pub fn write_topology_file(dir: &Path, topo: &Topology) -> Result<PathBuf, LoadError> {
    let path = local_topology_path(dir, &topo.name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| LoadError::Io {
            path: parent.display().to_string(),
            message: e.to_string(),
        })?;
    }
    let doc = topo.to_document()?;
    let pretty = serde_json::to_string_pretty(&doc).map_err(|e| LoadError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    fs::write(&path, pretty).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(path)
}

fn convert_document(doc: Value, converters: &ConverterRegistry) -> Result<Topology, LoadError> {
    let format = detect_format(&doc);
    let canonical = converters.convert(format, doc)?;
    Ok(Topology::from_document(canonical)?)
}

fn read_json(path: &Path) -> Result<Value, LoadError> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(LoadError::NotJson(path.display().to_string()));
    }

    let data = fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&data).map_err(|e| LoadError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
