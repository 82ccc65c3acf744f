//! Format converters: normalize external documents into topology JSON
//!
//! Converters run once, at load time, before a [`Topology`] is built.
//! The registry is a fixed name -> constructor table populated at startup;
//! an unknown format identifier fails validation before any work begins.
//!
//! [`Topology`]: crate::topology::Topology

pub mod v1;

pub use v1::V1Converter;

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

/// Format identifier for documents already in the canonical shape.
pub const DEFAULT_FORMAT: &str = "default";

/// Alternate identifier for the canonical shape.
pub const TOPO_FORMAT: &str = "topo";

/// Format identifier for the legacy v1 shape.
pub const V1_FORMAT: &str = "topo_v1";

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{0} is not a known format for the topology file")]
    UnknownFormat(String),

    #[error("invalid topology document: {0}")]
    Invalid(String),
}

/// Normalizes a document in one external format into the canonical shape.
pub trait Converter {
    fn convert(&self, doc: Value) -> Result<Value, ConvertError>;
}

/// Converter for documents already in the canonical format.
pub struct IdentityConverter;

impl Converter for IdentityConverter {
    fn convert(&self, doc: Value) -> Result<Value, ConvertError> {
        Ok(doc)
    }
}

type ConverterCtor = fn() -> Box<dyn Converter>;

/// Name -> converter constructor table.
pub struct ConverterRegistry {
    converters: HashMap<String, ConverterCtor>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        let mut registry = Self {
            converters: HashMap::new(),
        };
        registry.register(DEFAULT_FORMAT, || Box::new(IdentityConverter));
        registry.register(TOPO_FORMAT, || Box::new(IdentityConverter));
        registry.register(V1_FORMAT, || Box::new(V1Converter));
        registry
    }
}

impl ConverterRegistry {
    /// Register a converter under a format name, replacing any previous
    /// registration.
    pub fn register(&mut self, format: &str, ctor: ConverterCtor) {
        self.converters.insert(format.to_string(), ctor);
    }

    pub fn is_known(&self, format: &str) -> bool {
        self.converters.contains_key(format)
    }

    pub fn converter_for(&self, format: &str) -> Result<Box<dyn Converter>, ConvertError> {
        self.converters
            .get(format)
            .map(|ctor| ctor())
            .ok_or_else(|| ConvertError::UnknownFormat(format.to_string()))
    }

    /// Convert a document declared to be in the given format.
    pub fn convert(&self, format: &str, doc: Value) -> Result<Value, ConvertError> {
        self.converter_for(format)?.convert(doc)
    }
}

/// Detect the format of a raw document: the legacy package-attribute list
/// is the marker for v1, anything else is already canonical.
pub fn detect_format(doc: &Value) -> &'static str {
    if doc.get("cookbook_attributes").is_some() {
        V1_FORMAT
    } else {
        DEFAULT_FORMAT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(&json!({"id": "t"})), DEFAULT_FORMAT);
        assert_eq!(
            detect_format(&json!({"id": "t", "cookbook_attributes": []})),
            V1_FORMAT
        );
    }

    #[test]
    fn test_identity_converter_returns_input_unchanged() {
        let registry = ConverterRegistry::default();
        let doc = json!({"id": "t", "nodes": []});
        assert_eq!(registry.convert(DEFAULT_FORMAT, doc.clone()).unwrap(), doc);
        assert_eq!(registry.convert(TOPO_FORMAT, doc.clone()).unwrap(), doc);
    }

    #[test]
    fn test_unknown_format_is_an_error() {
        let registry = ConverterRegistry::default();
        let err = registry.convert("yaml_v9", json!({})).unwrap_err();
        assert!(err.to_string().contains("yaml_v9"));
        assert!(!registry.is_known("yaml_v9"));
    }

    #[test]
    fn test_registry_is_open_to_extension() {
        struct NullConverter;
        impl Converter for NullConverter {
            fn convert(&self, _doc: Value) -> Result<Value, ConvertError> {
                Ok(json!({"id": "nulled"}))
            }
        }

        let mut registry = ConverterRegistry::default();
        registry.register("null", || Box::new(NullConverter));
        assert!(registry.is_known("null"));
        assert_eq!(
            registry.convert("null", json!({"id": "x"})).unwrap(),
            json!({"id": "nulled"})
        );
    }
}
