//! RDF namespace and prefix management
//!
//! Query attributes such as `rt=ldp:BasicContainer` or
//! `ldp-omit=ldp:PreferContainment` carry compact IRIs; this module expands
//! them and compacts IRIs back for Link metadata.

use indexmap::IndexMap;
use thiserror::Error;

/// Prefix errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PrefixError {
    /// Unknown prefix
    #[error("Unknown prefix: {0}")]
    UnknownPrefix(String),

    /// Not a compact IRI
    #[error("Invalid compact IRI: {0}")]
    InvalidIri(String),
}

/// Result type for prefix operations
pub type PrefixResult<T> = Result<T, PrefixError>;

/// Namespace (prefix → IRI mapping)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    /// Prefix
    pub prefix: String,
    /// IRI
    pub iri: String,
}

impl Namespace {
    /// Create a new namespace
    pub fn new(prefix: impl Into<String>, iri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            iri: iri.into(),
        }
    }
}

/// Namespace manager preloaded with the prefixes the server speaks
#[derive(Debug, Clone)]
pub struct NamespaceManager {
    /// Prefix → IRI mappings, in registration order
    prefixes: IndexMap<String, String>,
}

impl NamespaceManager {
    /// Create a namespace manager with the LDP and common RDF prefixes
    pub fn new() -> Self {
        let mut mgr = Self {
            prefixes: IndexMap::new(),
        };

        mgr.add_prefix(crate::vocab::LINK_LDP, crate::vocab::LDP_NS);
        mgr.add_prefix("rdf", crate::vocab::rdf::NS);
        mgr.add_prefix("rdfs", "http://www.w3.org/2000/01/rdf-schema#");
        mgr.add_prefix("xsd", "http://www.w3.org/2001/XMLSchema#");
        mgr.add_prefix("foaf", "http://xmlns.com/foaf/0.1/");
        mgr.add_prefix("dcterms", crate::vocab::dcterms::NS);
        mgr.add_prefix("wdrs", "http://www.w3.org/2007/05/powder-s#");

        mgr
    }

    /// Add a prefix, replacing any earlier mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, iri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), iri.into());
    }

    /// Get IRI for a prefix
    pub fn get_iri(&self, prefix: &str) -> PrefixResult<&str> {
        self.prefixes
            .get(prefix)
            .map(|s| s.as_str())
            .ok_or_else(|| PrefixError::UnknownPrefix(prefix.to_string()))
    }

    /// Expand a compact IRI (prefix:local) to full IRI
    pub fn expand(&self, compact_iri: &str) -> PrefixResult<String> {
        match compact_iri.split_once(':') {
            Some((prefix, local)) => Ok(format!("{}{}", self.get_iri(prefix)?, local)),
            None => Err(PrefixError::InvalidIri(compact_iri.to_string())),
        }
    }

    /// Resolve a token that may be `<iri>`, an absolute IRI or a compact IRI
    ///
    /// # Example
    /// ```
    /// # use ldp_coap::rdf::NamespaceManager;
    /// let ns = NamespaceManager::new();
    /// let container = "http://www.w3.org/ns/ldp#BasicContainer";
    /// assert_eq!(ns.resolve("ldp:BasicContainer").unwrap(), container);
    /// assert_eq!(ns.resolve(&format!("<{}>", container)).unwrap(), container);
    /// assert!(ns.resolve("nope:Thing").is_err());
    /// ```
    pub fn resolve(&self, token: &str) -> PrefixResult<String> {
        let token = token.trim();
        if let Some(inner) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
            return Ok(inner.to_string());
        }
        if token.contains("://") {
            return Ok(token.to_string());
        }
        self.expand(token)
    }

    /// Compact an IRI using the longest matching namespace
    pub fn compact(&self, iri: &str) -> Option<String> {
        self.prefixes
            .iter()
            .filter(|(_, ns)| iri.starts_with(ns.as_str()))
            .max_by_key(|(_, ns)| ns.len())
            .map(|(prefix, ns)| format!("{}:{}", prefix, &iri[ns.len()..]))
    }

    /// Get all registered prefixes
    pub fn prefixes(&self) -> Vec<Namespace> {
        self.prefixes
            .iter()
            .map(|(prefix, iri)| Namespace::new(prefix.clone(), iri.clone()))
            .collect()
    }
}

impl Default for NamespaceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::ldp;

    #[test]
    fn test_expand() {
        let mgr = NamespaceManager::new();

        assert_eq!(mgr.expand("ldp:BasicContainer").unwrap(), ldp::BASIC_CONTAINER);
        assert_eq!(
            mgr.expand("rdf:type").unwrap(),
            "http://www.w3.org/1999/02/22-rdf-syntax-ns#type"
        );
        assert_eq!(
            mgr.expand("foo:bar"),
            Err(PrefixError::UnknownPrefix("foo".to_string()))
        );
        assert!(mgr.expand("Resource").is_err());
    }

    #[test]
    fn test_resolve_accepts_all_spellings() {
        let mgr = NamespaceManager::new();

        assert_eq!(mgr.resolve("ldp:PreferContainment").unwrap(), ldp::PREFER_CONTAINMENT);
        assert_eq!(mgr.resolve(ldp::PREFER_MEMBERSHIP).unwrap(), ldp::PREFER_MEMBERSHIP);
        assert_eq!(
            mgr.resolve("<http://example.org/hasPart>").unwrap(),
            "http://example.org/hasPart"
        );
    }

    #[test]
    fn test_compact() {
        let mgr = NamespaceManager::new();

        assert_eq!(mgr.compact(ldp::DIRECT_CONTAINER), Some("ldp:DirectContainer".to_string()));
        assert_eq!(mgr.compact("http://example.org/x"), None);
    }

    #[test]
    fn test_custom_prefix() {
        let mut mgr = NamespaceManager::new();
        mgr.add_prefix("ex", "http://example.org/");

        assert_eq!(mgr.expand("ex:hasPart").unwrap(), "http://example.org/hasPart");
        assert_eq!(mgr.prefixes().len(), 8);
    }
}
