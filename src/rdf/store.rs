//! In-memory RDF triple store
//!
//! The store keeps one primary set of triples plus two secondary indices:
//! - subject index: Subject -> triples with that subject
//! - object index: Object -> triples with that object
//!
//! Pattern queries with a bound subject, and retraction of every triple that
//! mentions a resource, are answered from the indices without a full scan.

use super::types::{NamedNode, RdfObject, RdfSubject, Triple, TriplePattern};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

/// RDF store errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RdfStoreError {
    /// Triple not found
    #[error("Triple not found: {0}")]
    TripleNotFound(String),

    /// Duplicate triple
    #[error("Duplicate triple: {0}")]
    DuplicateTriple(String),
}

pub type RdfStoreResult<T> = Result<T, RdfStoreError>;

#[derive(Clone, Default)]
pub struct RdfStore {
    /// All triples (primary storage)
    triples: FxHashSet<Triple>,

    /// Subject -> triples with that subject
    by_subject: FxHashMap<RdfSubject, FxHashSet<Triple>>,

    /// Object -> triples with that object
    by_object: FxHashMap<RdfObject, FxHashSet<Triple>>,
}

impl RdfStore {
    /// Create a new empty RDF store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple into the store
    pub fn insert(&mut self, triple: Triple) -> RdfStoreResult<()> {
        if self.triples.contains(&triple) {
            return Err(RdfStoreError::DuplicateTriple(triple.to_string()));
        }
        self.index_insert(&triple);
        self.triples.insert(triple);
        Ok(())
    }

    /// Insert a triple unless it is already present; returns whether it was added
    pub fn insert_if_absent(&mut self, triple: Triple) -> bool {
        self.insert(triple).is_ok()
    }

    /// Remove a triple from the store
    pub fn remove(&mut self, triple: &Triple) -> RdfStoreResult<()> {
        if !self.triples.remove(triple) {
            return Err(RdfStoreError::TripleNotFound(triple.to_string()));
        }
        self.index_remove(triple);
        Ok(())
    }

    /// Check if a triple exists in the store
    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    /// Get the total number of triples
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn clear(&mut self) {
        self.triples.clear();
        self.by_subject.clear();
        self.by_object.clear();
    }

    /// Query triples matching a pattern
    pub fn query(&self, pattern: &TriplePattern) -> Vec<Triple> {
        match (&pattern.subject, &pattern.object) {
            (Some(subject), _) => self
                .by_subject
                .get(subject)
                .into_iter()
                .flatten()
                .filter(|t| pattern.matches(t))
                .cloned()
                .collect(),
            (None, Some(object)) => self
                .by_object
                .get(object)
                .into_iter()
                .flatten()
                .filter(|t| pattern.matches(t))
                .cloned()
                .collect(),
            (None, None) => self
                .triples
                .iter()
                .filter(|t| pattern.matches(t))
                .cloned()
                .collect(),
        }
    }

    /// Get triples with a specific subject
    pub fn triples_with_subject(&self, subject: &RdfSubject) -> Vec<Triple> {
        self.by_subject
            .get(subject)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Get every triple whose subject or object is the given IRI
    pub fn triples_mentioning(&self, iri: &NamedNode) -> Vec<Triple> {
        let as_subject = RdfSubject::NamedNode(iri.clone());
        let as_object = RdfObject::NamedNode(iri.clone());

        let mut found: FxHashSet<&Triple> = FxHashSet::default();
        if let Some(set) = self.by_subject.get(&as_subject) {
            found.extend(set.iter());
        }
        if let Some(set) = self.by_object.get(&as_object) {
            found.extend(set.iter());
        }
        found.into_iter().cloned().collect()
    }

    /// Objects of `(subject, predicate, ?)`
    pub fn objects(&self, pattern: &TriplePattern) -> Vec<RdfObject> {
        self.query(pattern).into_iter().map(|t| t.object).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    fn index_insert(&mut self, triple: &Triple) {
        self.by_subject
            .entry(triple.subject.clone())
            .or_default()
            .insert(triple.clone());
        self.by_object
            .entry(triple.object.clone())
            .or_default()
            .insert(triple.clone());
    }

    fn index_remove(&mut self, triple: &Triple) {
        if let Some(set) = self.by_subject.get_mut(&triple.subject) {
            set.remove(triple);
            if set.is_empty() {
                self.by_subject.remove(&triple.subject);
            }
        }
        if let Some(set) = self.by_object.get_mut(&triple.object) {
            set.remove(triple);
            if set.is_empty() {
                self.by_object.remove(&triple.object);
            }
        }
    }
}
