//! Resource manager: the single gateway between the resource tree and the
//! triple store.
//!
//! The manager owns
//! - the base URI every resource path is resolved against,
//! - the tombstone set of deleted paths,
//! - the triple store and its connectivity state.
//!
//! All writes go through a [`ManagerTxn`], which holds the store write lock
//! and an undo log. A transaction that is dropped without `commit` restores
//! the store, so a failed creation never leaves half-written relationships
//! behind. Readers take the store read lock and therefore only ever observe
//! committed state.

mod txn;

pub use txn::ManagerTxn;

use crate::rdf::{
    NamedNode, NamespaceManager, ParseError, RdfError, RdfFormat, RdfParser, RdfStore,
    RdfStoreError, Triple, TriplePattern,
};
use crate::vocab::ldp;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ManagerError {
    /// The submitted document could not be parsed in its declared format
    #[error("Content format error: {0}")]
    ContentFormat(#[from] ParseError),

    /// A value that must be an IRI is not one
    #[error("{0}")]
    InvalidIri(#[from] RdfError),

    /// The triple store is unreachable
    #[error("Triple store is not connected")]
    Disconnected,

    /// A write was refused by the store
    #[error("Store write failed: {0}")]
    Store(#[from] RdfStoreError),
}

impl ManagerError {
    /// Whether the failure is caused by the request rather than the store
    pub fn is_client_error(&self) -> bool {
        matches!(self, ManagerError::ContentFormat(_) | ManagerError::InvalidIri(_))
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;

pub struct ResourceManager {
    base_uri: String,
    store: RwLock<RdfStore>,
    tombstones: Mutex<FxHashSet<String>>,
    connected: AtomicBool,
    namespaces: NamespaceManager,
    #[cfg(test)]
    write_budget: std::sync::atomic::AtomicUsize,
}

impl ResourceManager {
    /// Create a manager over an empty in-memory store.
    ///
    /// A trailing slash on the base URI is dropped: paths always start with `/`.
    pub fn new(base_uri: impl Into<String>) -> Self {
        let base_uri = base_uri.into().trim_end_matches('/').to_string();
        info!("Resource manager initialized at {}", base_uri);
        Self {
            base_uri,
            store: RwLock::new(RdfStore::new()),
            tombstones: Mutex::new(FxHashSet::default()),
            connected: AtomicBool::new(true),
            namespaces: NamespaceManager::new(),
            #[cfg(test)]
            write_budget: std::sync::atomic::AtomicUsize::new(usize::MAX),
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Absolute URI of a resource path
    pub fn uri_for(&self, path: &str) -> String {
        format!("{}{}", self.base_uri, path)
    }

    pub fn namespaces(&self) -> &NamespaceManager {
        &self.namespaces
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn set_connected(&self, connected: bool) {
        if !connected {
            warn!("Triple store marked as disconnected");
        }
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Whether a path was ever deleted
    pub fn is_deleted(&self, path: &str) -> bool {
        self.tombstones
            .lock()
            .map(|set| set.contains(path))
            .unwrap_or_else(|poisoned| poisoned.into_inner().contains(path))
    }

    /// Number of recorded tombstones
    pub fn tombstone_count(&self) -> usize {
        self.tombstones
            .lock()
            .map(|set| set.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub(crate) fn record_tombstones(&self, paths: Vec<String>) {
        let mut set = self
            .tombstones
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        set.extend(paths);
    }

    /// Build a typed IRI from a raw string
    pub fn create_iri(&self, iri: &str) -> ManagerResult<NamedNode> {
        Ok(NamedNode::new(iri.trim())?)
    }

    /// Start a write transaction. Waits for in-flight readers and writers.
    pub async fn begin(&self) -> ManagerResult<ManagerTxn<'_>> {
        self.check_connected()?;
        let guard = self.store.write().await;
        Ok(ManagerTxn::new(self, guard))
    }

    /// Read access to committed state
    pub async fn read(&self) -> ManagerResult<RwLockReadGuard<'_, RdfStore>> {
        self.check_connected()?;
        Ok(self.store.read().await)
    }

    /// Every triple whose subject is `uri`
    pub async fn describe(&self, uri: &str) -> ManagerResult<Vec<Triple>> {
        let subject = NamedNode::new(uri)?.into();
        Ok(self.read().await?.triples_with_subject(&subject))
    }

    /// Parse a client document whose `<>` is `uri`
    pub fn parse(&self, uri: &str, body: &str, format: RdfFormat) -> ManagerResult<Vec<Triple>> {
        Ok(RdfParser::parse(body, format, Some(uri))?)
    }

    /// `ldp:hasMemberRelation` declared for `uri` in a container-creation document
    pub fn get_member_relation(
        &self,
        uri: &str,
        body: &str,
        format: RdfFormat,
    ) -> ManagerResult<Option<NamedNode>> {
        self.declared_object(uri, body, format, ldp::HAS_MEMBER_RELATION)
    }

    /// `ldp:isMemberOfRelation` declared for `uri`
    pub fn get_is_member_of_relation(
        &self,
        uri: &str,
        body: &str,
        format: RdfFormat,
    ) -> ManagerResult<Option<NamedNode>> {
        self.declared_object(uri, body, format, ldp::IS_MEMBER_OF_RELATION)
    }

    /// `ldp:membershipResource` declared for `uri`
    pub fn get_member_resource(
        &self,
        uri: &str,
        body: &str,
        format: RdfFormat,
    ) -> ManagerResult<Option<NamedNode>> {
        self.declared_object(uri, body, format, ldp::MEMBERSHIP_RESOURCE)
    }

    /// `ldp:insertedContentRelation` declared for `uri`
    pub fn get_inserted_content_relation(
        &self,
        uri: &str,
        body: &str,
        format: RdfFormat,
    ) -> ManagerResult<Option<NamedNode>> {
        self.declared_object(uri, body, format, ldp::INSERTED_CONTENT_RELATION)
    }

    fn declared_object(
        &self,
        uri: &str,
        body: &str,
        format: RdfFormat,
        predicate: &str,
    ) -> ManagerResult<Option<NamedNode>> {
        let pattern = TriplePattern::subject_predicate(uri, predicate)?;
        Ok(self
            .parse(uri, body, format)?
            .into_iter()
            .filter(|t| pattern.matches(t))
            .find_map(|t| t.object.as_named_node().cloned()))
    }

    pub(crate) fn check_connected(&self) -> ManagerResult<()> {
        if !self.connected() {
            return Err(ManagerError::Disconnected);
        }
        #[cfg(test)]
        {
            let budget = self.write_budget.load(Ordering::SeqCst);
            if budget == 0 {
                return Err(ManagerError::Disconnected);
            }
            if budget != usize::MAX {
                self.write_budget.store(budget - 1, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    /// Let the next `n` store operations succeed, then fail every one after
    #[cfg(test)]
    pub(crate) fn fail_after(&self, n: usize) {
        self.write_budget.store(n, Ordering::SeqCst);
    }
}
