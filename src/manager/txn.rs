use super::{ManagerResult, ResourceManager};
use crate::rdf::{Literal, NamedNode, RdfFormat, RdfObject, RdfStore, Triple, TriplePattern};
use crate::vocab::{dcterms, ldp, media, rdf, wdrs};
use tokio::sync::RwLockWriteGuard;
use tracing::{debug, warn};

enum Undo {
    Inserted(Triple),
    Removed(Triple),
}

/// Write transaction over the triple store.
///
/// Holds the store write lock for its whole lifetime, so concurrent creations
/// are serialized at the store and readers never see partial state. Every
/// change is recorded in an undo log; dropping the transaction without
/// [`commit`](ManagerTxn::commit) reverts all of them. Tombstones are staged
/// and only become visible on commit.
pub struct ManagerTxn<'a> {
    mng: &'a ResourceManager,
    store: RwLockWriteGuard<'a, RdfStore>,
    undo: Vec<Undo>,
    tombstones: Vec<String>,
    committed: bool,
}

impl<'a> ManagerTxn<'a> {
    pub(super) fn new(mng: &'a ResourceManager, store: RwLockWriteGuard<'a, RdfStore>) -> Self {
        Self {
            mng,
            store,
            undo: Vec::new(),
            tombstones: Vec::new(),
            committed: false,
        }
    }

    /// Store contents including this transaction's uncommitted writes
    pub fn store(&self) -> &RdfStore {
        &self.store
    }

    /// Assert a triple; returns whether it was new
    pub fn add_statement(&mut self, triple: Triple) -> ManagerResult<bool> {
        self.mng.check_connected()?;
        if self.store.contains(&triple) {
            return Ok(false);
        }
        self.store.insert(triple.clone())?;
        self.undo.push(Undo::Inserted(triple));
        Ok(true)
    }

    /// Retract a triple; returns whether it was present
    pub fn remove_statement(&mut self, triple: &Triple) -> ManagerResult<bool> {
        self.mng.check_connected()?;
        if !self.store.contains(triple) {
            return Ok(false);
        }
        self.store.remove(triple)?;
        self.undo.push(Undo::Removed(triple.clone()));
        Ok(true)
    }

    fn add_iri_statement(&mut self, s: &str, p: &str, o: &str) -> ManagerResult<bool> {
        self.add_statement(Triple::iri(s, p, o)?)
    }

    pub fn add_basic_container(&mut self, uri: &str) -> ManagerResult<()> {
        self.add_iri_statement(uri, rdf::TYPE, ldp::BASIC_CONTAINER)?;
        Ok(())
    }

    pub fn add_direct_container(&mut self, uri: &str) -> ManagerResult<()> {
        self.add_iri_statement(uri, rdf::TYPE, ldp::DIRECT_CONTAINER)?;
        Ok(())
    }

    pub fn add_indirect_container(&mut self, uri: &str) -> ManagerResult<()> {
        self.add_iri_statement(uri, rdf::TYPE, ldp::INDIRECT_CONTAINER)?;
        Ok(())
    }

    pub fn add_rdf_source(&mut self, uri: &str) -> ManagerResult<()> {
        self.add_iri_statement(uri, rdf::TYPE, ldp::RDF_SOURCE)?;
        Ok(())
    }

    /// Type a non-RDF source and record its media type as `dcterms:format`
    pub fn add_non_rdf_source(&mut self, uri: &str, content_format: u16) -> ManagerResult<()> {
        self.add_iri_statement(uri, rdf::TYPE, ldp::NON_RDF_SOURCE)?;
        let format = media::mime(content_format)
            .map(str::to_string)
            .unwrap_or_else(|| content_format.to_string());
        self.add_statement(Triple::with_object(
            uri,
            dcterms::FORMAT,
            Literal::new_simple_literal(format).into(),
        )?)?;
        Ok(())
    }

    /// `(parent, ldp:contains, child)`
    pub fn set_contains_relationship(&mut self, child: &str, parent: &str) -> ManagerResult<()> {
        self.add_iri_statement(parent, ldp::CONTAINS, child)?;
        Ok(())
    }

    /// `(container, ldp:membershipResource, resource)`
    pub fn set_membership_resource(&mut self, resource: &str, container: &str) -> ManagerResult<()> {
        self.add_iri_statement(container, ldp::MEMBERSHIP_RESOURCE, resource)?;
        Ok(())
    }

    pub fn set_member_relation(&mut self, relation: &NamedNode, container: &str) -> ManagerResult<()> {
        self.add_iri_statement(container, ldp::HAS_MEMBER_RELATION, relation.as_str())?;
        Ok(())
    }

    pub fn set_is_member_of_relation(
        &mut self,
        relation: &NamedNode,
        container: &str,
    ) -> ManagerResult<()> {
        self.add_iri_statement(container, ldp::IS_MEMBER_OF_RELATION, relation.as_str())?;
        Ok(())
    }

    pub fn set_inserted_content_relation(
        &mut self,
        relation: &NamedNode,
        container: &str,
    ) -> ManagerResult<()> {
        self.add_iri_statement(container, ldp::INSERTED_CONTENT_RELATION, relation.as_str())?;
        Ok(())
    }

    /// Drop every `ldp:membershipResource` declared for a container
    pub fn delete_member_resource_statement(&mut self, container: &str) -> ManagerResult<usize> {
        let pattern = TriplePattern::subject_predicate(container, ldp::MEMBERSHIP_RESOURCE)?;
        let found = self.store.query(&pattern);
        for triple in &found {
            self.remove_statement(triple)?;
        }
        Ok(found.len())
    }

    /// `(uri, dcterms:created, now)`
    pub fn set_created(&mut self, uri: &str) -> ManagerResult<()> {
        let now = Literal::new_date_time(chrono::Utc::now());
        self.add_statement(Triple::with_object(uri, dcterms::CREATED, now.into())?)?;
        Ok(())
    }

    /// `(resource, wdrs:describedby, meta)`
    pub fn set_described_by(&mut self, resource: &str, meta: &str) -> ManagerResult<()> {
        self.add_iri_statement(resource, wdrs::DESCRIBEDBY, meta)?;
        Ok(())
    }

    /// Store the client's description of a new RDF source.
    ///
    /// Only the triples `keep` accepts are written.
    pub fn post_rdf_source(
        &mut self,
        uri: &str,
        body: &str,
        format: RdfFormat,
        keep: impl Fn(&Triple) -> bool,
    ) -> ManagerResult<usize> {
        let triples = self.mng.parse(uri, body, format)?;
        self.add_statements(triples.into_iter().filter(|t| keep(t)).collect())
    }

    /// Store the description of a resource posted to an indirect container
    /// and return the object it declares for `inserted_content_relation`.
    pub fn post_indirect_rdf_source(
        &mut self,
        uri: &str,
        body: &str,
        format: RdfFormat,
        inserted_content_relation: &NamedNode,
        keep: impl Fn(&Triple) -> bool,
    ) -> ManagerResult<Option<NamedNode>> {
        let triples = self.mng.parse(uri, body, format)?;
        let pattern = TriplePattern::subject_predicate(uri, inserted_content_relation.as_str())?;
        let derived = triples
            .iter()
            .filter(|t| pattern.matches(t))
            .find_map(|t| t.object.as_named_node().cloned());
        self.add_statements(triples.into_iter().filter(|t| keep(t)).collect())?;
        Ok(derived)
    }

    /// Assert a batch of triples; returns how many were new
    pub fn add_statements(&mut self, triples: Vec<Triple>) -> ManagerResult<usize> {
        let mut added = 0;
        for triple in triples {
            if self.add_statement(triple)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Replace the description of `uri`, keeping the triples `preserved` selects
    pub fn replace_description(
        &mut self,
        uri: &str,
        triples: Vec<Triple>,
        preserved: impl Fn(&Triple) -> bool,
    ) -> ManagerResult<()> {
        let subject = NamedNode::new(uri)?.into();
        let current = self.store.triples_with_subject(&subject);
        for triple in current.iter().filter(|t| !preserved(t)) {
            self.remove_statement(triple)?;
        }
        self.add_statements(triples)?;
        Ok(())
    }

    /// Retract every triple whose subject or object is `uri`
    pub fn delete_resource(&mut self, uri: &str) -> ManagerResult<usize> {
        let node = NamedNode::new(uri)?;
        let found = self.store.triples_mentioning(&node);
        for triple in &found {
            self.remove_statement(triple)?;
        }
        debug!("Retracted {} triples mentioning {}", found.len(), uri);
        Ok(found.len())
    }

    /// Objects of `(subject, predicate, ?)` that are IRIs
    pub fn named_objects(&self, subject: &str, predicate: &str) -> ManagerResult<Vec<NamedNode>> {
        let pattern = TriplePattern::subject_predicate(subject, predicate)?;
        Ok(self
            .store
            .objects(&pattern)
            .into_iter()
            .filter_map(|o| match o {
                RdfObject::NamedNode(n) => Some(n),
                _ => None,
            })
            .collect())
    }

    /// Mark a path as deleted once the transaction commits
    pub fn tombstone(&mut self, path: impl Into<String>) {
        self.tombstones.push(path.into());
    }

    pub fn commit(mut self) {
        let tombstones = std::mem::take(&mut self.tombstones);
        if !tombstones.is_empty() {
            self.mng.record_tombstones(tombstones);
        }
        debug!("Committed {} store changes", self.undo.len());
        self.undo.clear();
        self.committed = true;
    }
}

impl Drop for ManagerTxn<'_> {
    fn drop(&mut self) {
        if self.committed || self.undo.is_empty() {
            return;
        }
        warn!("Rolling back {} store changes", self.undo.len());
        while let Some(entry) = self.undo.pop() {
            // Undo bypasses the connectivity check: the guard is still held.
            match entry {
                Undo::Inserted(triple) => {
                    let _ = self.store.remove(&triple);
                }
                Undo::Removed(triple) => {
                    self.store.insert_if_absent(triple);
                }
            }
        }
    }
}
