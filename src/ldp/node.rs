//! Resource tree nodes

use super::container::{Container, ContainerVariant};
use super::{LdpError, LdpResult};
use crate::rdf::{NamespaceManager, Triple};
use crate::vocab::{dcterms, ldp, rdf, wdrs, LDP_NS, LINK_REL_DESCRIBEDBY, META_RESOURCE};
use bytes::Bytes;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// LDP interaction model a client may request through `rt`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionModel {
    RdfSource,
    NonRdfSource,
    BasicContainer,
    DirectContainer,
    IndirectContainer,
}

impl InteractionModel {
    /// Parse an `rt` attribute: compact (`ldp:BasicContainer`) or full IRI
    pub fn from_rt(token: &str, namespaces: &NamespaceManager) -> LdpResult<Self> {
        let iri = namespaces
            .resolve(token)
            .map_err(|_| LdpError::BadRequest(format!("Invalid rt query parameter: {}", token)))?;
        match iri.as_str() {
            ldp::RESOURCE | ldp::RDF_SOURCE => Ok(InteractionModel::RdfSource),
            ldp::NON_RDF_SOURCE => Ok(InteractionModel::NonRdfSource),
            ldp::BASIC_CONTAINER => Ok(InteractionModel::BasicContainer),
            ldp::DIRECT_CONTAINER => Ok(InteractionModel::DirectContainer),
            ldp::INDIRECT_CONTAINER => Ok(InteractionModel::IndirectContainer),
            _ => Err(LdpError::BadRequest(format!("Invalid rt query parameter: {}", token))),
        }
    }

    /// `rdf:type` the store records for the model
    pub fn type_iri(self) -> &'static str {
        match self {
            InteractionModel::RdfSource => ldp::RDF_SOURCE,
            InteractionModel::NonRdfSource => ldp::NON_RDF_SOURCE,
            InteractionModel::BasicContainer => ldp::BASIC_CONTAINER,
            InteractionModel::DirectContainer => ldp::DIRECT_CONTAINER,
            InteractionModel::IndirectContainer => ldp::INDIRECT_CONTAINER,
        }
    }

    /// Token advertised in link-format `rt`
    pub fn link_token(self) -> &'static str {
        match self {
            InteractionModel::RdfSource | InteractionModel::NonRdfSource => "ldp:Resource",
            InteractionModel::BasicContainer => "ldp:BasicContainer",
            InteractionModel::DirectContainer => "ldp:DirectContainer",
            InteractionModel::IndirectContainer => "ldp:IndirectContainer",
        }
    }

    /// Whether the model is one of the container variants
    pub fn is_container(self) -> bool {
        matches!(
            self,
            InteractionModel::BasicContainer
                | InteractionModel::DirectContainer
                | InteractionModel::IndirectContainer
        )
    }
}

/// Payload of a non-RDF source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub content_format: u16,
    pub data: Bytes,
}

/// What a node holds besides its triples
pub enum ResourceKind {
    /// Description only, kept in the store
    RdfSource,
    /// Raw payload; the description lives in the `meta` child
    NonRdfSource(RwLock<Binary>),
    /// Basic, direct or indirect container
    Container(Container),
}

/// A node of the resource tree.
///
/// Children are owned in creation order; the parent link is weak.
pub struct Resource {
    name: String,
    path: String,
    uri: String,
    parent: Weak<Resource>,
    kind: ResourceKind,
    children: RwLock<IndexMap<String, Arc<Resource>>>,
    deleted: AtomicBool,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// `iri` is `base` followed by `sep` and something more
fn has_suffix(iri: &str, base: &str, sep: char) -> bool {
    iri.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix(sep))
        .is_some_and(|rest| !rest.is_empty())
}

impl Resource {
    /// Root node at the base URI
    pub(crate) fn root(base_uri: &str, container: Container) -> Arc<Self> {
        Arc::new(Self {
            name: String::new(),
            path: String::new(),
            uri: base_uri.to_string(),
            parent: Weak::new(),
            kind: ResourceKind::Container(container),
            children: RwLock::new(IndexMap::new()),
            deleted: AtomicBool::new(false),
        })
    }

    /// Build an unattached child; it becomes reachable on [`attach`](Self::attach)
    pub(crate) fn new_child(parent: &Arc<Resource>, name: &str, kind: ResourceKind) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            path: format!("{}/{}", parent.path, name),
            uri: format!("{}/{}", parent.uri, name),
            parent: Arc::downgrade(parent),
            kind,
            children: RwLock::new(IndexMap::new()),
            deleted: AtomicBool::new(false),
        })
    }

    /// Last path segment; empty for the root
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path relative to the base URI; empty for the root
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Absolute URI of the node
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Containing node, `None` for the root
    pub fn parent(&self) -> Option<Arc<Resource>> {
        self.parent.upgrade()
    }

    /// Node kind
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Whether this is the root container
    pub fn is_root(&self) -> bool {
        self.parent.upgrade().is_none() && self.path.is_empty()
    }

    /// Container state, if the node is a container
    pub fn as_container(&self) -> Option<&Container> {
        match &self.kind {
            ResourceKind::Container(c) => Some(c),
            _ => None,
        }
    }

    /// Whether the node accepts children
    pub fn is_container(&self) -> bool {
        self.as_container().is_some()
    }

    /// Interaction model the node was created with
    pub fn interaction_model(&self) -> InteractionModel {
        match &self.kind {
            ResourceKind::RdfSource => InteractionModel::RdfSource,
            ResourceKind::NonRdfSource(_) => InteractionModel::NonRdfSource,
            ResourceKind::Container(c) => match c.variant() {
                ContainerVariant::Basic => InteractionModel::BasicContainer,
                ContainerVariant::Direct(_) => InteractionModel::DirectContainer,
                ContainerVariant::Indirect(_) => InteractionModel::IndirectContainer,
            },
        }
    }

    /// Snapshot of a non-RDF payload
    pub fn binary(&self) -> Option<Binary> {
        match &self.kind {
            ResourceKind::NonRdfSource(content) => Some(read(content).clone()),
            _ => None,
        }
    }

    /// Replace a non-RDF payload; no-op on other kinds
    pub(crate) fn set_binary(&self, binary: Binary) {
        if let ResourceKind::NonRdfSource(content) = &self.kind {
            *write(content) = binary;
        }
    }

    /// URI of the paired description of a non-RDF source
    pub fn meta_uri(&self) -> Option<String> {
        match self.kind {
            ResourceKind::NonRdfSource(_) => Some(format!("{}/{}", self.uri, META_RESOURCE)),
            _ => None,
        }
    }

    /// Link-format attributes advertised for the node
    pub fn link_query(&self) -> String {
        let rt = format!("rt={}", self.interaction_model().link_token());
        match self.meta_uri() {
            Some(meta) => format!("{}&{}={}", rt, LINK_REL_DESCRIBEDBY, meta),
            None => rt,
        }
    }

    /// Whether the node was removed from the tree
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::SeqCst);
    }

    /// Live child by name
    pub fn child(&self, name: &str) -> Option<Arc<Resource>> {
        read(&self.children)
            .get(name)
            .filter(|c| !c.is_deleted())
            .cloned()
    }

    /// Live children in creation order
    pub fn children(&self) -> Vec<Arc<Resource>> {
        read(&self.children)
            .values()
            .filter(|c| !c.is_deleted())
            .cloned()
            .collect()
    }

    pub(crate) fn attach(&self, child: Arc<Resource>) {
        write(&self.children).insert(child.name.clone(), child);
    }

    pub(crate) fn detach(&self, name: &str) -> Option<Arc<Resource>> {
        write(&self.children).shift_remove(name)
    }

    /// This node and every descendant, parents before children
    pub(crate) fn subtree(self: &Arc<Self>) -> Vec<Arc<Resource>> {
        let mut nodes = vec![self.clone()];
        let mut i = 0;
        while i < nodes.len() {
            let children = nodes[i].children();
            nodes.extend(children);
            i += 1;
        }
        nodes
    }

    /// Whether the server owns a triple of this node's description.
    ///
    /// Managed triples survive PUT and cannot be touched through PATCH.
    pub fn is_server_managed(&self, triple: &Triple) -> bool {
        let predicate = triple.predicate.as_str();
        if matches!(
            predicate,
            ldp::CONTAINS
                | ldp::MEMBERSHIP_RESOURCE
                | ldp::HAS_MEMBER_RELATION
                | ldp::IS_MEMBER_OF_RELATION
                | ldp::INSERTED_CONTENT_RELATION
                | dcterms::CREATED
                | dcterms::FORMAT
                | wdrs::DESCRIBEDBY
        ) {
            return true;
        }
        if predicate == rdf::TYPE {
            return triple
                .object
                .as_named_node()
                .is_some_and(|o| o.as_str().starts_with(LDP_NS));
        }

        let parent = self.parent();
        let Some(membership) = parent
            .as_ref()
            .and_then(|p| p.as_container())
            .and_then(|c| c.variant().membership())
        else {
            return false;
        };
        let is = |relation: &Option<crate::rdf::NamedNode>| {
            relation.as_ref().is_some_and(|r| r.as_str() == predicate)
        };
        let about_member_resource = triple
            .subject
            .as_named_node()
            .is_some_and(|s| *s == membership.resource);
        (about_member_resource && is(&membership.member_relation))
            || is(&membership.is_member_of_relation)
    }

    /// Whether a client document for this node may assert `triple`.
    ///
    /// Server-managed triples are refused, and so are statements about any
    /// other resource under `base_uri`. Fragments of this node, blank nodes
    /// and IRIs outside the server are the client's to describe.
    pub fn accepts_client_triple(&self, triple: &Triple, base_uri: &str) -> bool {
        if self.is_server_managed(triple) {
            return false;
        }
        let Some(subject) = triple.subject.as_named_node() else {
            return true;
        };
        let subject = subject.as_str();
        if subject == self.uri || has_suffix(subject, &self.uri, '#') {
            return true;
        }
        !(subject == base_uri
            || ['/', '#', '?'].iter().any(|c| has_suffix(subject, base_uri, *c)))
    }
}
