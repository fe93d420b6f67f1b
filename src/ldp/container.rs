//! Containers and the child-creation algorithm
//!
//! Creation of a child in container `C` runs entirely under `C`'s creation
//! lock and one store transaction:
//!
//! 1. resolve the title (client supplied or anonymous),
//! 2. reject or rename around tombstones,
//! 3. reject names held by a live child,
//! 4. write type, description, timestamp, containment and membership triples,
//! 5. attach the node to the tree and commit.
//!
//! Any failure in step 4 drops the transaction, which reverts every triple,
//! and the node is never attached.

use super::membership::{Membership, MembershipConfig, MembershipPolicy, MembershipTarget};
use super::node::{Binary, InteractionModel, Resource, ResourceKind};
use super::{LdpError, LdpResult};
use crate::manager::{ManagerTxn, ResourceManager};
use crate::rdf::{Literal, NamedNode, RdfFormat, Triple};
use crate::vocab::{dcterms, media, rdf, RequestCode, META_RESOURCE};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

const ANONYMOUS_PREFIX: &str = "res";

/// Container flavours; they differ only in membership
pub enum ContainerVariant {
    Basic,
    Direct(Membership),
    Indirect(Membership),
}

impl ContainerVariant {
    /// Membership triple policy applied to new children
    pub fn policy(&self) -> MembershipPolicy<'_> {
        match self {
            ContainerVariant::Basic => MembershipPolicy::None,
            ContainerVariant::Direct(m) => MembershipPolicy::Fixed(m),
            ContainerVariant::Indirect(m) => match &m.inserted_content_relation {
                Some(icr) => MembershipPolicy::Derived(m, icr),
                None => MembershipPolicy::Fixed(m),
            },
        }
    }

    /// Fixed membership of a direct or indirect container
    pub fn membership(&self) -> Option<&Membership> {
        match self {
            ContainerVariant::Basic => None,
            ContainerVariant::Direct(m) | ContainerVariant::Indirect(m) => Some(m),
        }
    }
}

#[derive(Default)]
struct CreationState {
    anonymous: u64,
}

pub struct Container {
    variant: ContainerVariant,
    accepted_non_rdf: Vec<u16>,
    creation: Mutex<CreationState>,
}

impl Container {
    pub fn new(variant: ContainerVariant, accepted_non_rdf: Vec<u16>) -> Self {
        Self {
            variant,
            accepted_non_rdf,
            creation: Mutex::new(CreationState::default()),
        }
    }

    pub fn variant(&self) -> &ContainerVariant {
        &self.variant
    }

    /// Non-RDF content formats children may be created with
    pub fn accepted_non_rdf(&self) -> &[u16] {
        &self.accepted_non_rdf
    }

    /// Whether a non-RDF child may use `content_format`
    pub fn accepts(&self, content_format: u16) -> bool {
        self.accepted_non_rdf.contains(&content_format)
    }
}

/// How the name of a new child is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Title {
    /// POST with a title: renamed anonymously if the path was deleted
    Requested(String),
    /// PUT-to-create and programmatic creation: a deleted path is a conflict
    Explicit(String),
    Anonymous,
}

pub(crate) enum ChildPayload {
    Rdf { body: String, format: RdfFormat },
    Binary(Binary),
    Empty,
}

/// Everything needed to build a child once its name is settled
pub(crate) struct NewChild {
    pub model: InteractionModel,
    pub payload: ChildPayload,
    pub membership: Option<MembershipConfig>,
}

impl NewChild {
    pub fn new(model: InteractionModel) -> Self {
        Self {
            model,
            payload: ChildPayload::Empty,
            membership: None,
        }
    }
}

fn validate_title(title: &str) -> LdpResult<()> {
    if title.is_empty() || title == "." || title == ".." || title.contains('/') {
        return Err(LdpError::BadRequest(format!("Unusable title: {:?}", title)));
    }
    Ok(())
}

impl Resource {
    fn child_path(&self, name: &str) -> String {
        format!("{}/{}", self.path(), name)
    }

    fn next_anonymous(&self, mng: &ResourceManager, state: &mut CreationState) -> String {
        loop {
            state.anonymous += 1;
            let name = format!("{}{}", ANONYMOUS_PREFIX, state.anonymous);
            if self.child(&name).is_none() && !mng.is_deleted(&self.child_path(&name)) {
                return name;
            }
        }
    }

    /// Create a child of this container.
    ///
    /// `describe` turns the container into the child's description; it runs
    /// after the name has been settled, so an occupied or deleted name is
    /// reported before the payload is looked at.
    pub(crate) async fn create_child<F>(
        self: &Arc<Self>,
        mng: &ResourceManager,
        title: Title,
        describe: F,
    ) -> LdpResult<Arc<Resource>>
    where
        F: FnOnce(&Container) -> LdpResult<NewChild>,
    {
        let container = self
            .as_container()
            .ok_or(LdpError::MethodNotAllowed(RequestCode::Post))?;
        let mut state = container.creation.lock().await;

        let name = match title {
            Title::Anonymous => self.next_anonymous(mng, &mut state),
            Title::Requested(title) => {
                validate_title(&title)?;
                if mng.is_deleted(&self.child_path(&title)) {
                    let renamed = self.next_anonymous(mng, &mut state);
                    debug!("{} was deleted, creating {} instead", self.child_path(&title), renamed);
                    renamed
                } else {
                    title
                }
            }
            Title::Explicit(title) => {
                validate_title(&title)?;
                if mng.is_deleted(&self.child_path(&title)) {
                    return Err(LdpError::Conflict(format!(
                        "{} was previously deleted",
                        self.child_path(&title)
                    )));
                }
                title
            }
        };

        if self.child(&name).is_some() {
            return Err(LdpError::Forbidden(format!("{} already exists", self.child_path(&name))));
        }

        let child = describe(container)?;
        let mut txn = mng.begin().await?;
        if self.is_deleted() {
            return Err(LdpError::NotFound(self.path().to_string()));
        }

        let node = self.build_child(mng, &mut txn, container, &name, child)?;
        self.attach(node.clone());
        txn.commit();

        info!("Created {} {}", node.interaction_model().link_token(), node.path());
        Ok(node)
    }

    fn build_child(
        self: &Arc<Self>,
        mng: &ResourceManager,
        txn: &mut ManagerTxn<'_>,
        container: &Container,
        name: &str,
        child: NewChild,
    ) -> LdpResult<Arc<Resource>> {
        let uri = format!("{}/{}", self.uri(), name);
        let policy = container.variant.policy();

        let NewChild {
            model,
            payload,
            membership,
        } = child;

        let (node, derived) = match model {
            InteractionModel::RdfSource => {
                txn.add_rdf_source(&uri)?;
                let node = Resource::new_child(self, name, ResourceKind::RdfSource);
                let derived = store_description(mng, txn, &node, &payload, policy)?;
                (node, derived)
            }
            InteractionModel::NonRdfSource => {
                let ChildPayload::Binary(binary) = payload else {
                    return Err(LdpError::BadRequest("Non-RDF source needs a payload".into()));
                };
                let node = self.build_non_rdf_source(txn, name, binary)?;
                (node, None)
            }
            model => {
                let node =
                    self.build_container(mng, txn, container, name, model, membership, &payload)?;
                let derived = store_description(mng, txn, &node, &payload, policy)?;
                (node, derived)
            }
        };

        txn.set_created(&uri)?;
        txn.set_contains_relationship(&uri, self.uri())?;
        policy.write(txn, &uri, derived.as_ref())?;
        Ok(node)
    }

    fn build_non_rdf_source(
        self: &Arc<Self>,
        txn: &mut ManagerTxn<'_>,
        name: &str,
        binary: Binary,
    ) -> LdpResult<Arc<Resource>> {
        let content_format = binary.content_format;
        let node = Resource::new_child(self, name, ResourceKind::NonRdfSource(RwLock::new(binary)));
        txn.add_non_rdf_source(node.uri(), content_format)?;

        let meta = Resource::new_child(&node, META_RESOURCE, ResourceKind::RdfSource);
        txn.add_rdf_source(meta.uri())?;
        txn.set_created(meta.uri())?;
        txn.set_described_by(node.uri(), meta.uri())?;
        txn.add_statement(Triple::with_object(
            meta.uri(),
            dcterms::FORMAT,
            Literal::new_simple_literal(content_format.to_string()).into(),
        )?)?;
        node.attach(meta);
        Ok(node)
    }

    fn build_container(
        self: &Arc<Self>,
        mng: &ResourceManager,
        txn: &mut ManagerTxn<'_>,
        parent: &Container,
        name: &str,
        model: InteractionModel,
        membership: Option<MembershipConfig>,
        payload: &ChildPayload,
    ) -> LdpResult<Arc<Resource>> {
        let uri = format!("{}/{}", self.uri(), name);
        let accepted = parent.accepted_non_rdf.clone();

        if model == InteractionModel::BasicContainer {
            txn.add_basic_container(&uri)?;
            let container = Container::new(ContainerVariant::Basic, accepted);
            return Ok(Resource::new_child(self, name, ResourceKind::Container(container)));
        }

        let config = match (membership, payload) {
            (Some(config), _) => config,
            (None, ChildPayload::Rdf { body, format }) => {
                MembershipConfig::from_document(mng, &uri, body, *format)?
            }
            (None, _) => {
                return Err(LdpError::BadRequest(
                    "Container membership must be declared in an RDF document".into(),
                ))
            }
        };
        config.validate(model)?;

        let target = config.target(mng.base_uri(), &uri)?;
        let resource = match &target {
            MembershipTarget::Local { name, .. } => NamedNode::new(&format!("{}/{}", uri, name))?,
            MembershipTarget::External(iri) => {
                let path = iri
                    .as_str()
                    .strip_prefix(mng.base_uri())
                    .filter(|p| p.starts_with('/'));
                if let Some(path) = path.filter(|p| mng.is_deleted(p)) {
                    return Err(LdpError::Conflict(format!(
                        "Membership resource {} was deleted",
                        path
                    )));
                }
                iri.clone()
            }
        };

        if model == InteractionModel::DirectContainer {
            txn.add_direct_container(&uri)?;
        } else {
            txn.add_indirect_container(&uri)?;
        }
        if let MembershipTarget::Local { self_reference: true, .. } = target {
            txn.delete_member_resource_statement(&uri)?;
        }
        txn.set_membership_resource(resource.as_str(), &uri)?;
        if let Some(relation) = &config.member_relation {
            txn.set_member_relation(relation, &uri)?;
        }
        if let Some(relation) = &config.is_member_of_relation {
            txn.set_is_member_of_relation(relation, &uri)?;
        }
        if let Some(relation) = &config.inserted_content_relation {
            txn.set_inserted_content_relation(relation, &uri)?;
        }

        let membership = Membership {
            resource,
            member_relation: config.member_relation,
            is_member_of_relation: config.is_member_of_relation,
            inserted_content_relation: config.inserted_content_relation,
        };
        let variant = if model == InteractionModel::DirectContainer {
            ContainerVariant::Direct(membership)
        } else {
            ContainerVariant::Indirect(membership)
        };
        let node = Resource::new_child(
            self,
            name,
            ResourceKind::Container(Container::new(variant, accepted)),
        );

        if let MembershipTarget::Local { name: local, .. } = target {
            let member = Resource::new_child(&node, &local, ResourceKind::RdfSource);
            txn.add_rdf_source(member.uri())?;
            txn.set_created(member.uri())?;
            txn.set_contains_relationship(member.uri(), node.uri())?;
            if let Some(member_type) = &config.member_type {
                txn.add_statement(Triple::iri(member.uri(), rdf::TYPE, member_type.as_str())?)?;
            }
            node.attach(member);
        }
        Ok(node)
    }

    /// Delete this node and its subtree.
    ///
    /// Runs under the parent's creation lock so the freed name cannot be
    /// claimed before every descendant is retracted and tombstoned.
    pub async fn delete(self: &Arc<Self>, mng: &ResourceManager) -> LdpResult<usize> {
        let not_allowed = || LdpError::MethodNotAllowed(RequestCode::Delete);
        let parent = self.parent().ok_or_else(not_allowed)?;
        let container = parent.as_container().ok_or_else(not_allowed)?;
        if container
            .variant
            .membership()
            .is_some_and(|m| m.resource.as_str() == self.uri())
        {
            return Err(not_allowed());
        }

        let _guard = container.creation.lock().await;
        let mut txn = mng.begin().await?;
        if self.is_deleted() {
            return Err(LdpError::NotFound(self.path().to_string()));
        }

        let subtree = self.subtree();
        if let Some(user) = self.membership_user(&subtree) {
            return Err(LdpError::Conflict(format!(
                "{} holds the membership resource of {}",
                self.path(),
                user.path()
            )));
        }

        if let MembershipPolicy::Derived(membership, icr) = container.variant.policy() {
            self.retract_derived_membership(&parent, &mut txn, membership, icr)?;
        }

        for node in &subtree {
            txn.delete_resource(node.uri())?;
            txn.tombstone(node.path());
        }
        for node in &subtree {
            node.mark_deleted();
        }
        parent.detach(self.name());
        txn.commit();

        info!("Deleted {} ({} resources)", self.path(), subtree.len());
        Ok(subtree.len())
    }

    /// A live container outside `subtree` whose membership resource is a
    /// node of `subtree`
    fn membership_user(&self, subtree: &[Arc<Resource>]) -> Option<Arc<Resource>> {
        let mut root = self.parent()?;
        while let Some(parent) = root.parent() {
            root = parent;
        }
        root.subtree().into_iter().find(|node| {
            !subtree.iter().any(|s| Arc::ptr_eq(s, node))
                && node
                    .as_container()
                    .and_then(|c| c.variant.membership())
                    .is_some_and(|m| subtree.iter().any(|s| s.uri() == m.resource.as_str()))
        })
    }

    /// Apply `change` to this node's description.
    ///
    /// Under an indirect container the membership triple derived from the
    /// description is retracted first and derived again afterwards.
    pub(crate) fn update_description<F>(&self, txn: &mut ManagerTxn<'_>, change: F) -> LdpResult<()>
    where
        F: FnOnce(&mut ManagerTxn<'_>) -> LdpResult<()>,
    {
        let Some(parent) = self.parent() else {
            return change(txn);
        };
        let Some(MembershipPolicy::Derived(membership, icr)) =
            parent.as_container().map(|c| c.variant.policy())
        else {
            return change(txn);
        };
        if membership.resource.as_str() == self.uri() {
            return change(txn);
        }

        let policy = MembershipPolicy::Derived(membership, icr);
        self.retract_derived_membership(&parent, txn, membership, icr)?;
        if let Some(own) = policy.membership_triple(self.uri(), None)? {
            txn.remove_statement(&own)?;
        }

        change(&mut *txn)?;

        let member = txn.named_objects(self.uri(), icr.as_str())?.into_iter().next();
        policy.write(txn, self.uri(), member.as_ref())?;
        Ok(())
    }

    /// Membership triples of an indirect container do not mention the child,
    /// so they are removed by looking up the derived member again.
    fn retract_derived_membership(
        &self,
        parent: &Resource,
        txn: &mut ManagerTxn<'_>,
        membership: &Membership,
        icr: &NamedNode,
    ) -> LdpResult<()> {
        let siblings: Vec<Arc<Resource>> = parent
            .children()
            .into_iter()
            .filter(|c| c.name() != self.name())
            .collect();
        'members: for member in txn.named_objects(self.uri(), icr.as_str())? {
            for sibling in &siblings {
                let triple = Triple::iri(sibling.uri(), icr.as_str(), member.as_str())?;
                if txn.store().contains(&triple) {
                    continue 'members;
                }
            }
            let policy = MembershipPolicy::Derived(membership, icr);
            if let Some(triple) = policy.membership_triple(self.uri(), Some(&member))? {
                txn.remove_statement(&triple)?;
            }
        }
        Ok(())
    }

    /// Create an RDF source child with an empty description
    pub async fn create_rdf_source(
        self: &Arc<Self>,
        mng: &ResourceManager,
        name: &str,
    ) -> LdpResult<Arc<Resource>> {
        self.create_child(mng, Title::Explicit(name.to_string()), |_| {
            Ok(NewChild::new(InteractionModel::RdfSource))
        })
        .await
    }

    /// Create an RDF source child described by a document
    pub async fn create_described_rdf_source(
        self: &Arc<Self>,
        mng: &ResourceManager,
        name: &str,
        body: &str,
        format: RdfFormat,
    ) -> LdpResult<Arc<Resource>> {
        let body = body.to_string();
        self.create_child(mng, Title::Explicit(name.to_string()), move |_| {
            Ok(NewChild {
                payload: ChildPayload::Rdf { body, format },
                ..NewChild::new(InteractionModel::RdfSource)
            })
        })
        .await
    }

    /// Create a non-RDF source child. Any content format is allowed here.
    pub async fn create_non_rdf_source(
        self: &Arc<Self>,
        mng: &ResourceManager,
        name: &str,
        content_format: u16,
        data: impl Into<bytes::Bytes>,
    ) -> LdpResult<Arc<Resource>> {
        let binary = Binary {
            content_format,
            data: data.into(),
        };
        self.create_child(mng, Title::Explicit(name.to_string()), move |_| {
            Ok(NewChild {
                payload: ChildPayload::Binary(binary),
                ..NewChild::new(InteractionModel::NonRdfSource)
            })
        })
        .await
    }

    pub async fn create_basic_container(
        self: &Arc<Self>,
        mng: &ResourceManager,
        name: &str,
    ) -> LdpResult<Arc<Resource>> {
        self.create_child(mng, Title::Explicit(name.to_string()), |_| {
            Ok(NewChild::new(InteractionModel::BasicContainer))
        })
        .await
    }

    pub async fn create_direct_container(
        self: &Arc<Self>,
        mng: &ResourceManager,
        name: &str,
        config: MembershipConfig,
    ) -> LdpResult<Arc<Resource>> {
        self.create_child(mng, Title::Explicit(name.to_string()), move |_| {
            Ok(NewChild {
                membership: Some(config),
                ..NewChild::new(InteractionModel::DirectContainer)
            })
        })
        .await
    }

    pub async fn create_indirect_container(
        self: &Arc<Self>,
        mng: &ResourceManager,
        name: &str,
        config: MembershipConfig,
    ) -> LdpResult<Arc<Resource>> {
        self.create_child(mng, Title::Explicit(name.to_string()), move |_| {
            Ok(NewChild {
                membership: Some(config),
                ..NewChild::new(InteractionModel::IndirectContainer)
            })
        })
        .await
    }
}

/// Store the child's own document; under an indirect container also return
/// the member it declares.
///
/// Triples the client may not assert for the child are dropped.
fn store_description(
    mng: &ResourceManager,
    txn: &mut ManagerTxn<'_>,
    node: &Resource,
    payload: &ChildPayload,
    policy: MembershipPolicy<'_>,
) -> LdpResult<Option<NamedNode>> {
    let ChildPayload::Rdf { body, format } = payload else {
        return Ok(None);
    };
    let keep = |t: &Triple| node.accepts_client_triple(t, mng.base_uri());
    match policy.inserted_content_relation() {
        Some(icr) => Ok(txn.post_indirect_rdf_source(node.uri(), body, *format, icr, keep)?),
        None => {
            txn.post_rdf_source(node.uri(), body, *format, keep)?;
            Ok(None)
        }
    }
}

/// MIME name of the content formats a container accepts on POST
pub(crate) fn accept_post(container: &Container) -> Vec<String> {
    [media::TEXT_TURTLE, media::LD_JSON]
        .iter()
        .chain(container.accepted_non_rdf.iter())
        .map(|code| {
            media::mime(*code)
                .map(str::to_string)
                .unwrap_or_else(|| code.to_string())
        })
        .collect()
}
