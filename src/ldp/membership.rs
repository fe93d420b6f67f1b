//! Membership configuration of direct and indirect containers

use super::node::InteractionModel;
use super::{LdpError, LdpResult};
use crate::manager::{ManagerResult, ManagerTxn, ResourceManager};
use crate::rdf::{NamedNode, RdfFormat, Triple};
use crate::vocab::LOCAL_MEMBER_RESOURCE;

/// Fixed membership of a direct or indirect container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub resource: NamedNode,
    pub member_relation: Option<NamedNode>,
    pub is_member_of_relation: Option<NamedNode>,
    pub inserted_content_relation: Option<NamedNode>,
}

/// Which membership triple a new child produces
#[derive(Debug, Clone, Copy)]
pub enum MembershipPolicy<'a> {
    /// Basic containers: containment only
    None,
    /// Direct containers: the member is the child itself
    Fixed(&'a Membership),
    /// Indirect containers: the member is read from the child's document
    Derived(&'a Membership, &'a NamedNode),
}

impl<'a> MembershipPolicy<'a> {
    pub fn inserted_content_relation(&self) -> Option<&'a NamedNode> {
        match self {
            MembershipPolicy::Derived(_, icr) => Some(icr),
            _ => None,
        }
    }

    /// The membership triple for `child`, if the policy produces one.
    ///
    /// `derived` is only honoured by [`MembershipPolicy::Derived`]; without it
    /// the child URI is used.
    pub fn membership_triple(
        &self,
        child: &str,
        derived: Option<&NamedNode>,
    ) -> ManagerResult<Option<Triple>> {
        let (membership, member) = match self {
            MembershipPolicy::None => return Ok(None),
            MembershipPolicy::Fixed(m) => (*m, child),
            MembershipPolicy::Derived(m, _) => (*m, derived.map_or(child, |d| d.as_str())),
        };
        if let Some(relation) = &membership.member_relation {
            return Ok(Some(Triple::iri(
                membership.resource.as_str(),
                relation.as_str(),
                member,
            )?));
        }
        if let Some(relation) = &membership.is_member_of_relation {
            return Ok(Some(Triple::iri(
                member,
                relation.as_str(),
                membership.resource.as_str(),
            )?));
        }
        Ok(None)
    }

    pub(crate) fn write(
        &self,
        txn: &mut ManagerTxn<'_>,
        child: &str,
        derived: Option<&NamedNode>,
    ) -> ManagerResult<()> {
        if let Some(triple) = self.membership_triple(child, derived)? {
            txn.add_statement(triple)?;
        }
        Ok(())
    }
}

/// Where a new container's membership resource lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MembershipTarget {
    /// A child node of the container with this name
    Local { name: String, self_reference: bool },
    /// An IRI outside the container, used as-is
    External(NamedNode),
}

/// Membership a client or the bootstrap code declares for a new container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipConfig {
    /// Local child name or absolute IRI; `None` creates `resource`
    pub membership_resource: Option<String>,
    pub member_relation: Option<NamedNode>,
    pub is_member_of_relation: Option<NamedNode>,
    pub inserted_content_relation: Option<NamedNode>,
    /// `rdf:type` of a membership resource the container creates locally
    pub member_type: Option<NamedNode>,
}

impl MembershipConfig {
    /// Read the configuration triples a creation document declares for `uri`
    pub fn from_document(
        mng: &ResourceManager,
        uri: &str,
        body: &str,
        format: RdfFormat,
    ) -> ManagerResult<Self> {
        Ok(Self {
            membership_resource: mng
                .get_member_resource(uri, body, format)?
                .map(NamedNode::into_string),
            member_relation: mng.get_member_relation(uri, body, format)?,
            is_member_of_relation: mng.get_is_member_of_relation(uri, body, format)?,
            inserted_content_relation: mng.get_inserted_content_relation(uri, body, format)?,
            member_type: None,
        })
    }

    pub(crate) fn validate(&self, model: InteractionModel) -> LdpResult<()> {
        match model {
            InteractionModel::DirectContainer
                if self.member_relation.is_none() && self.is_member_of_relation.is_none() =>
            {
                Err(LdpError::BadRequest(
                    "Direct container needs ldp:hasMemberRelation or ldp:isMemberOfRelation".into(),
                ))
            }
            InteractionModel::IndirectContainer
                if self.member_relation.is_none() || self.inserted_content_relation.is_none() =>
            {
                Err(LdpError::BadRequest(
                    "Indirect container needs ldp:hasMemberRelation and ldp:insertedContentRelation"
                        .into(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Resolve the declared membership resource of the container at `uri`.
    ///
    /// A declaration pointing at the base URI or at the container itself falls
    /// back to a local `resource` child.
    pub(crate) fn target(&self, base_uri: &str, uri: &str) -> LdpResult<MembershipTarget> {
        let local = |name: &str, self_reference| MembershipTarget::Local {
            name: name.to_string(),
            self_reference,
        };
        let Some(declared) = self.membership_resource.as_deref() else {
            return Ok(local(LOCAL_MEMBER_RESOURCE, false));
        };
        let trimmed = declared.trim_end_matches('/');
        if trimmed == base_uri || trimmed == uri {
            return Ok(local(LOCAL_MEMBER_RESOURCE, true));
        }
        if let Some(name) = trimmed.strip_prefix(uri).and_then(|r| r.strip_prefix('/')) {
            if !name.is_empty() && !name.contains('/') {
                return Ok(local(name, false));
            }
        }
        if !declared.contains(':') {
            if declared.is_empty() || declared.contains('/') {
                return Err(LdpError::BadRequest(format!(
                    "Invalid membership resource name: {}",
                    declared
                )));
            }
            return Ok(local(declared, false));
        }
        Ok(MembershipTarget::External(NamedNode::new(declared)?))
    }
}
