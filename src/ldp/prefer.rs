//! Representation preferences for container GETs
//!
//! Carried as query attributes: `ldp-incl=ldp:PreferContainment`,
//! `ldp-omit=ldp:PreferMembership`. Several tokens may share one attribute
//! separated by spaces. Unknown tokens are ignored.

use super::LdpRequest;
use crate::rdf::NamespaceManager;
use crate::vocab::{ldp, LINK_PREF_INCLUDE, LINK_PREF_OMIT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferToken {
    Containment,
    Membership,
    MinimalContainer,
}

impl PreferToken {
    pub fn parse(token: &str, namespaces: &NamespaceManager) -> Option<Self> {
        match namespaces.resolve(token).ok()?.as_str() {
            ldp::PREFER_CONTAINMENT => Some(PreferToken::Containment),
            ldp::PREFER_MEMBERSHIP => Some(PreferToken::Membership),
            ldp::PREFER_MINIMAL_CONTAINER | ldp::PREFER_EMPTY_CONTAINER => {
                Some(PreferToken::MinimalContainer)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    include: Vec<PreferToken>,
    omit: Vec<PreferToken>,
}

impl Preferences {
    pub fn from_request(req: &LdpRequest, namespaces: &NamespaceManager) -> Self {
        let collect = |name: &str| -> Vec<PreferToken> {
            req.attributes(name)
                .flat_map(str::split_whitespace)
                .filter_map(|t| PreferToken::parse(t, namespaces))
                .collect()
        };
        Self {
            include: collect(LINK_PREF_INCLUDE),
            omit: collect(LINK_PREF_OMIT),
        }
    }

    /// Whether a triple set belongs in the representation.
    ///
    /// With any include present only the included sets are returned, so
    /// including `PreferMinimalContainer` alone drops both containment and
    /// membership. Omits apply afterwards.
    pub fn wants(&self, set: PreferToken) -> bool {
        if self.omit.contains(&set) {
            return false;
        }
        self.include.is_empty() || self.include.contains(&set)
    }

    pub fn containment(&self) -> bool {
        self.wants(PreferToken::Containment)
    }

    pub fn membership(&self) -> bool {
        self.wants(PreferToken::Membership)
    }
}
