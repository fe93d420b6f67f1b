//! LDP interaction model
//!
//! The resource tree is a set of [`Resource`] nodes rooted at a basic
//! container. Each node is one of
//! - an RDF source,
//! - a non-RDF source (raw payload plus a generated `meta` description),
//! - a container: basic, direct or indirect.
//!
//! Container variants share a single child-creation algorithm; they only
//! differ in the [`MembershipPolicy`] that decides which membership triple a
//! new child produces. All tree mutations happen while the creating container's
//! lock and a store transaction are both held, so a child is either fully
//! wired (tree + containment + membership triples) or not visible at all.

mod container;
mod dispatch;
mod membership;
mod message;
mod node;
mod patch;
mod prefer;

pub use container::{Container, ContainerVariant};
pub use dispatch::ResourceTree;
pub use membership::{Membership, MembershipConfig, MembershipPolicy};
pub use message::{etag, LdpRequest, LdpResponse};
pub use node::{Binary, InteractionModel, Resource, ResourceKind};
pub use patch::{PatchOperation, RdfPatch};
pub use prefer::{PreferToken, Preferences};

use crate::manager::ManagerError;
use crate::rdf::{RdfError, SerializeError};
use crate::vocab::{RequestCode, ResponseCode};
use thiserror::Error;

/// Request failures, one per response class
#[derive(Error, Debug)]
pub enum LdpError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method {0} not allowed")]
    MethodNotAllowed(RequestCode),

    #[error("Not acceptable: content format {0}")]
    NotAcceptable(u16),

    /// Explicit re-creation of a deleted path
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition failed")]
    PreconditionFailed,

    #[error("Unsupported content format {0}")]
    UnsupportedContentFormat(u16),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LdpError {
    pub fn code(&self) -> ResponseCode {
        match self {
            LdpError::BadRequest(_) => ResponseCode::BadRequest,
            LdpError::Forbidden(_) => ResponseCode::Forbidden,
            LdpError::NotFound(_) => ResponseCode::NotFound,
            LdpError::MethodNotAllowed(_) => ResponseCode::MethodNotAllowed,
            LdpError::NotAcceptable(_) => ResponseCode::NotAcceptable,
            LdpError::Conflict(_) => ResponseCode::Conflict,
            LdpError::PreconditionFailed => ResponseCode::PreconditionFailed,
            LdpError::UnsupportedContentFormat(_) => ResponseCode::UnsupportedContentFormat,
            LdpError::Internal(_) => ResponseCode::InternalServerError,
        }
    }
}

impl From<ManagerError> for LdpError {
    fn from(e: ManagerError) -> Self {
        if e.is_client_error() {
            LdpError::BadRequest(e.to_string())
        } else {
            LdpError::Internal(e.to_string())
        }
    }
}

impl From<RdfError> for LdpError {
    fn from(e: RdfError) -> Self {
        LdpError::BadRequest(e.to_string())
    }
}

impl From<SerializeError> for LdpError {
    fn from(e: SerializeError) -> Self {
        LdpError::Internal(e.to_string())
    }
}

pub type LdpResult<T> = Result<T, LdpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::ParseError;

    #[test]
    fn test_manager_errors_map_to_response_class() {
        let parse: LdpError = ManagerError::ContentFormat(ParseError::Parse("eof".into())).into();
        assert_eq!(parse.code(), ResponseCode::BadRequest);

        let store: LdpError = ManagerError::Disconnected.into();
        assert_eq!(store.code(), ResponseCode::InternalServerError);
    }

    #[test]
    fn test_every_kind_has_one_code() {
        let cases = [
            (LdpError::Forbidden("x".into()), "4.03"),
            (LdpError::NotFound("x".into()), "4.04"),
            (LdpError::MethodNotAllowed(RequestCode::Post), "4.05"),
            (LdpError::NotAcceptable(41), "4.06"),
            (LdpError::Conflict("x".into()), "4.09"),
            (LdpError::PreconditionFailed, "4.12"),
            (LdpError::UnsupportedContentFormat(41), "4.15"),
        ];
        for (err, code) in cases {
            assert_eq!(err.code().to_string(), code);
        }
    }
}
