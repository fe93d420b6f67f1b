//! Fixed vocabulary shared by the resource tree and the resource manager
//!
//! Namespace: `http://www.w3.org/ns/ldp#`, plus the handful of RDF, DCTERMS
//! and POWDER terms the server writes itself.
//!
//! See <https://www.w3.org/TR/ldp/>.

use std::fmt;
use thiserror::Error;

/// LDP namespace IRI
pub const LDP_NS: &str = "http://www.w3.org/ns/ldp#";

/// LDP classes and properties
pub mod ldp {
    pub const RESOURCE: &str = "http://www.w3.org/ns/ldp#Resource";
    pub const RDF_SOURCE: &str = "http://www.w3.org/ns/ldp#RDFSource";
    pub const NON_RDF_SOURCE: &str = "http://www.w3.org/ns/ldp#NonRDFSource";
    pub const BASIC_CONTAINER: &str = "http://www.w3.org/ns/ldp#BasicContainer";
    pub const DIRECT_CONTAINER: &str = "http://www.w3.org/ns/ldp#DirectContainer";
    pub const INDIRECT_CONTAINER: &str = "http://www.w3.org/ns/ldp#IndirectContainer";

    pub const CONTAINS: &str = "http://www.w3.org/ns/ldp#contains";
    pub const MEMBERSHIP_RESOURCE: &str = "http://www.w3.org/ns/ldp#membershipResource";
    pub const HAS_MEMBER_RELATION: &str = "http://www.w3.org/ns/ldp#hasMemberRelation";
    pub const IS_MEMBER_OF_RELATION: &str = "http://www.w3.org/ns/ldp#isMemberOfRelation";
    pub const INSERTED_CONTENT_RELATION: &str = "http://www.w3.org/ns/ldp#insertedContentRelation";

    pub const PREFER_CONTAINMENT: &str = "http://www.w3.org/ns/ldp#PreferContainment";
    pub const PREFER_MEMBERSHIP: &str = "http://www.w3.org/ns/ldp#PreferMembership";
    pub const PREFER_MINIMAL_CONTAINER: &str = "http://www.w3.org/ns/ldp#PreferMinimalContainer";
    /// Deprecated in LDP 1.0, still honoured as an alias of `PreferMinimalContainer`
    pub const PREFER_EMPTY_CONTAINER: &str = "http://www.w3.org/ns/ldp#PreferEmptyContainer";
}

pub mod rdf {
    pub const NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
}

pub mod dcterms {
    pub const NS: &str = "http://purl.org/dc/terms/";
    pub const CREATED: &str = "http://purl.org/dc/terms/created";
    pub const FORMAT: &str = "http://purl.org/dc/terms/format";
}

pub mod xsd {
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
}

pub mod wdrs {
    pub const DESCRIBEDBY: &str = "http://www.w3.org/2007/05/powder-s#describedby";
}

// Header names, reported in OPTIONS bodies
pub const HDR_ALLOW: &str = "Allow";
pub const HDR_ACCEPT_PATCH: &str = "Accept-Patch";
pub const HDR_ACCEPT_POST: &str = "Accept-Post";

// Link-format attributes carried as Uri-Query / Location-Query
pub const ATTR_TITLE: &str = "title";
pub const ATTR_RESOURCE_TYPE: &str = "rt";
pub const LINK_LDP: &str = "ldp";
pub const LINK_PREF_INCLUDE: &str = "ldp-incl";
pub const LINK_PREF_OMIT: &str = "ldp-omit";
pub const LINK_REL_DESCRIBEDBY: &str = "describedby";

/// Local name of the membership resource substituted for a self-referencing declaration
pub const LOCAL_MEMBER_RESOURCE: &str = "resource";

/// Local name of the description paired with a non-RDF source
pub const META_RESOURCE: &str = "meta";

/// Content-format codes understood by the server.
///
/// CoAP registry values where one exists; the RDF formats use the codes of the
/// LDP-CoAP media type registry.
pub mod media {
    pub const TEXT_PLAIN: u16 = 0;
    pub const LINK_FORMAT: u16 = 40;
    pub const APPLICATION_XML: u16 = 41;
    pub const OCTET_STREAM: u16 = 42;
    pub const EXI: u16 = 47;
    pub const APPLICATION_JSON: u16 = 50;
    pub const CBOR: u16 = 60;
    pub const RDF_XML: u16 = 201;
    pub const RDF_PATCH: u16 = 202;
    pub const TEXT_TURTLE: u16 = 203;
    pub const LD_JSON: u16 = 204;

    /// Human readable MIME type for a content-format code
    pub fn mime(code: u16) -> Option<&'static str> {
        match code {
            TEXT_PLAIN => Some("text/plain"),
            LINK_FORMAT => Some("application/link-format"),
            APPLICATION_XML => Some("application/xml"),
            OCTET_STREAM => Some("application/octet-stream"),
            EXI => Some("application/exi"),
            APPLICATION_JSON => Some("application/json"),
            CBOR => Some("application/cbor"),
            RDF_XML => Some("application/rdf+xml"),
            RDF_PATCH => Some("application/rdf-patch"),
            TEXT_TURTLE => Some("text/turtle"),
            LD_JSON => Some("application/ld+json"),
            _ => None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown LDP-CoAP request code {0}")]
pub struct UnknownCode(pub u8);

/// Request codes: GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestCode {
    Get = 1,
    Post = 2,
    Put = 3,
    Delete = 4,
    Patch = 5,
    Head = 6,
    Options = 7,
}

impl RequestCode {
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Whether the method leaves the tree and the store untouched
    pub fn is_read_only(self) -> bool {
        matches!(self, RequestCode::Get | RequestCode::Head | RequestCode::Options)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestCode::Get => "GET",
            RequestCode::Post => "POST",
            RequestCode::Put => "PUT",
            RequestCode::Delete => "DELETE",
            RequestCode::Patch => "PATCH",
            RequestCode::Head => "HEAD",
            RequestCode::Options => "OPTIONS",
        }
    }
}

impl TryFrom<u8> for RequestCode {
    type Error = UnknownCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RequestCode::Get),
            2 => Ok(RequestCode::Post),
            3 => Ok(RequestCode::Put),
            4 => Ok(RequestCode::Delete),
            5 => Ok(RequestCode::Patch),
            6 => Ok(RequestCode::Head),
            7 => Ok(RequestCode::Options),
            other => Err(UnknownCode(other)),
        }
    }
}

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response codes the server emits, encoded as `class << 5 | detail`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    Created = 0x41,
    Deleted = 0x42,
    Changed = 0x44,
    Content = 0x45,
    BadRequest = 0x80,
    Forbidden = 0x83,
    NotFound = 0x84,
    MethodNotAllowed = 0x85,
    NotAcceptable = 0x86,
    Conflict = 0x89,
    PreconditionFailed = 0x8c,
    RequestEntityTooLarge = 0x8d,
    UnsupportedContentFormat = 0x8f,
    InternalServerError = 0xa0,
}

impl ResponseCode {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn class(self) -> u8 {
        self.value() >> 5
    }

    pub fn detail(self) -> u8 {
        self.value() & 0x1f
    }

    pub fn is_success(self) -> bool {
        self.class() == 2
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}
