//! LDP-CoAP
//!
//! Linked Data Platform resources and containers served over CoAP.
//!
//! # Architecture
//!
//! - [`vocab`]: LDP terms, link attributes, request and response codes
//! - [`rdf`]: triples, an indexed in-memory store, Turtle and JSON-LD
//! - [`manager`]: the resource manager, sole gateway to the store, owning
//!   the base URI, the tombstone set and write transactions
//! - [`ldp`]: the resource tree; basic, direct and indirect containers,
//!   RDF and non-RDF sources, request dispatch
//! - [`coap`]: message codec and UDP server
//! - [`config`]: YAML configuration and container bootstrap
//!
//! ## Example Usage
//!
//! ```rust
//! use ldp_coap::ldp::{LdpRequest, ResourceTree};
//! use ldp_coap::manager::ResourceManager;
//! use ldp_coap::vocab::{media, RequestCode, ResponseCode};
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let mng = Arc::new(ResourceManager::new("coap://localhost"));
//! let tree = ResourceTree::new(mng, vec![media::TEXT_PLAIN]).await.unwrap();
//!
//! // POST a basic container under the root
//! let req = LdpRequest::new(RequestCode::Post, "/")
//!     .with_query("title", "things")
//!     .with_query("rt", "ldp:BasicContainer")
//!     .with_content_format(media::TEXT_TURTLE)
//!     .with_payload("<> <http://purl.org/dc/terms/title> \"Things\" .");
//! let res = tree.handle(req).await;
//! assert_eq!(res.code, ResponseCode::Created);
//! assert_eq!(res.location.as_deref(), Some("coap://localhost/things"));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod coap;
pub mod config;
pub mod ldp;
pub mod manager;
pub mod rdf;
pub mod vocab;

// Re-export main types for convenience
pub use coap::{CoapError, CoapResult, CoapServer, Message, MessageType};

pub use config::{BootstrapContainer, ConfigError, ConfigResult, ContainerKind, ServerConfig};

pub use ldp::{
    Container, ContainerVariant, InteractionModel, LdpError, LdpRequest, LdpResponse,
    LdpResult, Membership, MembershipConfig, Resource, ResourceTree,
};

pub use manager::{ManagerError, ManagerResult, ManagerTxn, ResourceManager};

pub use rdf::{
    NamedNode, NamespaceManager, RdfFormat, RdfParser, RdfSerializer, RdfStore, Triple,
    TriplePattern,
};

pub use vocab::{RequestCode, ResponseCode};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
