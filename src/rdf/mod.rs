//! RDF support for the resource manager
//!
//! - RDF terms and triples (wrapping oxrdf)
//! - An in-memory indexed triple store
//! - Turtle and JSON-LD parsing/serialization
//! - Prefix expansion for compact IRIs in query attributes
//!
//! # Example
//!
//! ```rust
//! use ldp_coap::rdf::{RdfFormat, RdfParser, RdfStore, TriplePattern};
//!
//! let body = r#"<> <http://purl.org/dc/terms/title> "Lamp" ."#;
//! let triples = RdfParser::parse(body, RdfFormat::Turtle, Some("coap://localhost/lamp")).unwrap();
//!
//! let mut store = RdfStore::new();
//! for triple in triples {
//!     store.insert(triple).unwrap();
//! }
//!
//! let pattern = TriplePattern::subject_predicate(
//!     "coap://localhost/lamp",
//!     "http://purl.org/dc/terms/title",
//! ).unwrap();
//! assert_eq!(store.query(&pattern).len(), 1);
//! ```

mod namespace;
mod serialization;
mod store;
mod types;

pub use types::{
    BlankNode, Literal, NamedNode, RdfError, RdfObject, RdfPredicate, RdfResult, RdfSubject,
    Triple, TriplePattern,
};

pub use store::{RdfStore, RdfStoreError, RdfStoreResult};

pub use namespace::{Namespace, NamespaceManager, PrefixError, PrefixResult};

pub use serialization::{
    ParseError, ParseResult, RdfFormat, RdfParser, RdfSerializer, SerializeError,
    SerializeResult,
};
