//! RDF serialization formats
//!
//! Supports the two wire formats accepted for RDF sources:
//! - Turtle (`text/turtle`)
//! - JSON-LD (`application/ld+json`)
//!
//! Parsing takes the IRI of the resource being written as base IRI, so a
//! document may describe itself as `<>`.

mod jsonld;
mod turtle;

use super::Triple;
use crate::vocab::media;
use thiserror::Error;

pub use jsonld::{JsonLdParser, JsonLdSerializer};
pub use turtle::{TurtleParser, TurtleSerializer};

/// RDF serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RdfFormat {
    /// Turtle format (.ttl)
    Turtle,
    /// JSON-LD format (.jsonld)
    JsonLd,
}

impl RdfFormat {
    /// Format carried by a content-format code, if it is an RDF one
    pub fn from_content_format(code: u16) -> Option<Self> {
        match code {
            media::TEXT_TURTLE => Some(RdfFormat::Turtle),
            media::LD_JSON => Some(RdfFormat::JsonLd),
            _ => None,
        }
    }

    pub fn content_format(self) -> u16 {
        match self {
            RdfFormat::Turtle => media::TEXT_TURTLE,
            RdfFormat::JsonLd => media::LD_JSON,
        }
    }
}

/// Parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Syntax error in the document
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid base IRI supplied by the caller
    #[error("Invalid base IRI: {0}")]
    InvalidBase(String),

    /// Construct the parser does not handle
    #[error("Unsupported construct: {0}")]
    Unsupported(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Serialization errors
#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

pub type SerializeResult<T> = Result<T, SerializeError>;

/// RDF parser dispatching on format
pub struct RdfParser;

impl RdfParser {
    /// Parse a document, resolving relative IRIs against `base`
    pub fn parse(input: &str, format: RdfFormat, base: Option<&str>) -> ParseResult<Vec<Triple>> {
        match format {
            RdfFormat::Turtle => TurtleParser::parse(input, base),
            RdfFormat::JsonLd => JsonLdParser::parse(input, base),
        }
    }
}

/// RDF serializer dispatching on format
pub struct RdfSerializer;

impl RdfSerializer {
    /// Serialize triples in a stable order
    pub fn serialize(triples: &[Triple], format: RdfFormat) -> SerializeResult<String> {
        let mut sorted: Vec<&Triple> = triples.iter().collect();
        sorted.sort_by_cached_key(|t| t.to_string());

        match format {
            RdfFormat::Turtle => TurtleSerializer::serialize(&sorted),
            RdfFormat::JsonLd => JsonLdSerializer::serialize(&sorted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_content_format() {
        assert_eq!(RdfFormat::from_content_format(media::TEXT_TURTLE), Some(RdfFormat::Turtle));
        assert_eq!(RdfFormat::from_content_format(media::LD_JSON), Some(RdfFormat::JsonLd));
        assert_eq!(RdfFormat::from_content_format(media::TEXT_PLAIN), None);
        assert_eq!(RdfFormat::JsonLd.content_format(), media::LD_JSON);
    }

    #[test]
    fn test_formats_agree() {
        let ttl = r#"<> <http://purl.org/dc/terms/title> "Lamp" ; <http://example.org/room> <kitchen> ."#;
        let json = r#"{
            "@id": "",
            "http://purl.org/dc/terms/title": "Lamp",
            "http://example.org/room": { "@id": "kitchen" }
        }"#;

        let base = Some("coap://h/c/lamp");
        let mut from_ttl = RdfParser::parse(ttl, RdfFormat::Turtle, base).unwrap();
        let mut from_json = RdfParser::parse(json, RdfFormat::JsonLd, base).unwrap();
        from_ttl.sort_by_cached_key(|t| t.to_string());
        from_json.sort_by_cached_key(|t| t.to_string());
        assert_eq!(from_ttl, from_json);
    }

    #[test]
    fn test_serialize_is_stable() {
        let triples = RdfParser::parse(
            "<a> <http://e/p> <b> . <c> <http://e/p> <d> .",
            RdfFormat::Turtle,
            Some("coap://h/"),
        )
        .unwrap();
        let mut reversed = triples.clone();
        reversed.reverse();

        assert_eq!(
            RdfSerializer::serialize(&triples, RdfFormat::Turtle).unwrap(),
            RdfSerializer::serialize(&reversed, RdfFormat::Turtle).unwrap()
        );
    }
}
