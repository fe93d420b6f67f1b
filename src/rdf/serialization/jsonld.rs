//! JSON-LD format implementation
//!
//! Parsing goes through the sophia JSON-LD processor and converts its terms
//! into the crate's RDF types. Serialization writes expanded form.

use super::{ParseError, ParseResult, SerializeError, SerializeResult};
use crate::rdf::{BlankNode, Literal, NamedNode, RdfObject, RdfPredicate, RdfSubject, Triple};
use crate::vocab::rdf;
use serde_json::{json, Map, Value};
use sophia_api::parser::QuadParser;
use sophia_api::quad::Quad;
use sophia_api::source::{QuadSource, StreamError};
use sophia_api::term::{Term, TermKind};
use sophia_iri::Iri;
use sophia_jsonld::loader::NoLoader;
use sophia_jsonld::loader_factory::DefaultLoaderFactory;
use sophia_jsonld::{JsonLdOptions, JsonLdParser as Processor};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

/// JSON-LD parser
///
/// Runs the full JSON-LD to RDF algorithm. Remote contexts are not
/// fetched, so a document referencing one fails to parse. Quads in named
/// graphs are folded into the default graph.
pub struct JsonLdParser;

impl JsonLdParser {
    pub fn parse(input: &str, base: Option<&str>) -> ParseResult<Vec<Triple>> {
        let mut options = JsonLdOptions::<DefaultLoaderFactory<NoLoader>>::default();
        if let Some(base) = base {
            let iri = Iri::new(Arc::<str>::from(base))
                .map_err(|e| ParseError::InvalidBase(format!("{}: {}", base, e)))?;
            options = options.with_base(iri);
        }
        let processor = Processor::new_with_options(options);

        let mut blanks: HashMap<String, BlankNode> = HashMap::new();
        let mut triples = Vec::new();
        processor
            .parse_str(input)
            .try_for_each_quad(|quad| {
                let subject = match quad.s().kind() {
                    TermKind::BlankNode => RdfSubject::from(blank(&quad.s(), &mut blanks)),
                    _ => RdfSubject::from(named(&quad.s())?),
                };
                let predicate = RdfPredicate::from(named(&quad.p())?);
                let object = match quad.o().kind() {
                    TermKind::BlankNode => RdfObject::from(blank(&quad.o(), &mut blanks)),
                    TermKind::Literal => RdfObject::from(literal(&quad.o())?),
                    _ => RdfObject::from(named(&quad.o())?),
                };
                triples.push(Triple::new(subject, predicate, object));
                Ok::<(), ParseError>(())
            })
            .map_err(|e| match e {
                StreamError::SourceError(e) => invalid(e),
                StreamError::SinkError(e) => e,
            })?;
        Ok(triples)
    }
}

fn invalid(e: impl std::fmt::Display) -> ParseError {
    ParseError::Parse(e.to_string())
}

fn named<T: Term>(term: &T) -> ParseResult<NamedNode> {
    let iri = term
        .iri()
        .ok_or_else(|| ParseError::Unsupported(format!("{:?} term in IRI position", term.kind())))?;
    NamedNode::new(iri.as_str()).map_err(invalid)
}

fn blank<T: Term>(term: &T, blanks: &mut HashMap<String, BlankNode>) -> BlankNode {
    let label = term.bnode_id().map(|id| id.as_str().to_string()).unwrap_or_default();
    blanks.entry(label).or_default().clone()
}

fn literal<T: Term>(term: &T) -> ParseResult<Literal> {
    let lexical = term
        .lexical_form()
        .map(|l| l.to_string())
        .ok_or_else(|| ParseError::Parse("literal without lexical form".to_string()))?;
    if let Some(language) = term.language_tag() {
        return Literal::new_language_tagged_literal(lexical, language.as_str()).map_err(invalid);
    }
    match term.datatype() {
        Some(dt) if dt.as_str() != XSD_STRING && dt.as_str() != RDF_LANG_STRING => {
            Ok(Literal::new_typed_literal(lexical, NamedNode::new(dt.as_str()).map_err(invalid)?))
        }
        _ => Ok(Literal::new_simple_literal(lexical)),
    }
}

/// JSON-LD serializer producing expanded form
pub struct JsonLdSerializer;

impl JsonLdSerializer {
    pub fn serialize(triples: &[&Triple]) -> SerializeResult<String> {
        // subject -> predicate -> objects; BTreeMap keeps the output stable
        let mut nodes: BTreeMap<String, BTreeMap<String, Vec<Value>>> = BTreeMap::new();

        for triple in triples {
            let subject = match &triple.subject {
                RdfSubject::NamedNode(n) => n.as_str().to_string(),
                RdfSubject::BlankNode(b) => b.to_string(),
            };
            let (key, value) = if triple.predicate.as_str() == rdf::TYPE {
                match &triple.object {
                    RdfObject::NamedNode(n) => ("@type".to_string(), json!(n.as_str())),
                    other => (triple.predicate.as_str().to_string(), object_json(other)),
                }
            } else {
                (triple.predicate.as_str().to_string(), object_json(&triple.object))
            };
            nodes.entry(subject).or_default().entry(key).or_default().push(value);
        }

        let output: Vec<Value> = nodes
            .into_iter()
            .map(|(subject, props)| {
                let mut node = Map::new();
                node.insert("@id".to_string(), json!(subject));
                for (predicate, objects) in props {
                    node.insert(predicate, Value::Array(objects));
                }
                Value::Object(node)
            })
            .collect();

        serde_json::to_string_pretty(&output).map_err(|e| SerializeError::Serialize(e.to_string()))
    }
}

fn object_json(object: &RdfObject) -> Value {
    match object {
        RdfObject::NamedNode(n) => json!({ "@id": n.as_str() }),
        RdfObject::BlankNode(b) => json!({ "@id": b.to_string() }),
        RdfObject::Literal(l) => match l.language() {
            Some(lang) => json!({ "@value": l.value(), "@language": lang }),
            None if l.datatype().as_str() == XSD_STRING => json!({ "@value": l.value() }),
            None => json!({ "@value": l.value(), "@type": l.datatype().as_str() }),
        },
    }
}
