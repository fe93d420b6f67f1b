//! Turtle format implementation (rio_turtle)

use super::{ParseError, ParseResult, SerializeError, SerializeResult};
use crate::rdf::{BlankNode, Literal, NamedNode, RdfObject, RdfPredicate, RdfSubject, Triple};
use oxiri::Iri;
use rio_api::formatter::TriplesFormatter;
use rio_api::model;
use rio_api::parser::TriplesParser;
use rio_turtle::{TurtleError, TurtleFormatter};
use std::collections::HashMap;

impl From<TurtleError> for ParseError {
    fn from(e: TurtleError) -> Self {
        ParseError::Parse(e.to_string())
    }
}

/// Turtle parser
pub struct TurtleParser;

impl TurtleParser {
    /// Parse a Turtle document into triples.
    ///
    /// Blank node labels are document scoped, so each label is mapped to a
    /// fresh store-wide blank node.
    pub fn parse(input: &str, base: Option<&str>) -> ParseResult<Vec<Triple>> {
        let base_iri = base
            .map(|b| Iri::parse(b.to_string()).map_err(|e| ParseError::InvalidBase(e.to_string())))
            .transpose()?;
        let mut parser = rio_turtle::TurtleParser::new(input.as_bytes(), base_iri);

        let mut blanks: HashMap<String, BlankNode> = HashMap::new();
        let mut triples = Vec::new();
        parser.parse_all(&mut |t| -> Result<(), ParseError> {
            let subject = convert_subject(t.subject, &mut blanks)?;
            let predicate = convert_predicate(t.predicate)?;
            let object = convert_object(t.object, &mut blanks)?;
            triples.push(Triple::new(subject, predicate, object));
            Ok(())
        })?;

        Ok(triples)
    }
}

/// Turtle serializer
pub struct TurtleSerializer;

impl TurtleSerializer {
    pub fn serialize(triples: &[&Triple]) -> SerializeResult<String> {
        let mut formatter = TurtleFormatter::new(Vec::new());

        for triple in triples {
            let datatype = triple.object.as_literal().map(|l| l.datatype());

            let subject = match &triple.subject {
                RdfSubject::NamedNode(n) => model::Subject::NamedNode(model::NamedNode { iri: n.as_str() }),
                RdfSubject::BlankNode(b) => model::Subject::BlankNode(model::BlankNode { id: b.as_str() }),
            };
            let predicate = model::NamedNode {
                iri: triple.predicate.as_str(),
            };
            let object = match &triple.object {
                RdfObject::NamedNode(n) => model::Term::NamedNode(model::NamedNode { iri: n.as_str() }),
                RdfObject::BlankNode(b) => model::Term::BlankNode(model::BlankNode { id: b.as_str() }),
                RdfObject::Literal(l) => model::Term::Literal(rio_literal(l, datatype.as_ref())),
            };

            formatter
                .format(&model::Triple {
                    subject,
                    predicate,
                    object,
                })
                .map_err(|e| SerializeError::Serialize(e.to_string()))?;
        }

        let output = formatter.finish()?;
        String::from_utf8(output).map_err(|e| SerializeError::Serialize(e.to_string()))
    }
}

fn rio_literal<'a>(literal: &'a Literal, datatype: Option<&'a NamedNode>) -> model::Literal<'a> {
    if let Some(language) = literal.language() {
        return model::Literal::LanguageTaggedString {
            value: literal.value(),
            language,
        };
    }
    match datatype {
        Some(dt) if !literal.is_plain() => model::Literal::Typed {
            value: literal.value(),
            datatype: model::NamedNode { iri: dt.as_str() },
        },
        _ => model::Literal::Simple {
            value: literal.value(),
        },
    }
}

fn blank(id: &str, blanks: &mut HashMap<String, BlankNode>) -> BlankNode {
    blanks.entry(id.to_string()).or_default().clone()
}

fn invalid(e: impl std::fmt::Display) -> ParseError {
    ParseError::Parse(e.to_string())
}

fn convert_subject(
    s: model::Subject,
    blanks: &mut HashMap<String, BlankNode>,
) -> ParseResult<RdfSubject> {
    match s {
        model::Subject::NamedNode(n) => Ok(NamedNode::new(n.iri).map_err(invalid)?.into()),
        model::Subject::BlankNode(b) => Ok(blank(b.id, blanks).into()),
        #[allow(unreachable_patterns)]
        _ => Err(ParseError::Unsupported("quoted triple as subject".to_string())),
    }
}

fn convert_predicate(p: model::NamedNode) -> ParseResult<RdfPredicate> {
    RdfPredicate::new(p.iri).map_err(invalid)
}

fn convert_object(
    o: model::Term,
    blanks: &mut HashMap<String, BlankNode>,
) -> ParseResult<RdfObject> {
    match o {
        model::Term::NamedNode(n) => Ok(NamedNode::new(n.iri).map_err(invalid)?.into()),
        model::Term::BlankNode(b) => Ok(blank(b.id, blanks).into()),
        model::Term::Literal(model::Literal::Simple { value }) => {
            Ok(Literal::new_simple_literal(value).into())
        }
        model::Term::Literal(model::Literal::LanguageTaggedString { value, language }) => Ok(
            Literal::new_language_tagged_literal(value, language)
                .map_err(invalid)?
                .into(),
        ),
        model::Term::Literal(model::Literal::Typed { value, datatype }) => {
            let dt = NamedNode::new(datatype.iri).map_err(invalid)?;
            Ok(Literal::new_typed_literal(value, dt).into())
        }
        #[allow(unreachable_patterns)]
        _ => Err(ParseError::Unsupported("quoted triple as object".to_string())),
    }
}
