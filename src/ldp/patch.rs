//! RDF Patch bodies (`application/rdf-patch`)
//!
//! One change per line:
//!
//! ```text
//! A <> <http://purl.org/dc/terms/title> "Lamp" .
//! D <> <http://purl.org/dc/terms/title> "Old lamp" .
//! ```
//!
//! Terms use Turtle syntax and relative IRIs resolve against the patched
//! resource. Blank lines and `#` comments are skipped.

use super::{LdpError, LdpResult};
use crate::rdf::{RdfFormat, RdfParser, Triple};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOperation {
    Add(Triple),
    Delete(Triple),
}

impl PatchOperation {
    pub fn triple(&self) -> &Triple {
        match self {
            PatchOperation::Add(t) | PatchOperation::Delete(t) => t,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RdfPatch {
    operations: Vec<PatchOperation>,
}

impl RdfPatch {
    pub fn parse(input: &str, base: &str) -> LdpResult<Self> {
        let mut operations = Vec::new();

        for (n, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut chars = line.chars();
            let op = chars.next().unwrap_or_default();
            let rest = chars.as_str();
            let triple = || parse_triple(rest, base, n + 1);
            let operation = match op {
                'A' => PatchOperation::Add(triple()?),
                'D' => PatchOperation::Delete(triple()?),
                _ => {
                    return Err(LdpError::BadRequest(format!(
                        "line {}: unknown patch operation {:?}",
                        n + 1,
                        op
                    )))
                }
            };
            operations.push(operation);
        }

        Ok(Self { operations })
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

fn parse_triple(statement: &str, base: &str, line: usize) -> LdpResult<Triple> {
    let mut triples = RdfParser::parse(statement, RdfFormat::Turtle, Some(base))
        .map_err(|e| LdpError::BadRequest(format!("line {}: {}", line, e)))?;
    if triples.len() != 1 {
        return Err(LdpError::BadRequest(format!(
            "line {}: expected one triple, found {}",
            line,
            triples.len()
        )));
    }
    Ok(triples.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "coap://h/c/lamp";

    #[test]
    fn test_parse_operations() {
        let patch = RdfPatch::parse(
            r#"# rename
            A <> <http://purl.org/dc/terms/title> "Lamp" .

            D <> <http://purl.org/dc/terms/title> "Old" ."#,
            BASE,
        )
        .unwrap();

        assert_eq!(patch.operations().len(), 2);
        assert!(matches!(patch.operations()[0], PatchOperation::Add(_)));
        assert!(matches!(patch.operations()[1], PatchOperation::Delete(_)));
        assert_eq!(
            patch.operations()[0].triple().subject.to_string(),
            "<coap://h/c/lamp>"
        );
    }

    #[test]
    fn test_rejects_unknown_operation() {
        let err = RdfPatch::parse("X <> <http://e/p> <http://e/o> .", BASE).unwrap_err();
        assert!(matches!(err, LdpError::BadRequest(_)));
    }

    #[test]
    fn test_rejects_malformed_or_multiple_triples() {
        assert!(RdfPatch::parse("A <> <http://e/p> .", BASE).is_err());
        assert!(RdfPatch::parse("A <> <http://e/p> 1, 2 .", BASE).is_err());
    }

    #[test]
    fn test_empty_patch() {
        assert!(RdfPatch::parse("\n# nothing\n", BASE).unwrap().is_empty());
    }
}
