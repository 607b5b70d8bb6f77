//! N-Quads: one statement per line, optional fourth graph term

use std::sync::Arc;

use fnv::FnvHashMap;

use super::n3::{blank_label, iri_ref, skip_ws, string_literal};
use super::{location, Document, ParseError};
use crate::term::{BlankNode, GraphName, Quad, Term, Triple, Uri};

struct LineParser<'s> {
    source: &'s str,
    blank_labels: FnvHashMap<String, BlankNode>,
}

impl<'s> LineParser<'s> {
    fn syntax(&self, at: &str, message: &str) -> ParseError {
        let (line, column) = location(self.source, at);
        ParseError::Syntax {
            line,
            column,
            message: message.to_string(),
        }
    }

    fn node<'a>(&mut self, input: &'a str) -> Option<(&'a str, Term)> {
        let input = skip_ws(input);
        if let Ok((rest, iri)) = iri_ref(input) {
            return Some((rest, Term::Uri(Arc::new(Uri::new(iri.to_string())))));
        }
        if let Ok((rest, label)) = blank_label(input) {
            let node = self
                .blank_labels
                .entry(label.to_string())
                .or_insert_with(|| BlankNode::labeled(label))
                .clone();
            return Some((rest, Term::BlankNode(node)));
        }
        None
    }

    fn object<'a>(&mut self, input: &'a str) -> Option<(&'a str, Term)> {
        let input = skip_ws(input);
        if let Some(found) = self.node(input) {
            return Some(found);
        }
        let (rest, lexical) = string_literal(input).ok()?;
        if let Some(after) = rest.strip_prefix("^^") {
            let (after, dt) = iri_ref(after).ok()?;
            return Some((after, Term::typed_literal(lexical, dt)));
        }
        if let Some(after) = rest.strip_prefix('@') {
            let end = after
                .find(|c: char| !(c.is_alphanumeric() || c == '-'))
                .unwrap_or(after.len());
            return Some((&after[end..], Term::lang_literal(lexical, &after[..end])));
        }
        Some((rest, Term::literal(lexical)))
    }

    fn statement(&mut self, line: &'s str) -> Result<Quad, ParseError> {
        let (rest, subject) = self
            .node(line)
            .ok_or_else(|| self.syntax(line, "expected subject IRI or blank node"))?;
        let rest = skip_ws(rest);
        let (rest, predicate) = iri_ref(rest)
            .map(|(r, iri)| (r, Term::uri(iri)))
            .map_err(|_| self.syntax(rest, "expected predicate IRI"))?;
        let (rest, object) = self
            .object(rest)
            .ok_or_else(|| self.syntax(rest, "expected object"))?;

        let rest = skip_ws(rest);
        let (rest, graph) = match self.node(rest) {
            Some((r, g)) => (r, GraphName::Named(g)),
            None => (rest, GraphName::Default),
        };

        let rest = skip_ws(rest);
        let rest = rest
            .strip_prefix('.')
            .ok_or_else(|| self.syntax(rest, "expected '.' at end of statement"))?;
        let rest = skip_ws(rest);
        if !rest.is_empty() {
            return Err(self.syntax(rest, "trailing content after statement"));
        }

        Ok(Quad::new(Triple::new(subject, predicate, object), graph))
    }
}

/// Parse an N-Quads document (N-Triples is accepted as well)
pub fn parse(input: &str) -> Result<Document, ParseError> {
    let mut parser = LineParser {
        source: input,
        blank_labels: FnvHashMap::default(),
    };
    let mut doc = Document::default();

    for line in input.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let quad = parser.statement(line)?;
        doc.store.add_quad(quad);
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_and_default_graphs() {
        let doc = parse(
            "<http://e.org/s> <http://e.org/p> \"v\"@en <http://e.org/g> .\n\
             # comment\n\
             _:b0 <http://e.org/p> _:b0 .\n",
        )
        .unwrap();
        assert_eq!(doc.store.len(), 2);
        let first = &doc.store.quads()[0];
        assert_eq!(first.graph, GraphName::Named(Term::uri("http://e.org/g")));
        assert_eq!(first.object(), &Term::lang_literal("v", "en"));

        let second = &doc.store.quads()[1];
        assert!(second.graph.is_default());
        assert_eq!(second.subject(), second.object());
    }

    #[test]
    fn test_bad_line_reports_position() {
        let err = parse("<http://e.org/s> <http://e.org/p> .\n").unwrap_err();
        assert_eq!(err.line(), Some(1));
    }
}
