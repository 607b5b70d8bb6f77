//! Basic graph pattern matching with OPTIONAL
//!
//! A deliberately small pattern engine: conjunctions of triple patterns
//! plus OPTIONAL groups, evaluated over one or more source stores. Blank
//! nodes in results are skolemized per source to
//! `urn:koreografeye:skolem:source<k>:<node key>` so that identical blank
//! nodes from different sources stay distinct; [`unskolemize`] maps such
//! an IRI back to the exact blank node of the source store.
//!
//! Data IRIs already under `urn:koreografeye:skolem:` are escaped to
//! `urn:koreografeye:skolem:iri:<iri>` in results, so [`restore`] never
//! mistakes one for a skolemized blank node.

use std::collections::HashMap;

use crate::store::Store;
use crate::term::{BlankNode, Quad, Term};

const SKOLEM_ROOT: &str = "urn:koreografeye:skolem:";
pub const SKOLEM_PREFIX: &str = "urn:koreografeye:skolem:source";
const ESCAPE_PREFIX: &str = "urn:koreografeye:skolem:iri:";

/// Variable name to bound term
pub type Solution = HashMap<String, Term>;

/// Term or variable in a pattern
#[derive(Debug, Clone)]
pub enum TermPattern {
    Variable(String),
    Term(Term),
}

impl TermPattern {
    pub fn var(name: &str) -> Self {
        TermPattern::Variable(name.to_string())
    }

    pub fn iri(iri: &str) -> Self {
        TermPattern::Term(Term::uri(iri))
    }
}

#[derive(Debug, Clone)]
pub struct TriplePattern {
    pub subject: TermPattern,
    pub predicate: TermPattern,
    pub object: TermPattern,
}

impl TriplePattern {
    pub fn new(subject: TermPattern, predicate: TermPattern, object: TermPattern) -> Self {
        TriplePattern { subject, predicate, object }
    }
}

#[derive(Debug, Clone)]
pub enum GraphPattern {
    Triple(TriplePattern),
    /// Left join: keeps the incoming solution when the group has no match
    Optional(Vec<GraphPattern>),
}

/// Skolem IRI for a blank node of source `source`
pub fn skolemize(source: usize, blank: &BlankNode) -> Term {
    Term::uri(format!("{}{}:{}", SKOLEM_PREFIX, source, blank.key()))
}

/// Reverse [`skolemize`]; `None` if `term` is not a skolem IRI
pub fn unskolemize(term: &Term) -> Option<BlankNode> {
    let (_, key) = skolem_parts(term)?;
    BlankNode::from_key(key)
}

/// The original term: blank node for a skolem IRI, the data IRI for an
/// escaped one, the term itself otherwise
pub fn restore(term: &Term) -> Term {
    if let Some(original) = term.as_uri().and_then(|u| u.as_str().strip_prefix(ESCAPE_PREFIX)) {
        return Term::uri(original);
    }
    unskolemize(term).map(Term::BlankNode).unwrap_or_else(|| term.clone())
}

/// Data term as it appears in results
fn escape(term: &Term) -> Term {
    match term.as_uri() {
        Some(u) if u.as_str().starts_with(SKOLEM_ROOT) => Term::uri(format!("{}{}", ESCAPE_PREFIX, u.as_str())),
        _ => term.clone(),
    }
}

fn skolem_parts(term: &Term) -> Option<(&str, &str)> {
    let rest = term.as_uri()?.as_str().strip_prefix(SKOLEM_PREFIX)?;
    rest.split_once(':')
}

/// Pattern evaluator over a fixed list of sources
pub struct QueryEngine<'a> {
    sources: Vec<&'a Store>,
}

impl<'a> QueryEngine<'a> {
    pub fn new(sources: Vec<&'a Store>) -> Self {
        QueryEngine { sources }
    }

    pub fn single(store: &'a Store) -> Self {
        QueryEngine { sources: vec![store] }
    }

    /// Evaluate the patterns as one group, in order
    pub fn select(&self, patterns: &[GraphPattern]) -> Vec<Solution> {
        self.evaluate_group(patterns, vec![Solution::new()])
    }

    fn evaluate_group(&self, patterns: &[GraphPattern], mut solutions: Vec<Solution>) -> Vec<Solution> {
        for pattern in patterns {
            solutions = self.evaluate_pattern(pattern, solutions);
            if solutions.is_empty() {
                break;
            }
        }
        solutions
    }

    fn evaluate_pattern(&self, pattern: &GraphPattern, solutions: Vec<Solution>) -> Vec<Solution> {
        match pattern {
            GraphPattern::Triple(tp) => {
                let mut next = Vec::new();
                for solution in &solutions {
                    for (k, source) in self.sources.iter().enumerate() {
                        for quad in self.candidates(k, source, tp, solution) {
                            if let Some(extended) = self.match_quad(k, tp, quad, solution) {
                                next.push(extended);
                            }
                        }
                    }
                }
                next
            }
            GraphPattern::Optional(group) => {
                let mut next = Vec::new();
                for solution in solutions {
                    let extended = self.evaluate_group(group, vec![solution.clone()]);
                    if extended.is_empty() {
                        next.push(solution);
                    } else {
                        next.extend(extended);
                    }
                }
                next
            }
        }
    }

    /// Quads worth trying; uses the subject index when the subject is known
    fn candidates(
        &self,
        k: usize,
        source: &'a Store,
        tp: &TriplePattern,
        solution: &Solution,
    ) -> Vec<&'a Quad> {
        let known = match &tp.subject {
            TermPattern::Term(t) => Some(escape(t)),
            TermPattern::Variable(v) => solution.get(v).cloned(),
        };
        let Some(presented) = known else {
            return source.iter().collect();
        };
        match skolem_parts(&presented) {
            Some((src, _)) if src != k.to_string() => Vec::new(),
            Some(_) => match unskolemize(&presented) {
                Some(blank) => source.quads_with_subject(&Term::BlankNode(blank)).collect(),
                None => Vec::new(),
            },
            None => source.quads_with_subject(&restore(&presented)).collect(),
        }
    }

    fn present(&self, k: usize, term: &Term) -> Term {
        match term {
            Term::BlankNode(b) => skolemize(k, b),
            other => escape(other),
        }
    }

    fn match_quad(&self, k: usize, tp: &TriplePattern, quad: &Quad, solution: &Solution) -> Option<Solution> {
        let mut extended = solution.clone();
        for (pattern, term) in [
            (&tp.subject, quad.subject()),
            (&tp.predicate, quad.predicate()),
            (&tp.object, quad.object()),
        ] {
            let presented = self.present(k, term);
            match pattern {
                TermPattern::Term(expected) => {
                    if escape(expected) != presented {
                        return None;
                    }
                }
                TermPattern::Variable(name) => match extended.get(name) {
                    Some(bound) if *bound != presented => return None,
                    Some(_) => {}
                    None => {
                        extended.insert(name.clone(), presented);
                    }
                },
            }
        }
        Some(extended)
    }
}
