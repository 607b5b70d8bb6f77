//! Policy extraction from reasoning results

use fnv::FnvHashSet;
use indexmap::IndexMap;

use super::{DocumentContext, PolicyRecord};
use crate::error::{ErrorCode, KoreoError};
use crate::query::{restore, GraphPattern, QueryEngine, Solution, TermPattern, TriplePattern};
use crate::store::Store;
use crate::term::{ns, Term};

/// Finds `fno:Execution` nodes and builds their records
pub struct Extractor {
    span: tracing::Span,
}

struct Draft {
    record: PolicyRecord,
    target: Option<Term>,
    order: Option<Term>,
    seen: FnvHashSet<(String, Term)>,
}

impl Extractor {
    pub fn new() -> Self {
        Extractor {
            span: tracing::debug_span!("extractor"),
        }
    }

    pub fn with_span(span: tracing::Span) -> Self {
        Extractor { span }
    }

    /// The fixed policy query
    ///
    /// `?policy a fno:Execution`, optionally `fno:executes ?target`,
    /// `sh:order ?order`, `?link pol:policy ?policy` and any
    /// `?policy ?name ?value`. The target is optional here so that a policy
    /// without one can be reported instead of vanishing from the results.
    pub fn patterns() -> Vec<GraphPattern> {
        let triple = |s, p, o| GraphPattern::Triple(TriplePattern::new(s, p, o));
        vec![
            triple(
                TermPattern::var("policy"),
                TermPattern::iri(ns::RDF_TYPE),
                TermPattern::iri(ns::FNO_EXECUTION),
            ),
            GraphPattern::Optional(vec![triple(
                TermPattern::var("policy"),
                TermPattern::iri(ns::FNO_EXECUTES),
                TermPattern::var("target"),
            )]),
            GraphPattern::Optional(vec![triple(
                TermPattern::var("policy"),
                TermPattern::iri(ns::SH_ORDER),
                TermPattern::var("order"),
            )]),
            GraphPattern::Optional(vec![triple(
                TermPattern::var("link"),
                TermPattern::iri(ns::POL_POLICY),
                TermPattern::var("policy"),
            )]),
            GraphPattern::Optional(vec![triple(
                TermPattern::var("policy"),
                TermPattern::var("name"),
                TermPattern::var("value"),
            )]),
        ]
    }

    /// Policies keyed by node, in discovery order
    pub fn extract(&self, store: &Store, context: &DocumentContext) -> IndexMap<Term, PolicyRecord> {
        let _enter = self.span.enter();

        let rows = QueryEngine::single(store).select(&Self::patterns());
        tracing::trace!(rows = rows.len(), "policy query finished");

        let mut drafts: IndexMap<Term, Draft> = IndexMap::new();
        for row in &rows {
            self.absorb(&mut drafts, row, context);
        }

        let mut policies = IndexMap::new();
        for (node, draft) in drafts {
            if let Some(record) = self.finish(draft) {
                tracing::info!(policy = %node, executes = %record.target, order = record.order, "found policy");
                policies.insert(node, record);
            }
        }
        policies
    }

    fn absorb(&self, drafts: &mut IndexMap<Term, Draft>, row: &Solution, context: &DocumentContext) {
        let Some(node) = row.get("policy").map(restore) else {
            tracing::error!("policy row without a policy node");
            return;
        };
        if !node.is_node() {
            tracing::error!(policy = %node, "policy identifier is neither an IRI nor a blank node; skipped");
            return;
        }

        let draft = drafts.entry(node.clone()).or_insert_with(|| Draft {
            record: PolicyRecord::new(node.clone(), String::new(), context),
            target: None,
            order: None,
            seen: FnvHashSet::default(),
        });

        if let Some(target) = row.get("target").map(restore) {
            if let Some(first) = &draft.target {
                if *first != target {
                    tracing::warn!(policy = %node, kept = %first, ignored = %target, "policy has several targets");
                }
            } else {
                draft.target = Some(target);
            }
        }
        if let Some(order) = row.get("order") {
            if draft.order.is_none() {
                draft.order = Some(order.clone());
            }
        }
        if let Some(link) = row.get("link").map(restore) {
            draft.record.linked_from.get_or_insert(link);
        }
        if let (Some(name), Some(value)) = (row.get("name"), row.get("value")) {
            let name = name.value();
            let value = restore(value);
            if draft.seen.insert((name.clone(), value.clone())) {
                draft.record.push_arg(name, value);
            }
        }
    }

    fn finish(&self, draft: Draft) -> Option<PolicyRecord> {
        let Draft {
            mut record,
            target,
            order,
            ..
        } = draft;

        let missing = match target {
            Some(Term::Uri(iri)) => {
                record.target = iri.as_str().to_string();
                None
            }
            Some(other) => Some(
                KoreoError::new(ErrorCode::PolicyMissingTarget, "policy target is not an IRI")
                    .with_context("executes", other.to_string()),
            ),
            None => Some(KoreoError::new(ErrorCode::PolicyMissingTarget, "policy has no fno:executes target")),
        };
        if let Some(err) = missing {
            let err = err.with_context("policy", record.node.to_string());
            tracing::error!(code = err.code.code(), policy = %record.node, error = %err, "policy dropped");
            return None;
        }

        if let Some(order) = order {
            match parse_order(&order) {
                Some(n) => record.order = n,
                None => {
                    tracing::warn!(policy = %record.node, order = %order, "unreadable sh:order, using 1");
                }
            }
        }
        Some(record)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_order(term: &Term) -> Option<i64> {
    let literal = term.as_literal()?;
    literal.as_integer().or_else(|| {
        literal
            .as_float()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// [`Extractor::extract`] with a default span
pub fn extract_policies(store: &Store, context: &DocumentContext) -> IndexMap<Term, PolicyRecord> {
    Extractor::new().extract(store, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::extract_graph;
    use crate::parser::parse_n3;

    const PREFIXES: &str = "@prefix ex: <http://example.org/> .\n\
        @prefix fno: <https://w3id.org/function/ontology#> .\n\
        @prefix sh: <http://www.w3.org/ns/shacl#> .\n\
        @prefix pol: <https://www.example.org/ns/policy#> .\n";

    fn extract(text: &str) -> IndexMap<Term, PolicyRecord> {
        let store = parse_n3(&format!("{}{}", PREFIXES, text)).unwrap();
        extract_policies(&store, &DocumentContext::new("doc.ttl", "urn:main", "doc.ttl"))
    }

    #[test]
    fn test_basic_record() {
        let policies = extract(
            "ex:p1 a fno:Execution ; fno:executes ex:Send ; sh:order 2 ; ex:to \"a\" .",
        );
        assert_eq!(policies.len(), 1);
        let record = &policies[&Term::uri("http://example.org/p1")];
        assert_eq!(record.target, "http://example.org/Send");
        assert_eq!(record.order, 2);
        assert_eq!(record.main_subject, "urn:main");
        assert_eq!(record.path, "doc.ttl");
        assert_eq!(record.args_of("http://example.org/to"), &[Term::literal("a")]);
        assert_eq!(record.args_of(ns::FNO_EXECUTES), &[Term::uri("http://example.org/Send")]);
    }

    #[test]
    fn test_default_order_and_arg_aggregation() {
        let policies = extract("ex:p a fno:Execution ; fno:executes ex:T ; ex:to \"a\", \"b\" .");
        let record = &policies[0];
        assert_eq!(record.order, 1);
        assert_eq!(
            record.args_of("http://example.org/to"),
            &[Term::literal("a"), Term::literal("b")]
        );
    }

    #[test]
    fn test_missing_target_is_dropped() {
        let policies = extract(
            "ex:p1 a fno:Execution ; ex:to \"a\" .\n\
             ex:p2 a fno:Execution ; fno:executes ex:T .\n\
             ex:p3 a fno:Execution ; fno:executes \"not an iri\" .",
        );
        assert_eq!(policies.len(), 1);
        assert!(policies.contains_key(&Term::uri("http://example.org/p2")));
    }

    #[test]
    fn test_discovery_order_and_bad_order_value() {
        let policies = extract(
            "ex:b a fno:Execution ; fno:executes ex:T ; sh:order \"soon\" .\n\
             ex:a a fno:Execution ; fno:executes ex:T ; sh:order \"3\" .",
        );
        let nodes: Vec<&Term> = policies.keys().collect();
        assert_eq!(nodes, vec![&Term::uri("http://example.org/b"), &Term::uri("http://example.org/a")]);
        assert_eq!(policies[0].order, 1);
        assert_eq!(policies[1].order, 3);
    }

    #[test]
    fn test_blank_policy_and_blank_argument_round_trip() {
        let store = parse_n3(&format!(
            "{}ex:origin pol:policy [ a fno:Execution ; fno:executes ex:Send ;\n\
                 ex:notification [ a ex:Offer ; ex:actor ex:alice ] ] .",
            PREFIXES
        ))
        .unwrap();
        let policies = extract_policies(&store, &DocumentContext::default());
        assert_eq!(policies.len(), 1);

        let (node, record) = policies.first().unwrap();
        assert!(node.is_blank());
        assert_eq!(record.linked_from, Some(Term::uri("http://example.org/origin")));

        let body = record.arg("http://example.org/notification").unwrap();
        assert!(body.is_blank());
        let direct = extract_graph(&store, body);
        assert_eq!(direct.len(), 2);
        assert_eq!(extract_graph(&store, node).len(), 5);
    }
}
