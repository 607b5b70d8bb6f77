//! Ordered, failure-isolated policy execution

use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;

use super::extractor::Extractor;
use super::registry::PluginResolver;
use super::{DocumentContext, PolicyRecord};
use crate::error::{ErrorCode, KoreoError};
use crate::graph::extract_graph;
use crate::store::Store;
use crate::term::Term;

/// Result of one policy
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub policy: PolicyRecord,
    pub result: bool,
}

/// Runs the policies of a document one after another in `sh:order`
///
/// A missing plugin, a plugin error and a plugin panic all count as a
/// failed outcome; the remaining policies still run.
pub struct Executor<'r> {
    resolver: &'r dyn PluginResolver,
    span: tracing::Span,
}

impl<'r> Executor<'r> {
    pub fn new(resolver: &'r dyn PluginResolver) -> Self {
        Executor {
            resolver,
            span: tracing::debug_span!("executor"),
        }
    }

    pub fn with_span(resolver: &'r dyn PluginResolver, span: tracing::Span) -> Self {
        Executor { resolver, span }
    }

    /// Extract, order and execute every policy in `store`
    pub fn run(&self, store: &Store, context: &DocumentContext) -> Vec<Outcome> {
        let _enter = self.span.enter();
        let extractor = Extractor::with_span(tracing::debug_span!(parent: &self.span, "extract"));
        let policies: Vec<PolicyRecord> = extractor.extract(store, context).into_values().collect();
        self.execute(store, policies)
    }

    /// Execute already extracted policies
    pub fn execute(&self, store: &Store, mut policies: Vec<PolicyRecord>) -> Vec<Outcome> {
        let _enter = self.span.enter();
        // stable: equal orders keep discovery order
        policies.sort_by_key(|p| p.order);
        tracing::debug!(count = policies.len(), "executing policies");

        policies
            .into_iter()
            .map(|policy| {
                let result = self.execute_one(store, &policy);
                Outcome { policy, result }
            })
            .collect()
    }

    fn execute_one(&self, store: &Store, policy: &PolicyRecord) -> bool {
        let Some(resolved) = self.resolver.resolve(&policy.target) else {
            let err = KoreoError::new(ErrorCode::PluginNotFound, "no plugin registered for target")
                .with_context("executes", policy.target.clone());
            tracing::error!(code = err.code.code(), policy = %policy.node, error = %err, "policy failed");
            return false;
        };

        let mut policy = policy.clone();
        policy.config = resolved.config.clone();

        let policy_graph = extract_graph(store, &policy.node);
        let main_graph = main_graph(store, &policy.main_subject);

        tracing::info!(
            plugin = resolved.plugin.name(),
            order = policy.order,
            policy = %policy.node,
            "calling plugin"
        );
        let called = panic::catch_unwind(AssertUnwindSafe(|| {
            resolved.plugin.execute(&main_graph, &policy_graph, &policy)
        }));

        match called {
            Ok(Ok(result)) => {
                tracing::info!(plugin = resolved.plugin.name(), result, "plugin returned");
                result
            }
            Ok(Err(e)) => {
                let err = KoreoError::from(e).with_context("plugin", resolved.plugin.name());
                tracing::error!(code = err.code.code(), policy = %policy.node, error = %err, "plugin failed");
                false
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic".to_string());
                let err = KoreoError::new(ErrorCode::PluginExecutionError, format!("plugin panicked: {}", message))
                    .with_context("plugin", resolved.plugin.name());
                tracing::error!(code = err.code.code(), policy = %policy.node, error = %err, "plugin failed");
                false
            }
        }
    }
}

/// The main-subject subgraph, or the whole store when it has none
fn main_graph<'s>(store: &'s Store, main_subject: &str) -> Cow<'s, Store> {
    if main_subject.is_empty() {
        return Cow::Borrowed(store);
    }
    let graph = extract_graph(store, &Term::uri(main_subject));
    if graph.is_empty() {
        Cow::Borrowed(store)
    } else {
        Cow::Owned(graph)
    }
}

/// Outcomes that failed
pub fn failures(outcomes: &[Outcome]) -> usize {
    outcomes.iter().filter(|o| !o.result).count()
}

/// Outcomes that succeeded
pub fn successes(outcomes: &[Outcome]) -> usize {
    outcomes.iter().filter(|o| o.result).count()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::parser::parse_n3;
    use crate::policy::registry::{Plugin, PluginRegistry};
    use crate::policy::PluginError;

    struct Recorder {
        seen: Arc<Mutex<Vec<i64>>>,
        fail_on: Option<i64>,
        panic_on: Option<i64>,
    }

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn execute(&self, _main: &Store, policy_graph: &Store, policy: &PolicyRecord) -> Result<bool, PluginError> {
            assert!(!policy_graph.is_empty());
            self.seen.lock().unwrap().push(policy.order);
            if self.panic_on == Some(policy.order) {
                panic!("recorder blew up");
            }
            if self.fail_on == Some(policy.order) {
                return Err(PluginError::Other("refused".into()));
            }
            Ok(true)
        }
    }

    fn registry(fail_on: Option<i64>, panic_on: Option<i64>) -> (PluginRegistry, Arc<Mutex<Vec<i64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();
        registry.register(
            "http://example.org/Record",
            Arc::new(Recorder {
                seen: seen.clone(),
                fail_on,
                panic_on,
            }),
            serde_json::Map::new(),
        );
        (registry, seen)
    }

    const POLICIES: &str = "@prefix ex: <http://example.org/> .\n\
        @prefix fno: <https://w3id.org/function/ontology#> .\n\
        @prefix sh: <http://www.w3.org/ns/shacl#> .\n\
        ex:p3 a fno:Execution ; fno:executes ex:Record ; sh:order 3 .\n\
        ex:p1 a fno:Execution ; fno:executes ex:Record ; sh:order 1 .\n\
        ex:p2 a fno:Execution ; fno:executes ex:Record ; sh:order 2 .\n";

    #[test]
    fn test_execution_order() {
        let store = parse_n3(POLICIES).unwrap();
        let (registry, seen) = registry(None, None);
        let outcomes = Executor::new(&registry).run(&store, &DocumentContext::default());

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(successes(&outcomes), 3);
    }

    #[test]
    fn test_failures_are_isolated() {
        let store = parse_n3(POLICIES).unwrap();
        let (registry, seen) = registry(Some(2), None);
        let outcomes = Executor::new(&registry).run(&store, &DocumentContext::default());

        let results: Vec<bool> = outcomes.iter().map(|o| o.result).collect();
        assert_eq!(results, vec![true, false, true]);
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(failures(&outcomes), 1);
    }

    #[test]
    fn test_panics_are_isolated() {
        let store = parse_n3(POLICIES).unwrap();
        let (registry, _) = registry(None, Some(1));
        let outcomes = Executor::new(&registry).run(&store, &DocumentContext::default());

        let results: Vec<bool> = outcomes.iter().map(|o| o.result).collect();
        assert_eq!(results, vec![false, true, true]);
    }

    #[test]
    fn test_unknown_target_fails_but_continues() {
        let store = parse_n3(
            "@prefix ex: <http://example.org/> .\n\
             @prefix fno: <https://w3id.org/function/ontology#> .\n\
             ex:a a fno:Execution ; fno:executes ex:Nobody .\n\
             ex:b a fno:Execution ; fno:executes ex:Record .\n",
        )
        .unwrap();
        let (registry, _) = registry(None, None);
        let outcomes = Executor::new(&registry).run(&store, &DocumentContext::default());

        let results: Vec<bool> = outcomes.iter().map(|o| o.result).collect();
        assert_eq!(results, vec![false, true]);
    }

    #[test]
    fn test_main_graph_falls_back_to_store() {
        let store = parse_n3("<http://example.org/s> <http://example.org/p> <http://example.org/o> .").unwrap();
        assert_eq!(main_graph(&store, "http://example.org/s").len(), 1);
        assert_eq!(main_graph(&store, "http://example.org/unknown").len(), 1);
        assert!(matches!(main_graph(&store, ""), Cow::Borrowed(_)));
    }
}
