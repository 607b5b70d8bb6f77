//! Graph utilities
//!
//! Store-to-store helpers used around reasoning and policy execution:
//! top-subject detection, reachable subgraph extraction, subject renaming,
//! blank-node grounding and provenance stamping.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use fnv::{FnvHashMap, FnvHashSet};
use indexmap::IndexSet;

use crate::store::Store;
use crate::term::{BlankNode, GraphName, List, Quad, Term, Triple};

static GROUND_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_NAMESPACE: OnceLock<String> = OnceLock::new();

/// Namespace every grounded blank node is minted under for this process
pub fn ground_namespace() -> &'static str {
    RUN_NAMESPACE.get_or_init(|| format!("urn:uuid:{}#", uuid::Uuid::new_v4()))
}

/// Subjects that never occur as an object, in first-seen order
///
/// Members of a collection in object position count as objects.
pub fn top_subjects(store: &Store) -> IndexSet<Term> {
    let mut objects: FnvHashSet<&Term> = FnvHashSet::default();
    let mut nodes = Vec::new();
    for quad in store.iter() {
        objects.insert(quad.object());
        collect_nodes(quad.object(), &mut nodes);
    }
    objects.extend(nodes);
    store
        .iter()
        .map(|q| q.subject())
        .filter(|s| !objects.contains(s))
        .cloned()
        .collect()
}

/// Everything reachable from `subject` by following IRI and blank-node objects
///
/// Works off a queue with a visited set, so reference cycles terminate.
/// Collection members are followed like direct objects. Quads are copied
/// with their graph name.
pub fn extract_graph(store: &Store, subject: &Term) -> Store {
    let mut result = Store::new();
    let mut visited: FnvHashSet<Term> = FnvHashSet::default();
    let mut queue = VecDeque::new();

    visited.insert(subject.clone());
    queue.push_back(subject.clone());

    while let Some(current) = queue.pop_front() {
        for quad in store.quads_with_subject(&current) {
            result.add_quad(quad.clone());
            let mut nodes = Vec::new();
            collect_nodes(quad.object(), &mut nodes);
            for node in nodes {
                if visited.insert(node.clone()) {
                    queue.push_back(node.clone());
                }
            }
        }
    }

    result
}

/// IRIs and blank nodes in `term`, looking through nested collections
fn collect_nodes<'a>(term: &'a Term, nodes: &mut Vec<&'a Term>) {
    match term {
        Term::List(list) => {
            for item in list.items() {
                collect_nodes(item, nodes);
            }
        }
        t if t.is_node() => nodes.push(t),
        _ => {}
    }
}

/// Copy of `store` with every quad whose subject is `old` moved to `new`
pub fn rename_subject_in_graph(store: &Store, old: &Term, new: &Term) -> Store {
    store
        .iter()
        .map(|quad| {
            if quad.subject() == old {
                let triple = Triple::new(new.clone(), quad.predicate().clone(), quad.object().clone());
                Quad::new(triple, quad.graph.clone())
            } else {
                quad.clone()
            }
        })
        .collect()
}

/// Replace every blank node with a freshly minted IRI
///
/// One blank node maps to one IRI within a call; separate calls never reuse
/// an IRI. A store without blank nodes comes back unchanged.
pub fn ground_store(store: &Store) -> Store {
    let mut grounder = Grounder::default();
    store
        .iter()
        .map(|quad| {
            let triple = Triple::new(
                grounder.term(quad.subject()),
                grounder.term(quad.predicate()),
                grounder.term(quad.object()),
            );
            let graph = match &quad.graph {
                GraphName::Default => GraphName::Default,
                GraphName::Named(g) => GraphName::Named(grounder.term(g)),
            };
            Quad::new(triple, graph)
        })
        .collect()
}

#[derive(Default)]
struct Grounder {
    minted: FnvHashMap<BlankNode, Term>,
}

impl Grounder {
    fn term(&mut self, term: &Term) -> Term {
        match term {
            Term::BlankNode(b) => self
                .minted
                .entry(b.clone())
                .or_insert_with(|| {
                    let n = GROUND_SEQ.fetch_add(1, Ordering::Relaxed);
                    Term::uri(format!("{}{}", ground_namespace(), n))
                })
                .clone(),
            Term::List(list) => {
                let items = list.items().iter().map(|t| self.term(t)).collect();
                Term::List(Arc::new(List::new(items)))
            }
            other => other.clone(),
        }
    }
}

/// Stamp `[] predicate <object>` into the default graph
pub fn add_provenance(store: &mut Store, predicate: &str, object: &str) -> Term {
    let marker = Term::fresh_blank();
    store.add(Triple::new(marker.clone(), Term::uri(predicate), Term::uri(object)));
    marker
}

/// Object of the last quad using `predicate`, if any
pub fn get_object(store: &Store, predicate: &str) -> Option<Term> {
    store
        .iter()
        .filter(|q| matches!(q.predicate(), Term::Uri(u) if u.as_str() == predicate))
        .last()
        .map(|q| q.object().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::ns;

    fn ex(local: &str) -> Term {
        Term::uri(format!("http://example.org/{}", local))
    }

    fn t(s: &str, p: &str, o: &str) -> Triple {
        Triple::new(ex(s), ex(p), ex(o))
    }

    #[test]
    fn test_top_subjects() {
        let store: Store = vec![t("a", "b", "c"), t("c", "d", "e")].into_iter().collect();
        let top = top_subjects(&store);
        assert_eq!(top.len(), 1);
        assert!(top.contains(&ex("a")));
    }

    #[test]
    fn test_extract_graph() {
        let store: Store = vec![t("a", "b", "c"), t("a", "d", "e"), t("x", "y", "z")]
            .into_iter()
            .collect();
        let sub = extract_graph(&store, &ex("a"));
        let expected: Store = vec![t("a", "b", "c"), t("a", "d", "e")].into_iter().collect();
        assert_eq!(sub, expected);
    }

    #[test]
    fn test_extract_graph_follows_objects() {
        let b = Term::fresh_blank();
        let mut store = Store::new();
        store.add(Triple::new(ex("a"), ex("p"), b.clone()));
        store.add(Triple::new(b.clone(), ex("q"), Term::literal("v")));
        store.add(Triple::new(b, ex("r"), ex("c")));
        store.add(t("c", "s", "d"));
        store.add(t("other", "p", "a"));

        assert_eq!(extract_graph(&store, &ex("a")).len(), 4);
    }

    #[test]
    fn test_list_members_are_not_top_subjects() {
        let mut store = Store::new();
        store.add(Triple::new(ex("a"), ex("items"), Term::list(vec![ex("b"), Term::literal("x")])));
        store.add(Triple::new(ex("b"), ex("q"), Term::literal("bq")));

        let top = top_subjects(&store);
        assert_eq!(top.len(), 1);
        assert!(top.contains(&ex("a")));
    }

    #[test]
    fn test_extract_graph_follows_list_members() {
        let inner = Term::fresh_blank();
        let mut store = Store::new();
        let nested = Term::list(vec![ex("c")]);
        store.add(Triple::new(ex("a"), ex("items"), Term::list(vec![inner.clone(), ex("b"), nested])));
        store.add(Triple::new(inner, ex("name"), Term::literal("inner")));
        store.add(Triple::new(ex("b"), ex("q"), Term::literal("bq")));
        store.add(Triple::new(ex("c"), ex("q"), Term::literal("cq")));
        store.add(t("x", "y", "z"));

        assert_eq!(extract_graph(&store, &ex("a")).len(), 4);
    }

    #[test]
    fn test_extract_graph_terminates_on_cycles() {
        let store: Store = vec![t("a", "p", "b"), t("b", "p", "c"), t("c", "p", "a")]
            .into_iter()
            .collect();
        let sub = extract_graph(&store, &ex("b"));
        assert_eq!(sub.len(), 3);
        assert_eq!(extract_graph(&store, &ex("missing")).len(), 0);
    }

    #[test]
    fn test_rename_subject() {
        let store: Store = vec![t("a", "p", "a"), t("b", "p", "a")].into_iter().collect();
        let renamed = rename_subject_in_graph(&store, &ex("a"), &ex("n"));
        assert!(renamed.contains(&t("n", "p", "a")));
        assert!(renamed.contains(&t("b", "p", "a")));
        assert_eq!(renamed.len(), 2);
    }

    #[test]
    fn test_ground_store_shape() {
        let n1 = Term::blank("n1");
        let mut store = Store::new();
        store.add(Triple::new(ex("a"), ex("b"), n1.clone()));

        let ground = ground_store(&store);
        assert_eq!(ground.len(), 1);
        let object = ground.quads()[0].object().clone();
        assert!(object.value().starts_with(ground_namespace()));
        assert!(!object.is_blank());

        assert_eq!(ground_store(&ground), ground);
    }

    #[test]
    fn test_ground_store_identity() {
        let b = Term::blank("x");
        let mut store = Store::new();
        store.add(Triple::new(b.clone(), ex("p"), b.clone()));
        store.add(Triple::new(b, ex("q"), Term::literal("v")));

        let first = ground_store(&store);
        let q = &first.quads()[0];
        assert_eq!(q.subject(), q.object());
        assert_eq!(first.quads()[1].subject(), q.subject());

        let second = ground_store(&store);
        assert_ne!(second.quads()[0].subject(), q.subject());
    }

    #[test]
    fn test_provenance_and_get_object() {
        let mut store = Store::new();
        let marker = add_provenance(&mut store, ns::POL_MAIN_SUBJECT, "http://example.org/s1");
        add_provenance(&mut store, ns::POL_MAIN_SUBJECT, "http://example.org/s2");

        assert!(marker.is_blank());
        assert_eq!(store.len(), 2);
        assert!(store.quads()[0].graph.is_default());
        assert_eq!(
            get_object(&store, ns::POL_MAIN_SUBJECT),
            Some(Term::uri("http://example.org/s2"))
        );
        assert_eq!(get_object(&store, ns::POL_ORIGIN), None);
    }
}
