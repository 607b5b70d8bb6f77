//! End-to-end runs: reason with the embedded engine, write the result,
//! read it back and execute the derived policies with stub plugins.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use koreografeye::error::ErrorCode;
use koreografeye::pipeline::{execute_document, load_store, read_rules, reason_document, run_batch};
use koreografeye::policy::args;
use koreografeye::policy::plugins::SendNotificationPlugin;
use koreografeye::{
    extract_graph, serialize, EmbeddedReasoner, Format, Plugin, PluginError, PluginRegistry, PolicyRecord,
    ProcessReasoner, Store, Term,
};

const OFFER: &str = "@prefix as: <https://www.w3.org/ns/activitystreams#> .\n\
    @prefix ex: <http://example.org/> .\n\
    ex:offer a as:Offer ;\n\
        as:actor ex:alice ;\n\
        as:object [ a as:Document ; as:name \"report\" ] .\n";

const RULES: &str = "@prefix as: <https://www.w3.org/ns/activitystreams#> .\n\
    @prefix ex: <http://example.org/> .\n\
    @prefix fno: <https://w3id.org/function/ontology#> .\n\
    @prefix sh: <http://www.w3.org/ns/shacl#> .\n\
    @prefix pol: <https://www.example.org/ns/policy#> .\n\
    { ?m pol:mainSubject ?s . ?s a as:Offer . ?s as:actor ?who }\n\
    =>\n\
    {\n\
        ex:notify pol:policy [ a fno:Execution ; fno:executes ex:Record ; sh:order 3 ; ex:message \"third\" ] .\n\
        [] a fno:Execution ; fno:executes ex:Record ; sh:order 1 ; ex:message \"first\" .\n\
        [] a fno:Execution ; fno:executes ex:Record ; sh:order 2 ; ex:message \"second\" .\n\
        [] a fno:Execution ; fno:executes ex:Send ; sh:order 4 ;\n\
            ex:to <http://example.org/inbox/> ;\n\
            ex:notification [ a as:Accept ; as:actor ex:bob ; as:object ?s ] .\n\
    } .\n";

struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Plugin for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn execute(&self, main: &Store, _policy_graph: &Store, policy: &PolicyRecord) -> Result<bool, PluginError> {
        assert!(!main.is_empty());
        self.seen.lock().unwrap().push(policy.arg_str(args::MESSAGE)?);
        Ok(true)
    }
}

/// Checks the notification without sending it
struct DryRunSend {
    inner: SendNotificationPlugin,
    bodies: Arc<Mutex<Vec<String>>>,
}

impl Plugin for DryRunSend {
    fn name(&self) -> &str {
        "dry_run_send"
    }

    fn execute(&self, _main: &Store, policy_graph: &Store, policy: &PolicyRecord) -> Result<bool, PluginError> {
        match self.inner.prepare(policy_graph, policy)? {
            Some((_, body)) => {
                self.bodies.lock().unwrap().push(body);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn registry() -> (PluginRegistry, Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let mut registry = PluginRegistry::new();
    registry.register(
        "http://example.org/Record",
        Arc::new(Recorder { seen: seen.clone() }),
        Default::default(),
    );
    registry.register(
        "http://example.org/Send",
        Arc::new(DryRunSend {
            inner: SendNotificationPlugin::from_config(&Default::default()).unwrap(),
            bodies: bodies.clone(),
        }),
        Default::default(),
    );
    (registry, seen, bodies)
}

fn workspace() -> (tempfile::TempDir, PathBuf, Vec<String>) {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("in")).unwrap();
    fs::create_dir(dir.path().join("out")).unwrap();
    let rules_path = dir.path().join("rules.n3");
    fs::write(&rules_path, RULES).unwrap();
    let rules = read_rules(&[rules_path]).unwrap();
    let input = dir.path().join("in").join("offer.ttl");
    fs::write(&input, OFFER).unwrap();
    (dir, input, rules)
}

/// orch stage: reason and write the Turtle result next to the inputs
fn orch(input: &Path, rules: &[String], out: &Path) -> PathBuf {
    let mut reasoner = EmbeddedReasoner::new(vec!["--quiet".into(), "--pass".into()]);
    let result = reason_document(&mut reasoner, input, rules).unwrap();
    let target = out.join(input.file_name().unwrap());
    fs::write(&target, serialize(&result, Format::Turtle, &Default::default()).unwrap()).unwrap();
    target
}

#[test]
fn test_reason_then_execute_in_order() {
    let (dir, input, rules) = workspace();
    let result = orch(&input, &rules, &dir.path().join("out"));

    let store = load_store(&result).unwrap();
    let (registry, seen, bodies) = registry();
    let outcomes = execute_document(&store, &registry, &result).unwrap();

    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(|o| o.result));
    assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);

    let orders: Vec<i64> = outcomes.iter().map(|o| o.policy.order).collect();
    assert_eq!(orders, vec![1, 2, 3, 4]);

    let linked = outcomes.iter().find(|o| o.policy.linked_from.is_some()).unwrap();
    assert_eq!(linked.policy.order, 3);
    assert_eq!(linked.policy.linked_from, Some(Term::uri("http://example.org/notify")));

    for outcome in &outcomes {
        assert_eq!(outcome.policy.main_subject, "http://example.org/offer");
        assert!(outcome.policy.origin.ends_with("offer.ttl"));
    }

    let bodies = bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("urn:uuid:"));
    assert!(bodies[0].contains("http://example.org/offer"));
}

#[test]
fn test_blank_notification_survives_the_round_trip() {
    let (dir, input, rules) = workspace();
    let result = orch(&input, &rules, &dir.path().join("out"));
    let store = load_store(&result).unwrap();

    let policies = koreografeye::policy::extract_policies(&store, &Default::default());
    let send = policies
        .values()
        .find(|p| p.target == "http://example.org/Send")
        .unwrap();
    let notification = send.arg(args::NOTIFICATION).unwrap();
    assert!(notification.is_blank());

    let graph = extract_graph(&store, notification);
    assert_eq!(graph.iter().filter(|q| q.subject() == notification).count(), 3);
    let offer = Term::uri("http://example.org/offer");
    assert!(graph.iter().any(|q| q.subject() == &offer));
}

#[test]
fn test_unknown_target_fails_only_that_policy() {
    let (dir, input, rules) = workspace();
    let result = orch(&input, &rules, &dir.path().join("out"));
    let store = load_store(&result).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut registry = PluginRegistry::new();
    registry.register("http://example.org/Record", Arc::new(Recorder { seen: seen.clone() }), Default::default());

    let outcomes = execute_document(&store, &registry, &result).unwrap();
    let results: Vec<bool> = outcomes.iter().map(|o| o.result).collect();
    assert_eq!(results, vec![true, true, true, false]);
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[test]
fn test_result_without_provenance_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.ttl");
    fs::write(&path, OFFER).unwrap();
    let store = load_store(&path).unwrap();

    let (registry, _, _) = registry();
    let err = execute_document(&store, &registry, &path).unwrap_err();
    assert_eq!(err.code, ErrorCode::NoMainSubject);
}

#[test]
fn test_missing_reasoner_binary_fails_the_document() {
    let (_dir, input, rules) = workspace();
    let mut reasoner = ProcessReasoner::new("koreografeye-no-such-reasoner", vec![]);
    let err = reason_document(&mut reasoner, &input, &rules).unwrap_err();
    assert_eq!(err.code, ErrorCode::ReasonerSpawnFailed);
    assert!(err.is_document_fatal());
}

#[test]
fn test_batch_of_documents() {
    let (dir, _, rules) = workspace();
    let inputs: Vec<PathBuf> = (0..6)
        .map(|i| {
            let path = dir.path().join("in").join(format!("doc{}.ttl", i));
            let text = if i == 3 { "<http://example.org/a> <http://example.org/b> \"unterminated .\n".to_string() } else { OFFER.to_string() };
            fs::write(&path, text).unwrap();
            path
        })
        .collect();

    let out = dir.path().join("out");
    let results = run_batch(&inputs, 3, |input| {
        let mut reasoner = EmbeddedReasoner::new(vec!["--pass".into()]);
        reason_document(&mut reasoner, input, &rules)
            .map(|store| {
                fs::write(out.join(input.file_name().unwrap()), koreografeye::to_n3(&store)).unwrap();
            })
            .is_ok()
    });

    let flags: Vec<bool> = results.iter().map(|(_, ok)| *ok).collect();
    assert_eq!(flags, vec![true, true, true, false, true, true]);
    assert_eq!(fs::read_dir(&out).unwrap().count(), 5);
}
