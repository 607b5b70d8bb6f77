//! Policies: extraction, plugin resolution and execution
//!
//! A policy is a node typed `fno:Execution` with an `fno:executes` target.
//! The [`Extractor`] turns such nodes into [`PolicyRecord`]s, the
//! [`Executor`] orders them and hands each to the [`Plugin`] registered for
//! its target.

use indexmap::IndexMap;
use serde::Serialize;

use crate::term::Term;

pub mod executor;
pub mod extractor;
pub mod plugins;
pub mod registry;

pub use executor::{Executor, Outcome};
pub use extractor::{extract_policies, Extractor};
pub use registry::{Plugin, PluginRegistry, PluginResolver, ResolvedPlugin};

/// Argument keys used by the bundled plugins
pub mod args {
    pub const TO: &str = "http://example.org/to";
    pub const NOTIFICATION: &str = "http://example.org/notification";
    pub const MESSAGE: &str = "http://example.org/message";
}

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("policy has no value for {0}")]
    MissingArgument(String),

    #[error("invalid value for {name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("missing configuration '{0}'")]
    MissingConfig(String),

    #[error(transparent)]
    Http(#[from] crate::http_client::HttpError),

    #[error(transparent)]
    Serialize(#[from] crate::serializer::SerializeError),

    #[error("{0}")]
    Other(String),
}

/// Provenance of the document a policy was found in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentContext {
    pub path: String,
    pub main_subject: String,
    pub origin: String,
}

impl DocumentContext {
    pub fn new(path: impl Into<String>, main_subject: impl Into<String>, origin: impl Into<String>) -> Self {
        DocumentContext {
            path: path.into(),
            main_subject: main_subject.into(),
            origin: origin.into(),
        }
    }
}

/// One executable policy found in a reasoning result
#[derive(Debug, Clone, Serialize)]
pub struct PolicyRecord {
    #[serde(serialize_with = "term_str")]
    pub node: Term,
    /// Execution target IRI
    pub target: String,
    pub order: i64,
    /// Predicate IRI to values, in discovery order
    #[serde(serialize_with = "args_str")]
    pub args: IndexMap<String, Vec<Term>>,
    pub main_subject: String,
    pub origin: String,
    pub path: String,
    /// Node linking to this policy through `pol:policy`, if any
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "opt_term_str")]
    pub linked_from: Option<Term>,
    /// Static settings of the registry entry for `target`
    pub config: serde_json::Map<String, serde_json::Value>,
}

impl PolicyRecord {
    pub fn new(node: Term, target: impl Into<String>, context: &DocumentContext) -> Self {
        PolicyRecord {
            node,
            target: target.into(),
            order: 1,
            args: IndexMap::new(),
            main_subject: context.main_subject.clone(),
            origin: context.origin.clone(),
            path: context.path.clone(),
            linked_from: None,
            config: serde_json::Map::new(),
        }
    }

    /// All values for `name`
    pub fn args_of(&self, name: &str) -> &[Term] {
        self.args.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value for `name`
    pub fn arg(&self, name: &str) -> Option<&Term> {
        self.args_of(name).first()
    }

    /// First value for `name` as a string, or an error naming the argument
    pub fn arg_str(&self, name: &str) -> Result<String, PluginError> {
        self.arg(name)
            .map(Term::value)
            .ok_or_else(|| PluginError::MissingArgument(name.to_string()))
    }

    pub fn push_arg(&mut self, name: impl Into<String>, value: Term) {
        self.args.entry(name.into()).or_default().push(value);
    }

    /// String setting from `config`
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }
}

fn term_str<S: serde::Serializer>(term: &Term, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(term)
}

fn opt_term_str<S: serde::Serializer>(term: &Option<Term>, s: S) -> Result<S::Ok, S::Error> {
    match term {
        Some(t) => s.collect_str(t),
        None => s.serialize_none(),
    }
}

fn args_str<S: serde::Serializer>(args: &IndexMap<String, Vec<Term>>, s: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = s.serialize_map(Some(args.len()))?;
    for (name, values) in args {
        let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
        map.serialize_entry(name, &rendered)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_accumulate() {
        let ctx = DocumentContext::new("in/a.ttl", "urn:s", "in/a.ttl");
        let mut record = PolicyRecord::new(Term::uri("urn:p"), "urn:target", &ctx);
        record.push_arg(args::TO, Term::literal("a"));
        record.push_arg(args::TO, Term::literal("b"));

        assert_eq!(record.order, 1);
        assert_eq!(record.args_of(args::TO), &[Term::literal("a"), Term::literal("b")]);
        assert_eq!(record.arg_str(args::TO).unwrap(), "a");
        assert!(matches!(record.arg_str(args::MESSAGE), Err(PluginError::MissingArgument(_))));
        assert!(record.args_of("urn:none").is_empty());
    }

    #[test]
    fn test_record_serializes_as_json() {
        let ctx = DocumentContext::new("in/a.ttl", "urn:s", "in/a.ttl");
        let mut record = PolicyRecord::new(Term::uri("urn:p"), "urn:target", &ctx);
        record.push_arg(args::MESSAGE, Term::literal("hi"));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["node"], "<urn:p>");
        assert_eq!(json["target"], "urn:target");
        assert_eq!(json["args"][args::MESSAGE][0], "\"hi\"");
        assert!(json.get("linked_from").is_none());
    }
}
