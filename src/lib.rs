//! koreografeye - policy-driven orchestration of RDF reasoning results
//!
//! An input knowledge graph is stamped with provenance markers, handed to
//! a reasoner together with N3 rules, and the policies the rules derive
//! are executed in order by plugins.
//!
//! # Architecture
//!
//! - [`graph`] - subgraph extraction, grounding, renaming, top subjects
//! - [`reasoner::Reasoner`] - one contract over an external reasoner
//!   process and the embedded forward chainer
//! - [`policy::Extractor`] - `fno:Execution` nodes to [`PolicyRecord`]s
//! - [`policy::Executor`] - ordered, failure-isolated plugin calls
//! - [`policy::Plugin`] - the capability a policy target resolves to
//! - [`pipeline`] - per-document stages and the batch worker pool
//!
//! # Example
//!
//! ```rust,ignore
//! use koreografeye::{parse_n3, reason, EmbeddedReasoner, Executor, PluginRegistry, DocumentContext};
//!
//! let data = parse_n3(DATA)?;
//! let mut reasoner = EmbeddedReasoner::new(vec!["--pass".into()]);
//! let result = reason(&mut reasoner, &data, &[RULES.to_string()])?;
//!
//! let registry = PluginRegistry::from_config(&config.plugins)?;
//! for outcome in Executor::new(&registry).run(&result, &DocumentContext::default()) {
//!     println!("{} -> {}", outcome.policy.target, outcome.result);
//! }
//! ```

pub mod builtins;
pub mod config;
pub mod error;
pub mod graph;
pub mod http_client;
pub mod parser;
pub mod pipeline;
pub mod policy;
pub mod query;
pub mod reasoner;
pub mod serializer;
pub mod store;
pub mod term;

// Re-export term types
pub use term::{ns, Bindings, BlankNode, Datatype, FormulaRef, GraphName, List, Literal, Quad, Term, Triple, Uri, Variable};

// Re-export parser and serializer entry points
pub use parser::{parse, parse_n3, Document, Format, ParseError};
pub use serializer::{frame_jsonld, serialize, to_n3, SerializeError};

pub use store::Store;

pub use graph::{add_provenance, extract_graph, get_object, ground_store, rename_subject_in_graph, top_subjects};

// Re-export reasoner types
pub use reasoner::{reason, EmbeddedReasoner, ProcessReasoner, Reasoner, ReasonerError, ReasonerState};

// Re-export policy types
pub use policy::{
    DocumentContext, Executor, Extractor, Outcome, Plugin, PluginError, PluginRegistry, PluginResolver, PolicyRecord,
};

pub use config::{ConfigError, KoreoConfig, PluginEntry, ReasonerBackend, ReasonerConfig};

pub use error::{ErrorCode, KoreoError, KoreoResult};
