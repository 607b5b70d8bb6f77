//! Reasoner abstraction
//!
//! Every inference backend implements [`Reasoner`]. An instance is single
//! use and moves through `Idle -> Accumulating -> Running -> Done | Failed`
//! without going back; calls out of order are rejected with
//! [`ReasonerError::InvalidState`].
//!
//! Two backends share nothing but this contract:
//! - [`ProcessReasoner`] writes its inputs to temporary files and runs an
//!   external reasoner binary
//! - [`EmbeddedReasoner`] hands its inputs to the in-process [`engine`]
//!   through a virtual filesystem
//!
//! Both call their engine with `default args + data files + rule files`.
//! [`reason`] composes serialize, accumulate, run, parse and cleanup.

use crate::config::{ReasonerBackend, ReasonerConfig};
use crate::parser::{parse_n3, ParseError};
use crate::serializer::to_n3;
use crate::store::Store;

pub mod embedded;
pub mod engine;
pub mod process;

pub use embedded::EmbeddedReasoner;
pub use engine::{ForwardChainer, Rule};
pub use process::ProcessReasoner;

#[derive(Debug, thiserror::Error)]
pub enum ReasonerError {
    #[error("cannot {action} while reasoner is {state:?}")]
    InvalidState {
        action: &'static str,
        state: ReasonerState,
    },

    #[error("reasoner I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reasoner exited with {status}: {stderr}")]
    ExecutionFailed { status: String, stderr: String },

    #[error("inference engine error: {0}")]
    Engine(String),

    #[error("invalid reasoner argument: {0}")]
    InvalidArgument(String),

    #[error("no such input file: {0}")]
    MissingFile(String),

    #[error("reasoner output is not valid N3: {0}")]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonerState {
    Idle,
    Accumulating,
    Running,
    Done,
    Failed,
}

/// State machine shared by the backends
#[derive(Debug)]
pub struct Lifecycle {
    state: ReasonerState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Lifecycle {
            state: ReasonerState::Idle,
        }
    }

    pub fn state(&self) -> ReasonerState {
        self.state
    }

    pub fn accumulate(&mut self) -> Result<(), ReasonerError> {
        match self.state {
            ReasonerState::Idle | ReasonerState::Accumulating => {
                self.state = ReasonerState::Accumulating;
                Ok(())
            }
            state => Err(ReasonerError::InvalidState {
                action: "accumulate",
                state,
            }),
        }
    }

    pub fn start(&mut self) -> Result<(), ReasonerError> {
        match self.state {
            ReasonerState::Idle | ReasonerState::Accumulating => {
                self.state = ReasonerState::Running;
                Ok(())
            }
            state => Err(ReasonerError::InvalidState { action: "run", state }),
        }
    }

    /// Leave `Running` according to `outcome`
    pub fn finish<T>(&mut self, outcome: Result<T, ReasonerError>) -> Result<T, ReasonerError> {
        self.state = if outcome.is_ok() {
            ReasonerState::Done
        } else {
            ReasonerState::Failed
        };
        outcome
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Inference backend contract
pub trait Reasoner: Send {
    fn name(&self) -> &str;

    fn state(&self) -> ReasonerState;

    /// Append assertional data (N3 text). Repeatable before `run`.
    fn accumulate_data(&mut self, text: &str) -> Result<(), ReasonerError>;

    /// Append rules (N3 text). Repeatable before `run`.
    fn accumulate_rules(&mut self, text: &str) -> Result<(), ReasonerError>;

    /// Run inference over everything accumulated; returns the result graph as N3
    fn run(&mut self) -> Result<String, ReasonerError>;

    /// Release backend resources. Idempotent, fine after a failed run.
    fn cleanup(&mut self);
}

/// Reason over `data` with the given rule texts
///
/// Cleanup runs on every path.
pub fn reason(reasoner: &mut dyn Reasoner, data: &Store, rules: &[String]) -> Result<Store, ReasonerError> {
    let span = tracing::debug_span!("reason", backend = reasoner.name(), quads = data.len(), rules = rules.len());
    let _enter = span.enter();

    let outcome = reason_inner(reasoner, data, rules);
    reasoner.cleanup();
    match &outcome {
        Ok(store) => tracing::debug!(result_quads = store.len(), "reasoning finished"),
        Err(e) => tracing::debug!(error = %e, "reasoning failed"),
    }
    outcome
}

fn reason_inner(reasoner: &mut dyn Reasoner, data: &Store, rules: &[String]) -> Result<Store, ReasonerError> {
    reasoner.accumulate_data(&to_n3(data))?;
    for rule in rules {
        reasoner.accumulate_rules(rule)?;
    }
    let output = reasoner.run()?;
    Ok(parse_n3(&output)?)
}

/// Fresh reasoner for one document, as configured
pub fn from_config(config: &ReasonerConfig) -> Box<dyn Reasoner> {
    match config.backend {
        ReasonerBackend::Process => Box::new(ProcessReasoner::new(&config.program, config.args.clone())),
        ReasonerBackend::Embedded => {
            let mut args = config.args.clone();
            args.push("--max-steps".to_string());
            args.push(config.max_steps.to_string());
            Box::new(EmbeddedReasoner::new(args))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{ns, Term, Triple};

    #[test]
    fn test_lifecycle_is_one_way() {
        let mut life = Lifecycle::new();
        assert_eq!(life.state(), ReasonerState::Idle);
        life.accumulate().unwrap();
        life.accumulate().unwrap();
        life.start().unwrap();
        assert!(life.accumulate().is_err());
        life.finish(Ok(())).unwrap();
        assert_eq!(life.state(), ReasonerState::Done);
        assert!(matches!(life.start(), Err(ReasonerError::InvalidState { .. })));
    }

    #[test]
    fn test_failed_run_is_terminal() {
        let mut life = Lifecycle::new();
        life.start().unwrap();
        let out: Result<(), _> = life.finish(Err(ReasonerError::Engine("boom".into())));
        assert!(out.is_err());
        assert_eq!(life.state(), ReasonerState::Failed);
        assert!(life.accumulate().is_err());
    }

    #[test]
    fn test_reason_pass_through_embedded() {
        let mut data = Store::new();
        let triple = Triple::new(
            Term::uri("http://example.org/a"),
            Term::uri(ns::RDF_TYPE),
            Term::uri("http://example.org/T"),
        );
        data.add(triple.clone());

        let mut reasoner = from_config(&ReasonerConfig {
            backend: ReasonerBackend::Embedded,
            ..ReasonerConfig::default()
        });
        let result = reason(reasoner.as_mut(), &data, &[]).unwrap();
        assert!(result.contains(&triple));
        assert_eq!(reasoner.state(), ReasonerState::Done);
    }
}
