//! In-process reasoner backend

use super::engine::{self, Vfs};
use super::{Lifecycle, Reasoner, ReasonerError, ReasonerState};

/// Feeds accumulated text to [`engine::main`] through a virtual filesystem
/// of `data_<i>.n3` and `rules_<i>.n3` files
pub struct EmbeddedReasoner {
    args: Vec<String>,
    vfs: Vfs,
    data_files: Vec<String>,
    rule_files: Vec<String>,
    lifecycle: Lifecycle,
    span: tracing::Span,
}

impl EmbeddedReasoner {
    pub fn new(args: Vec<String>) -> Self {
        EmbeddedReasoner {
            args,
            vfs: Vfs::new(),
            data_files: Vec::new(),
            rule_files: Vec::new(),
            lifecycle: Lifecycle::new(),
            span: tracing::debug_span!("embedded_reasoner"),
        }
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Engine argument vector: defaults, then data files, then rule files
    pub fn command_line(&self) -> Vec<String> {
        self.args
            .iter()
            .chain(&self.data_files)
            .chain(&self.rule_files)
            .cloned()
            .collect()
    }
}

impl Reasoner for EmbeddedReasoner {
    fn name(&self) -> &str {
        "embedded"
    }

    fn state(&self) -> ReasonerState {
        self.lifecycle.state()
    }

    fn accumulate_data(&mut self, text: &str) -> Result<(), ReasonerError> {
        self.lifecycle.accumulate()?;
        let name = format!("data_{}.n3", self.data_files.len());
        self.vfs.insert(name.clone(), text.to_string());
        self.data_files.push(name);
        Ok(())
    }

    fn accumulate_rules(&mut self, text: &str) -> Result<(), ReasonerError> {
        self.lifecycle.accumulate()?;
        let name = format!("rules_{}.n3", self.rule_files.len());
        self.vfs.insert(name.clone(), text.to_string());
        self.rule_files.push(name);
        Ok(())
    }

    fn run(&mut self) -> Result<String, ReasonerError> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.lifecycle.start()?;

        let args = self.command_line();
        tracing::debug!(args = ?args, "invoking embedded engine");
        let mut output = String::new();
        let status = engine::main(&self.vfs, &args, &mut |text| output.push_str(text));
        let outcome = status.map(|()| output);
        if let Err(e) = &outcome {
            tracing::error!(error = %e, "embedded engine failed");
        }
        self.lifecycle.finish(outcome)
    }

    fn cleanup(&mut self) {
        self.vfs.clear();
    }
}
