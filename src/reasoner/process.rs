//! External reasoner process backend

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tempfile::NamedTempFile;

use super::{Lifecycle, Reasoner, ReasonerError, ReasonerState};

/// Runs `program <args> <data files> <rule files>` and reads stdout
///
/// Inputs live in temporary files that exist from `accumulate_*` until
/// `cleanup`. The child is waited on synchronously.
pub struct ProcessReasoner {
    program: String,
    args: Vec<String>,
    data: Vec<NamedTempFile>,
    rules: Vec<NamedTempFile>,
    lifecycle: Lifecycle,
    span: tracing::Span,
}

impl ProcessReasoner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let span = tracing::debug_span!("process_reasoner", program = %program);
        ProcessReasoner {
            program,
            args,
            data: Vec::new(),
            rules: Vec::new(),
            lifecycle: Lifecycle::new(),
            span,
        }
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Paths of the temp files in command-line order
    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.data
            .iter()
            .chain(&self.rules)
            .map(|f| f.path().to_path_buf())
            .collect()
    }

    fn write_temp(kind: &str, text: &str) -> Result<NamedTempFile, ReasonerError> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("koreografeye-{}-", kind))
            .suffix(".n3")
            .tempfile()?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(file)
    }

    fn execute(&self) -> Result<String, ReasonerError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .args(self.input_paths())
            .stdin(Stdio::null());
        tracing::debug!(command = ?command, "spawning reasoner");

        let output = command.output().map_err(|source| ReasonerError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(ReasonerError::ExecutionFailed {
                status: output.status.to_string(),
                stderr,
            });
        }
        if !stderr.trim().is_empty() {
            tracing::debug!(stderr = %stderr.trim(), "reasoner diagnostics");
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Reasoner for ProcessReasoner {
    fn name(&self) -> &str {
        "process"
    }

    fn state(&self) -> ReasonerState {
        self.lifecycle.state()
    }

    fn accumulate_data(&mut self, text: &str) -> Result<(), ReasonerError> {
        self.lifecycle.accumulate()?;
        self.data.push(Self::write_temp("data", text)?);
        Ok(())
    }

    fn accumulate_rules(&mut self, text: &str) -> Result<(), ReasonerError> {
        self.lifecycle.accumulate()?;
        self.rules.push(Self::write_temp("rules", text)?);
        Ok(())
    }

    fn run(&mut self) -> Result<String, ReasonerError> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.lifecycle.start()?;
        let outcome = self.execute();
        if let Err(e) = &outcome {
            tracing::error!(error = %e, "reasoner process failed");
        }
        self.lifecycle.finish(outcome)
    }

    fn cleanup(&mut self) {
        for file in self.data.drain(..).chain(self.rules.drain(..)) {
            let path = file.path().to_path_buf();
            if let Err(e) = file.close() {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove temp file");
            }
        }
    }
}

impl Drop for ProcessReasoner {
    fn drop(&mut self) {
        self.cleanup();
    }
}
