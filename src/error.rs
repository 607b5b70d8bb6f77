//! Structured errors for document processing
//!
//! Module errors (`ParseError`, `ReasonerError`, `PluginError`, ...) stay
//! close to where they happen. Anything that reaches the batch driver is
//! converted into a [`KoreoError`] carrying a stable numeric code, so the
//! driver can decide routing and exit status from the code alone.
//!
//! # Error Categories
//!
//! - 1xxx graph parsing and serialization
//! - 2xxx provenance markers
//! - 3xxx reasoner
//! - 4xxx policies and plugins
//! - 7xxx configuration
//! - 9xxx internal and I/O
//!
//! ```rust,ignore
//! use koreografeye::error::{ErrorCode, KoreoError};
//!
//! let err = KoreoError::new(ErrorCode::NoMainSubject, "no top-level subject")
//!     .with_context("path", "in/offer.ttl");
//! assert!(err.is_document_fatal());
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::http_client::HttpError;
use crate::parser::ParseError;
use crate::policy::PluginError;
use crate::reasoner::ReasonerError;
use crate::serializer::SerializeError;

// ============================================================================
// Error Codes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Graph (1xxx)
    GraphParseError = 1000,
    UnsupportedFormat = 1001,
    SerializeFailed = 1002,

    // Provenance (2xxx)
    NoMainSubject = 2000,
    NoOrigin = 2001,

    // Reasoner (3xxx)
    ReasonerError = 3000,
    ReasonerExecutionFailed = 3001,
    ReasonerSpawnFailed = 3002,
    ReasonerInvalidState = 3003,
    ReasonerOutputInvalid = 3004,

    // Policies (4xxx)
    PolicyMissingTarget = 4000,
    PluginNotFound = 4001,
    PluginExecutionError = 4002,
    PluginConfigError = 4003,
    HttpError = 4004,

    // Configuration (7xxx)
    ConfigError = 7000,
    ConfigNotFound = 7001,
    InvalidConfigSyntax = 7002,

    // Internal (9xxx)
    InternalError = 9000,
    IoError = 9001,
}

impl ErrorCode {
    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::GraphParseError => "Input graph could not be parsed",
            ErrorCode::UnsupportedFormat => "Unsupported RDF syntax",
            ErrorCode::SerializeFailed => "Graph could not be serialized",
            ErrorCode::NoMainSubject => "Document has no main subject",
            ErrorCode::NoOrigin => "Document has no origin",
            ErrorCode::ReasonerError => "Reasoner error",
            ErrorCode::ReasonerExecutionFailed => "Reasoner execution failed",
            ErrorCode::ReasonerSpawnFailed => "Reasoner could not be started",
            ErrorCode::ReasonerInvalidState => "Reasoner used out of order",
            ErrorCode::ReasonerOutputInvalid => "Reasoner output could not be parsed",
            ErrorCode::PolicyMissingTarget => "Policy has no execution target",
            ErrorCode::PluginNotFound => "No plugin for policy target",
            ErrorCode::PluginExecutionError => "Plugin failed",
            ErrorCode::PluginConfigError => "Invalid plugin configuration",
            ErrorCode::HttpError => "HTTP request failed",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::ConfigNotFound => "Configuration file not found",
            ErrorCode::InvalidConfigSyntax => "Invalid configuration syntax",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::IoError => "I/O error",
        }
    }

    /// Whether the error ends processing of the current document
    ///
    /// Policy and plugin errors are recorded as failed outcomes instead.
    pub fn is_document_fatal(&self) -> bool {
        !matches!(self.code() / 1000, 4)
    }

    /// Process exit status when this error stops the program
    pub fn exit_code(&self) -> i32 {
        match self.code() / 1000 {
            7 | 9 => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Main Error Type
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KoreoError {
    pub code: ErrorCode,
    pub message: String,
    /// Key-value details, e.g. the document path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl KoreoError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    pub fn no_main_subject(path: &str) -> Self {
        Self::new(ErrorCode::NoMainSubject, "document has no subject that is never used as an object")
            .with_context("path", path)
    }

    pub fn no_origin(path: &str) -> Self {
        Self::new(ErrorCode::NoOrigin, "reasoning result carries no pol:origin marker")
            .with_context("path", path)
            .with_hint("run the document through `orch` before `pol`")
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_document_fatal(&self) -> bool {
        self.code.is_document_fatal()
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!(r#"{{"code":"INTERNAL_ERROR","message":{:?}}}"#, self.message))
    }
}

impl fmt::Display for KoreoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(path) = self.context.get("path") {
            write!(f, " ({})", path)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for KoreoError {}

pub type KoreoResult<T> = Result<T, KoreoError>;

// ============================================================================
// Conversions from module errors
// ============================================================================

impl From<ParseError> for KoreoError {
    fn from(err: ParseError) -> Self {
        let code = match err {
            ParseError::UnsupportedFormat(_) => ErrorCode::UnsupportedFormat,
            _ => ErrorCode::GraphParseError,
        };
        let line = err.line();
        let mut error = KoreoError::new(code, err.to_string());
        if let Some(line) = line {
            error = error.with_context("line", line.to_string());
        }
        error
    }
}

impl From<SerializeError> for KoreoError {
    fn from(err: SerializeError) -> Self {
        KoreoError::new(ErrorCode::SerializeFailed, err.to_string())
    }
}

impl From<ReasonerError> for KoreoError {
    fn from(err: ReasonerError) -> Self {
        let code = match &err {
            ReasonerError::ExecutionFailed { .. } | ReasonerError::Engine(_) => ErrorCode::ReasonerExecutionFailed,
            ReasonerError::Spawn { .. } => ErrorCode::ReasonerSpawnFailed,
            ReasonerError::InvalidState { .. } => ErrorCode::ReasonerInvalidState,
            ReasonerError::Parse(_) => ErrorCode::ReasonerOutputInvalid,
            _ => ErrorCode::ReasonerError,
        };
        let error = KoreoError::new(code, err.to_string());
        match err {
            ReasonerError::Spawn { program, .. } => error
                .with_context("program", program)
                .with_hint("install the reasoner or set reasoner.backend = \"embedded\""),
            _ => error,
        }
    }
}

impl From<PluginError> for KoreoError {
    fn from(err: PluginError) -> Self {
        let code = match err {
            PluginError::MissingConfig(_) | PluginError::InvalidArgument { .. } => ErrorCode::PluginConfigError,
            PluginError::Http(_) => ErrorCode::HttpError,
            _ => ErrorCode::PluginExecutionError,
        };
        KoreoError::new(code, err.to_string())
    }
}

impl From<HttpError> for KoreoError {
    fn from(err: HttpError) -> Self {
        KoreoError::new(ErrorCode::HttpError, err.to_string())
    }
}

impl From<ConfigError> for KoreoError {
    fn from(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::NotFound(_) => ErrorCode::ConfigNotFound,
            ConfigError::Parse(..) => ErrorCode::InvalidConfigSyntax,
            _ => ErrorCode::ConfigError,
        };
        let error = KoreoError::new(code, err.to_string());
        match code {
            ErrorCode::ConfigNotFound => error.with_hint("run `koreografeye config --init` to write a template"),
            _ => error,
        }
    }
}

impl From<std::io::Error> for KoreoError {
    fn from(err: std::io::Error) -> Self {
        KoreoError::new(ErrorCode::IoError, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_families() {
        assert_eq!(ErrorCode::NoMainSubject.code(), 2000);
        assert!(ErrorCode::GraphParseError.is_document_fatal());
        assert!(ErrorCode::ReasonerExecutionFailed.is_document_fatal());
        assert!(!ErrorCode::PluginNotFound.is_document_fatal());
        assert_eq!(ErrorCode::NoOrigin.exit_code(), 2);
        assert_eq!(ErrorCode::InvalidConfigSyntax.exit_code(), 1);
    }

    #[test]
    fn test_display_and_json() {
        let err = KoreoError::no_origin("in/a.ttl");
        let text = err.to_string();
        assert!(text.starts_with("[2001]"));
        assert!(text.contains("in/a.ttl"));
        assert!(text.contains("Hint:"));

        let json: serde_json::Value = serde_json::from_str(&err.to_json()).unwrap();
        assert_eq!(json["code"], "NO_ORIGIN");
        assert_eq!(json["context"]["path"], "in/a.ttl");
    }

    #[test]
    fn test_from_parse_error() {
        let err: KoreoError = crate::parser::parse_n3("<a> <b> .").unwrap_err().into();
        assert_eq!(err.code, ErrorCode::GraphParseError);
        assert!(err.context.contains_key("line"));
    }

    #[test]
    fn test_from_reasoner_error() {
        let err: KoreoError = ReasonerError::ExecutionFailed {
            status: "exit status: 1".into(),
            stderr: "boom".into(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::ReasonerExecutionFailed);
        assert!(err.message.contains("boom"));

        let err: KoreoError = ReasonerError::Spawn {
            program: "eye".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        }
        .into();
        assert_eq!(err.code, ErrorCode::ReasonerSpawnFailed);
        assert_eq!(err.context["program"], "eye");
        assert!(err.hint.is_some());
    }

    #[test]
    fn test_from_config_error() {
        let err: KoreoError = ConfigError::NotFound("koreografeye.toml".into()).into();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
        assert_eq!(err.exit_code(), 1);
        assert!(err.hint.is_some());

        let err: KoreoError = ConfigError::Parse("koreografeye.toml".into(), "bad".into()).into();
        assert_eq!(err.code, ErrorCode::InvalidConfigSyntax);
    }
}
