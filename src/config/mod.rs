//! Configuration for koreografeye
//!
//! Settings come from a TOML file, then environment overrides, then the
//! command line.
//!
//! # Configuration File Locations
//!
//! Searched in order (first found wins):
//! 1. `./koreografeye.toml`
//! 2. `~/.config/koreografeye/config.toml` (XDG)
//! 3. `~/.koreografeye/config.toml`
//! 4. `/etc/koreografeye/config.toml`
//!
//! # Environment Variables
//!
//! - `KOREO_LOG_LEVEL` - quiet, normal, verbose, debug
//! - `KOREO_REASONER` - reasoner backend (process, embedded)
//! - `KOREO_REASONER_PROGRAM` - reasoner executable for the process backend
//! - `KOREO_MAX_STEPS` - rule firing bound of the embedded backend
//! - `KOREO_WORKERS` - documents processed in parallel
//! - `KOREO_NTFY_TOPIC` - read by the `ntfy` plugin itself
//!
//! # Example Configuration
//!
//! ```toml
//! [reasoner]
//! backend = "process"
//! program = "eye"
//! args = ["--quiet", "--nope", "--pass"]
//!
//! [batch]
//! workers = 4
//!
//! [plugins."http://example.org/sendNotification"]
//! kind = "send_notification"
//! config = { allowed_domains = ["example.org"] }
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::parser::Format;

// ============================================================================
// Configuration Schema
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct KoreoConfig {
    pub general: GeneralConfig,
    pub reasoner: ReasonerConfig,
    pub batch: BatchConfig,
    /// Target IRI to plugin entry
    pub plugins: IndexMap<String, PluginEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: LogLevel,
    /// Syntax of reasoning results written by `orch`
    pub format: Format,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Normal,
            format: Format::Turtle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    pub backend: ReasonerBackend,
    /// Executable run by the process backend
    pub program: String,
    /// Arguments placed before the data and rule files
    pub args: Vec<String>,
    /// Rule firing bound of the embedded backend
    pub max_steps: usize,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            backend: ReasonerBackend::Process,
            program: "eye".to_string(),
            args: vec!["--quiet".to_string(), "--nope".to_string(), "--pass".to_string()],
            max_steps: crate::reasoner::engine::DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    /// Where results (orch) or handled inputs (pol) go; stdout when unset
    pub output_dir: Option<PathBuf>,
    /// Where failed inputs are copied
    pub error_dir: Option<PathBuf>,
    /// Leave processed inputs in place
    pub keep: bool,
    /// Documents processed in parallel, 0 = one per CPU
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("in"),
            output_dir: None,
            error_dir: None,
            keep: false,
            workers: 0,
        }
    }
}

/// One `[plugins."<target>"]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Name in the bundled factory table
    pub kind: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReasonerBackend {
    /// External reasoner binary fed through temp files
    #[default]
    Process,
    /// Built-in forward chainer
    Embedded,
}

impl ReasonerBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonerBackend::Process => "process",
            ReasonerBackend::Embedded => "embedded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "process" | "eye" | "external" => Some(ReasonerBackend::Process),
            "embedded" | "builtin" | "eye-js" => Some(ReasonerBackend::Embedded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quiet" | "q" | "0" => Some(LogLevel::Quiet),
            "normal" | "n" | "1" => Some(LogLevel::Normal),
            "verbose" | "v" | "2" => Some(LogLevel::Verbose),
            "debug" | "d" | "3" => Some(LogLevel::Debug),
            _ => None,
        }
    }

    /// `tracing` filter directive for this level
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "error",
            LogLevel::Normal => "info",
            LogLevel::Verbose => "debug",
            LogLevel::Debug => "trace",
        }
    }

    /// Level selected by repeated `-v` flags, if any
    pub fn from_verbosity(count: u8) -> Option<Self> {
        match count {
            0 => None,
            1 => Some(LogLevel::Verbose),
            _ => Some(LogLevel::Debug),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl KoreoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// First config file found on the search path, then env overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_paths().into_iter().find(|p| p.exists()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                Self::load_from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Io(path.to_path_buf(), e.to_string()),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))
    }

    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(PathBuf::from("<string>"), e.to_string()))
    }

    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./koreografeye.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("koreografeye").join("config.toml"));
        }
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".koreografeye").join("config.toml"));
        }

        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/koreografeye/config.toml"));

        paths
    }

    /// Apply `KOREO_*` variables; unparsable values are logged and ignored
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("KOREO_LOG_LEVEL") {
            match LogLevel::from_str(&val) {
                Some(level) => self.general.log_level = level,
                None => tracing::warn!(value = %val, "ignoring KOREO_LOG_LEVEL"),
            }
        }

        if let Some(val) = var("KOREO_REASONER") {
            match ReasonerBackend::from_str(&val) {
                Some(backend) => self.reasoner.backend = backend,
                None => tracing::warn!(value = %val, "ignoring KOREO_REASONER"),
            }
        }

        if let Some(val) = var("KOREO_REASONER_PROGRAM") {
            self.reasoner.program = val;
        }

        if let Some(val) = var("KOREO_MAX_STEPS") {
            match val.parse::<usize>() {
                Ok(steps) => self.reasoner.max_steps = steps,
                Err(_) => tracing::warn!(value = %val, "ignoring KOREO_MAX_STEPS"),
            }
        }

        if let Some(val) = var("KOREO_WORKERS") {
            match val.parse::<usize>() {
                Ok(workers) => self.batch.workers = workers,
                Err(_) => tracing::warn!(value = %val, "ignoring KOREO_WORKERS"),
            }
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Write the commented template, refusing to overwrite
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        fs::write(path, Self::default_config_content()).map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))
    }

    pub fn default_config_content() -> &'static str {
        r#"# koreografeye configuration

[general]
# quiet, normal, verbose, debug
log_level = "normal"
# Syntax of reasoning results: n3, turtle, ntriples, nquads, jsonld
format = "turtle"

[reasoner]
# process: run an external reasoner binary
# embedded: use the built-in forward chainer
backend = "process"
program = "eye"
# Data files and rule files are appended after these
args = ["--quiet", "--nope", "--pass"]
# Rule firing bound (embedded backend only)
max_steps = 10000

[batch]
input_dir = "in"
# output_dir = "out"
# error_dir = "err"
# Leave processed inputs in place
keep = false
# Documents processed in parallel, 0 = one per CPU
workers = 0

# Each policy target IRI maps to a bundled plugin kind:
# debug, demo, ntfy, send_notification

[plugins."http://example.org/demoPlugin"]
kind = "demo"

[plugins."http://example.org/debugPlugin"]
kind = "debug"

[plugins."http://example.org/sendNotification"]
kind = "send_notification"
# config = { allowed_domains = ["example.org"] }

[plugins."http://example.org/sendNtfy"]
kind = "ntfy"
# KOREO_NTFY_TOPIC takes precedence over this
# config = { topic = "my-topic" }
"#
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read {}: {1}", .0.display())]
    Io(PathBuf, String),

    #[error("invalid configuration in {}: {1}", .0.display())]
    Parse(PathBuf, String),

    #[error("cannot serialize configuration: {0}")]
    Serialize(String),

    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = KoreoConfig::default();
        assert_eq!(config.reasoner.backend, ReasonerBackend::Process);
        assert_eq!(config.reasoner.program, "eye");
        assert_eq!(config.reasoner.args, vec!["--quiet", "--nope", "--pass"]);
        assert_eq!(config.batch.workers, 0);
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_template_parses() {
        let config = KoreoConfig::load_from_str(KoreoConfig::default_config_content()).unwrap();
        assert_eq!(config.general.format, Format::Turtle);
        assert_eq!(config.plugins.len(), 4);
        assert_eq!(config.plugins["http://example.org/demoPlugin"].kind, "demo");
        assert!(config.plugins["http://example.org/sendNtfy"].config.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let config = KoreoConfig::load_from_str(
            r#"
            [reasoner]
            backend = "embedded"
            max_steps = 50

            [plugins."http://example.org/ntfy"]
            kind = "ntfy"
            config = { topic = "alerts" }
            "#,
        )
        .unwrap();

        assert_eq!(config.reasoner.backend, ReasonerBackend::Embedded);
        assert_eq!(config.reasoner.max_steps, 50);
        assert_eq!(config.reasoner.program, "eye");
        let entry = &config.plugins["http://example.org/ntfy"];
        assert_eq!(entry.config["topic"], "alerts");
    }

    #[test]
    fn test_invalid_config() {
        let err = KoreoConfig::load_from_str("[reasoner]\nbackend = \"quantum\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(..)));
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = KoreoConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("KOREO_REASONER", "embedded"),
            ("KOREO_WORKERS", "many"),
            ("KOREO_LOG_LEVEL", "debug"),
            ("KOREO_MAX_STEPS", "12"),
        ]
        .into_iter()
        .collect();

        let mut config = KoreoConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.reasoner.backend, ReasonerBackend::Embedded);
        assert_eq!(config.batch.workers, 0);
        assert_eq!(config.general.log_level, LogLevel::Debug);
        assert_eq!(config.reasoner.max_steps, 12);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = KoreoConfig::default();
        config.plugins.insert(
            "http://example.org/demo".into(),
            PluginEntry {
                kind: "demo".into(),
                config: serde_json::Map::new(),
            },
        );
        let text = config.to_toml().unwrap();
        let back = KoreoConfig::load_from_str(&text).unwrap();
        assert_eq!(back.plugins, config.plugins);
        assert_eq!(back.reasoner, config.reasoner);
    }

    #[test]
    fn test_write_default_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("koreografeye.toml");
        KoreoConfig::write_default(&path).unwrap();
        assert!(matches!(KoreoConfig::write_default(&path), Err(ConfigError::AlreadyExists(_))));
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(LogLevel::from_str("V"), Some(LogLevel::Verbose));
        assert_eq!(LogLevel::from_verbosity(0), None);
        assert_eq!(LogLevel::from_verbosity(3), Some(LogLevel::Debug));
        assert_eq!(LogLevel::Quiet.directive(), "error");
    }
}
