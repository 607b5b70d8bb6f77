//! RDF parsers
//!
//! - [`n3`]: Notation3 and its Turtle / N-Triples subsets, including
//!   quoted formulas and `=>` rules (nom based)
//! - [`nquads`]: line-oriented N-Quads
//! - [`jsonld`]: the JSON-LD subset used by activity-stream notifications
//!
//! Every parse yields a [`Document`]. Blank-node labels are scoped to that
//! document: `_:x` twice in one input is one node, the same label in two
//! inputs gives two distinct nodes.

use std::path::Path;

use indexmap::IndexMap;

use crate::store::Store;

pub mod jsonld;
pub mod n3;
pub mod nquads;

pub use n3::N3Parser;

/// Parser error type
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("undefined prefix '{prefix}:' at line {line}")]
    UndefinedPrefix { prefix: String, line: usize },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid JSON-LD document: {0}")]
    JsonLd(String),

    #[error("unsupported content type: {0}")]
    UnsupportedFormat(String),
}

impl ParseError {
    /// Line the error was detected on, when known
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Syntax { line, .. } | ParseError::UndefinedPrefix { line, .. } => Some(*line),
            ParseError::Json(e) => Some(e.line()),
            _ => None,
        }
    }
}

/// Concrete RDF syntaxes understood by the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    N3,
    Turtle,
    #[serde(rename = "ntriples")]
    NTriples,
    #[serde(rename = "nquads")]
    NQuads,
    #[serde(rename = "jsonld")]
    JsonLd,
}

impl Format {
    /// Infer the syntax from a file extension
    pub fn from_path(path: impl AsRef<Path>) -> Option<Format> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "n3" => Some(Format::N3),
            "ttl" | "turtle" => Some(Format::Turtle),
            "nt" => Some(Format::NTriples),
            "nq" => Some(Format::NQuads),
            "jsonld" | "json" => Some(Format::JsonLd),
            _ => None,
        }
    }

    /// Infer the syntax from a media type, ignoring parameters
    pub fn from_mime(mime: &str) -> Option<Format> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "text/n3" => Some(Format::N3),
            "text/turtle" | "application/x-turtle" => Some(Format::Turtle),
            "application/n-triples" => Some(Format::NTriples),
            "application/n-quads" => Some(Format::NQuads),
            "application/ld+json" | "application/json" => Some(Format::JsonLd),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Format::N3 => "text/n3",
            Format::Turtle => "text/turtle",
            Format::NTriples => "application/n-triples",
            Format::NQuads => "application/n-quads",
            Format::JsonLd => "application/ld+json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::N3 => "n3",
            Format::Turtle => "ttl",
            Format::NTriples => "nt",
            Format::NQuads => "nq",
            Format::JsonLd => "jsonld",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "n3" => Ok(Format::N3),
            "turtle" | "ttl" => Ok(Format::Turtle),
            "ntriples" | "nt" => Ok(Format::NTriples),
            "nquads" | "nq" => Ok(Format::NQuads),
            "jsonld" | "json-ld" => Ok(Format::JsonLd),
            other => Format::from_mime(other).ok_or_else(|| ParseError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Result of parsing one input
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub store: Store,
    /// Prefixes declared by the document, declaration order
    pub prefixes: IndexMap<String, String>,
    pub base: Option<String>,
}

/// Parse `input` in the given syntax
pub fn parse(input: &str, format: Format, base: Option<&str>) -> Result<Document, ParseError> {
    match format {
        Format::N3 | Format::Turtle | Format::NTriples => {
            let parser = match base {
                Some(base) => N3Parser::with_base(input, base),
                None => N3Parser::new(input),
            };
            parser.parse()
        }
        Format::NQuads => nquads::parse(input),
        Format::JsonLd => jsonld::parse(input, base),
    }
}

/// Parse N3 text into a store
pub fn parse_n3(input: &str) -> Result<Store, ParseError> {
    Ok(N3Parser::new(input).parse()?.store)
}

/// 1-based line and column where `at` (a slice of `source`) begins
pub(crate) fn location(source: &str, at: &str) -> (usize, usize) {
    let start = source.as_ptr() as usize;
    let pos = at.as_ptr() as usize;
    let offset = if pos >= start && pos <= start + source.len() {
        pos - start
    } else {
        source.len().saturating_sub(at.len())
    };
    let consumed = &source[..offset];
    let line = consumed.matches('\n').count() + 1;
    let column = match consumed.rfind('\n') {
        Some(pos) => consumed[pos + 1..].chars().count() + 1,
        None => consumed.chars().count() + 1,
    };
    (line, column)
}
