//! Blank nodes
//!
//! Identity is the pair (process-wide id, optional label). Two parses of the
//! same text therefore never share blank nodes, while every occurrence of a
//! label inside one document resolves to the same node (the parser keeps a
//! per-document label table).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static BLANK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An anonymous node, scoped to the document or computation that created it
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlankNode {
    id: u64,
    label: Option<String>,
}

impl BlankNode {
    /// Create a fresh blank node with a unique ID
    pub fn fresh() -> Self {
        BlankNode {
            id: BLANK_COUNTER.fetch_add(1, Ordering::Relaxed),
            label: None,
        }
    }

    /// Create a fresh blank node that remembers its source label
    pub fn labeled(label: impl Into<String>) -> Self {
        BlankNode {
            id: BLANK_COUNTER.fetch_add(1, Ordering::Relaxed),
            label: Some(label.into()),
        }
    }

    /// Rebuild a node from its identity key (see [`BlankNode::key`])
    pub(crate) fn from_key(key: &str) -> Option<Self> {
        let (id, label) = match key.split_once(':') {
            Some((id, label)) => (id, Some(label.to_string())),
            None => (key, None),
        };
        let id = id.parse().ok()?;
        Some(BlankNode { id, label })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// A string that identifies this node exactly: `{id}` or `{id}:{label}`
    pub fn key(&self) -> String {
        match &self.label {
            Some(label) => format!("{}:{}", self.id, label),
            None => self.id.to_string(),
        }
    }

    /// Label used by the serializers. Always unique per node, unlike the
    /// source label, since several documents can be merged into one store.
    pub fn serial_label(&self) -> String {
        format!("b{}", self.id)
    }
}

impl fmt::Debug for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "_:{}#{}", label, self.id),
            None => write!(f, "_:b{}", self.id),
        }
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "_:{}", label),
            None => write!(f, "_:b{}", self.id),
        }
    }
}
