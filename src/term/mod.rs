//! RDF/N3 terms, triples and quads
//!
//! The term model covers what the orchestrator reads and writes:
//! - IRIs (named nodes)
//! - Literals (plain, language-tagged or typed)
//! - Blank nodes, whose identity is scoped to the parse that created them
//! - Variables, lists and quoted formulas, which only occur inside N3 rules

use std::fmt;
use std::sync::Arc;

use fnv::FnvHashMap;

mod blank;
mod list;
mod literal;
pub mod uri;
mod variable;

pub use blank::BlankNode;
pub use list::List;
pub use literal::{escape_string, Datatype, Literal};
pub use uri::{ns, Uri};
pub use variable::Variable;

/// A term in RDF/N3
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Uri(Arc<Uri>),
    Literal(Arc<Literal>),
    BlankNode(BlankNode),
    /// Rule variable; never present in data stores
    Variable(Variable),
    List(Arc<List>),
    /// Quoted graph (N3 rule antecedent or consequent)
    Formula(FormulaRef),
}

/// A quoted formula holding its own triples
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FormulaRef {
    pub(crate) id: u64,
    pub(crate) triples: Arc<Vec<Triple>>,
}

impl FormulaRef {
    pub fn new(id: u64, triples: Vec<Triple>) -> Self {
        FormulaRef { id, triples: Arc::new(triples) }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }
}

impl Term {
    pub fn uri(s: impl Into<String>) -> Self {
        Term::Uri(Arc::new(Uri::new(s.into())))
    }

    pub fn literal(s: impl Into<String>) -> Self {
        Term::Literal(Arc::new(Literal::plain(s.into())))
    }

    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal(Arc::new(Literal::typed(value.into(), datatype.into())))
    }

    pub fn lang_literal(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Term::Literal(Arc::new(Literal::with_language(value.into(), lang.into())))
    }

    pub fn integer(value: i64) -> Self {
        Term::Literal(Arc::new(Literal::integer(value)))
    }

    /// A new blank node remembering `label`. Each call yields a distinct node.
    pub fn blank(label: impl Into<String>) -> Self {
        Term::BlankNode(BlankNode::labeled(label))
    }

    pub fn fresh_blank() -> Self {
        Term::BlankNode(BlankNode::fresh())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Term::Variable(Variable::new(name))
    }

    pub fn list(items: Vec<Term>) -> Self {
        Term::List(Arc::new(List::new(items)))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    /// IRI or blank node: something that can be a subject and be followed
    pub fn is_node(&self) -> bool {
        matches!(self, Term::Uri(_) | Term::BlankNode(_))
    }

    /// True if the term contains no variables
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Uri(_) | Term::Literal(_) | Term::BlankNode(_) | Term::Formula(_) => true,
            Term::Variable(_) => false,
            Term::List(l) => l.is_ground(),
        }
    }

    pub fn as_uri(&self) -> Option<&Uri> {
        match self {
            Term::Uri(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_blank(&self) -> Option<&BlankNode> {
        match self {
            Term::BlankNode(b) => Some(b),
            _ => None,
        }
    }

    /// The IRI string, or the lexical form for a literal
    pub fn value(&self) -> String {
        match self {
            Term::Uri(u) => u.as_str().to_string(),
            Term::Literal(l) => l.value().to_string(),
            Term::BlankNode(b) => b.key(),
            Term::Variable(v) => v.name().to_string(),
            other => other.to_string(),
        }
    }
}

impl From<BlankNode> for Term {
    fn from(b: BlankNode) -> Self {
        Term::BlankNode(b)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Uri(u) => write!(f, "{:?}", u),
            Term::Literal(l) => write!(f, "{:?}", l),
            Term::BlankNode(b) => write!(f, "{:?}", b),
            Term::Variable(v) => write!(f, "{:?}", v),
            Term::List(l) => write!(f, "{:?}", l),
            Term::Formula(r) => write!(f, "{{formula:{}}}", r.id),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Uri(u) => write!(f, "{}", u),
            Term::Literal(l) => write!(f, "{}", l),
            Term::BlankNode(b) => write!(f, "{}", b),
            Term::Variable(v) => write!(f, "{}", v),
            Term::List(l) => write!(f, "{}", l),
            Term::Formula(r) => {
                write!(f, "{{")?;
                for triple in r.triples.iter() {
                    write!(f, " {}", triple)?;
                }
                write!(f, " }}")
            }
        }
    }
}

/// A statement without graph context
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Triple { subject, predicate, object }
    }

    pub fn is_ground(&self) -> bool {
        self.subject.is_ground() && self.predicate.is_ground() && self.object.is_ground()
    }

    pub fn terms(&self) -> [&Term; 3] {
        [&self.subject, &self.predicate, &self.object]
    }
}

impl fmt::Debug for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} {:?} .", self.subject, self.predicate, self.object)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// Graph component of a quad
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum GraphName {
    #[default]
    Default,
    /// Named graph, identified by an IRI or blank node
    Named(Term),
}

impl GraphName {
    pub fn is_default(&self) -> bool {
        matches!(self, GraphName::Default)
    }

    pub fn as_term(&self) -> Option<&Term> {
        match self {
            GraphName::Default => None,
            GraphName::Named(t) => Some(t),
        }
    }
}

/// A triple placed in a graph
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Quad {
    pub triple: Triple,
    pub graph: GraphName,
}

impl Quad {
    pub fn new(triple: Triple, graph: GraphName) -> Self {
        Quad { triple, graph }
    }

    /// Quad in the default graph
    pub fn default_graph(subject: Term, predicate: Term, object: Term) -> Self {
        Quad {
            triple: Triple::new(subject, predicate, object),
            graph: GraphName::Default,
        }
    }

    pub fn subject(&self) -> &Term {
        &self.triple.subject
    }

    pub fn predicate(&self) -> &Term {
        &self.triple.predicate
    }

    pub fn object(&self) -> &Term {
        &self.triple.object
    }
}

impl From<Triple> for Quad {
    fn from(triple: Triple) -> Self {
        Quad { triple, graph: GraphName::Default }
    }
}

impl fmt::Debug for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.graph {
            GraphName::Default => write!(f, "{:?}", self.triple),
            GraphName::Named(g) => write!(
                f,
                "{:?} {:?} {:?} {:?} .",
                self.triple.subject, self.triple.predicate, self.triple.object, g
            ),
        }
    }
}

/// Variable bindings produced by pattern matching
pub type Bindings = FnvHashMap<Variable, Term>;

/// Replace bound variables in a term
pub fn substitute(term: &Term, bindings: &Bindings) -> Term {
    match term {
        Term::Variable(v) => bindings.get(v).cloned().unwrap_or_else(|| term.clone()),
        Term::List(l) => Term::List(Arc::new(l.substitute(bindings))),
        _ => term.clone(),
    }
}

pub fn substitute_triple(triple: &Triple, bindings: &Bindings) -> Triple {
    Triple {
        subject: substitute(&triple.subject, bindings),
        predicate: substitute(&triple.predicate, bindings),
        object: substitute(&triple.object, bindings),
    }
}
