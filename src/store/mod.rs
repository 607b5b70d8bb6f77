//! Quad store
//!
//! A store is a set of quads. Insertion order is kept for iteration, which
//! the policy extractor relies on for argument discovery order. A hash
//! index gives constant-time duplicate detection and subject lookup.

use fnv::{FnvHashMap, FnvHashSet};
use indexmap::IndexSet;

use crate::term::{substitute_triple, Bindings, GraphName, Quad, Term, Triple};

/// An insertion-ordered set of quads
#[derive(Clone, Default)]
pub struct Store {
    quads: Vec<Quad>,
    present: FnvHashSet<Quad>,
    by_subject: FnvHashMap<Term, Vec<usize>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a triple to the default graph. Returns false if it was present.
    pub fn add(&mut self, triple: Triple) -> bool {
        self.add_quad(Quad::from(triple))
    }

    /// Add a quad. Duplicate insertion is a no-op that returns false.
    pub fn add_quad(&mut self, quad: Quad) -> bool {
        if self.present.contains(&quad) {
            return false;
        }
        let idx = self.quads.len();
        self.by_subject
            .entry(quad.triple.subject.clone())
            .or_default()
            .push(idx);
        self.present.insert(quad.clone());
        self.quads.push(quad);
        true
    }

    pub fn add_all(&mut self, triples: impl IntoIterator<Item = Triple>) {
        for triple in triples {
            self.add(triple);
        }
    }

    pub fn extend_quads(&mut self, quads: impl IntoIterator<Item = Quad>) {
        for quad in quads {
            self.add_quad(quad);
        }
    }

    /// Default-graph membership
    pub fn contains(&self, triple: &Triple) -> bool {
        self.present.contains(&Quad::from(triple.clone()))
    }

    pub fn contains_quad(&self, quad: &Quad) -> bool {
        self.present.contains(quad)
    }

    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    pub fn iter(&self) -> impl Iterator<Item = &Quad> {
        self.quads.iter()
    }

    /// Triples of every graph, in insertion order
    pub fn triples(&self) -> impl Iterator<Item = &Triple> {
        self.quads.iter().map(|q| &q.triple)
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Quads of any graph whose subject is `subject`
    pub fn quads_with_subject<'a>(&'a self, subject: &Term) -> impl Iterator<Item = &'a Quad> + 'a {
        self.by_subject
            .get(subject)
            .into_iter()
            .flat_map(move |idxs| idxs.iter().map(move |&i| &self.quads[i]))
    }

    /// Distinct subjects, first-seen order
    pub fn subjects(&self) -> IndexSet<Term> {
        self.quads.iter().map(|q| q.triple.subject.clone()).collect()
    }

    /// Distinct objects, first-seen order
    pub fn objects(&self) -> IndexSet<Term> {
        self.quads.iter().map(|q| q.triple.object.clone()).collect()
    }

    /// Objects of `subject predicate ?o` across all graphs
    pub fn objects_of(&self, subject: &Term, predicate: &Term) -> Vec<Term> {
        self.quads_with_subject(subject)
            .filter(|q| &q.triple.predicate == predicate)
            .map(|q| q.triple.object.clone())
            .collect()
    }

    /// Named graphs in use, first-seen order
    pub fn graph_names(&self) -> IndexSet<Term> {
        self.quads
            .iter()
            .filter_map(|q| q.graph.as_term().cloned())
            .collect()
    }

    /// Match a triple pattern against every graph
    pub fn match_pattern(&self, pattern: &Triple) -> Vec<Bindings> {
        let candidates: Box<dyn Iterator<Item = &Quad>> = if pattern.subject.is_ground()
            && !matches!(pattern.subject, Term::List(_))
        {
            Box::new(self.quads_with_subject(&pattern.subject))
        } else {
            Box::new(self.quads.iter())
        };

        candidates
            .filter_map(|quad| unify_triple(pattern, &quad.triple))
            .collect()
    }

    /// Conjunctive query over triple patterns
    pub fn query(&self, patterns: &[Triple]) -> Vec<Bindings> {
        let Some((first, rest)) = patterns.split_first() else {
            return vec![Bindings::default()];
        };

        let mut results = self.match_pattern(first);
        for pattern in rest {
            let mut next = Vec::new();
            for bindings in results {
                let substituted = substitute_triple(pattern, &bindings);
                for found in self.match_pattern(&substituted) {
                    let mut merged = bindings.clone();
                    merged.extend(found);
                    next.push(merged);
                }
            }
            results = next;
        }
        results
    }

    /// Remove a quad, keeping the order of the remaining ones
    pub fn remove(&mut self, quad: &Quad) -> bool {
        if !self.present.remove(quad) {
            return false;
        }
        self.quads.retain(|q| q != quad);
        self.reindex();
        true
    }

    pub fn clear(&mut self) {
        self.quads.clear();
        self.present.clear();
        self.by_subject.clear();
    }

    /// Collapse every quad into the default graph
    pub fn to_default_graph(&self) -> Store {
        let mut flat = Store::new();
        for quad in &self.quads {
            flat.add_quad(Quad::new(quad.triple.clone(), GraphName::Default));
        }
        flat
    }

    fn reindex(&mut self) {
        self.by_subject.clear();
        for (idx, quad) in self.quads.iter().enumerate() {
            self.by_subject
                .entry(quad.triple.subject.clone())
                .or_default()
                .push(idx);
        }
    }
}

impl PartialEq for Store {
    /// Set equality, ignoring insertion order
    fn eq(&self, other: &Self) -> bool {
        self.present == other.present
    }
}

impl FromIterator<Quad> for Store {
    fn from_iter<I: IntoIterator<Item = Quad>>(iter: I) -> Self {
        let mut store = Store::new();
        store.extend_quads(iter);
        store
    }
}

impl FromIterator<Triple> for Store {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut store = Store::new();
        store.add_all(iter);
        store
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Store {{")?;
        for quad in &self.quads {
            writeln!(f, "  {:?}", quad)?;
        }
        write!(f, "}}")
    }
}

fn unify_triple(pattern: &Triple, ground: &Triple) -> Option<Bindings> {
    let mut bindings = Bindings::default();
    if unify_term(&pattern.subject, &ground.subject, &mut bindings)
        && unify_term(&pattern.predicate, &ground.predicate, &mut bindings)
        && unify_term(&pattern.object, &ground.object, &mut bindings)
    {
        Some(bindings)
    } else {
        None
    }
}

/// Unify a pattern term with a ground term, extending `bindings`
pub(crate) fn unify_term(pattern: &Term, ground: &Term, bindings: &mut Bindings) -> bool {
    match (pattern, ground) {
        (Term::Variable(var), _) => match bindings.get(var) {
            Some(existing) => existing == ground,
            None => {
                bindings.insert(var.clone(), ground.clone());
                true
            }
        },
        (Term::List(p), Term::List(g)) if !p.is_ground() => {
            p.len() == g.len()
                && p.items()
                    .iter()
                    .zip(g.items())
                    .all(|(pt, gt)| unify_term(pt, gt, bindings))
        }
        _ => pattern == ground,
    }
}
