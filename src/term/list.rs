//! N3 collections `( a b c )`

use std::fmt;

use super::{Bindings, Term};

/// An ordered collection term. Kept as a first-class term so that rule
/// builtins can take argument lists; serializers that lack list syntax
/// expand it into an `rdf:first`/`rdf:rest` chain.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct List {
    items: Vec<Term>,
}

impl List {
    pub fn new(items: Vec<Term>) -> Self {
        List { items }
    }

    pub fn items(&self) -> &[Term] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_ground(&self) -> bool {
        self.items.iter().all(Term::is_ground)
    }

    pub fn substitute(&self, bindings: &Bindings) -> List {
        List {
            items: self.items.iter().map(|t| super::substitute(t, bindings)).collect(),
        }
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for item in &self.items {
            write!(f, " {:?}", item)?;
        }
        write!(f, " )")
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for item in &self.items {
            write!(f, " {}", item)?;
        }
        write!(f, " )")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_ground_and_substitute() {
        let x = super::super::Variable::new("x");
        let list = List::new(vec![Term::literal("a"), Term::Variable(x.clone())]);
        assert_eq!(list.len(), 2);
        assert!(!list.is_ground());

        let mut bindings = Bindings::default();
        bindings.insert(x, Term::literal("b"));
        let bound = list.substitute(&bindings);
        assert!(bound.is_ground());
        assert_eq!(format!("{}", bound), "( \"a\" \"b\" )");
    }
}
