//! Built-in predicates for rule bodies
//!
//! The small set the policy rules rely on:
//! - log: `equalTo`, `notEqualTo`
//! - string: `contains`, `startsWith`, `matches`
//! - math: `lessThan`, `greaterThan`, `sum`
//!
//! Builtins are evaluated after ordinary body patterns, so their arguments
//! are normally bound; an unbound argument yields [`BuiltinResult::NotReady`].

use std::collections::HashMap;

use regex::Regex;

use crate::term::{ns, Bindings, Term};

/// Result of evaluating a built-in
#[derive(Debug, Clone)]
pub enum BuiltinResult {
    /// Succeeded, possibly with extra bindings
    Success(Bindings),
    Failure,
    /// Arguments not bound yet
    NotReady,
}

/// A built-in predicate function
pub type BuiltinFn = fn(&Term, &Term, &Bindings) -> BuiltinResult;

/// Registry of built-in predicates keyed by predicate IRI
pub struct BuiltinRegistry {
    builtins: HashMap<String, BuiltinFn>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut registry = BuiltinRegistry {
            builtins: HashMap::new(),
        };
        registry.register_log();
        registry.register_string();
        registry.register_math();
        registry
    }

    pub fn register(&mut self, uri: &str, f: BuiltinFn) {
        self.builtins.insert(uri.to_string(), f);
    }

    pub fn is_builtin(&self, uri: &str) -> bool {
        self.builtins.contains_key(uri)
    }

    /// Builtin check for a predicate term
    pub fn is_builtin_term(&self, predicate: &Term) -> bool {
        predicate.as_uri().is_some_and(|u| self.is_builtin(u.as_str()))
    }

    pub fn evaluate(&self, predicate: &str, subject: &Term, object: &Term, bindings: &Bindings) -> BuiltinResult {
        match self.builtins.get(predicate) {
            Some(f) => f(subject, object, bindings),
            None => BuiltinResult::Failure,
        }
    }

    fn register_log(&mut self) {
        self.register(&format!("{}equalTo", ns::LOG), |subject, object, bindings| {
            match (subject, object) {
                (Term::Variable(v), other) | (other, Term::Variable(v)) if other.is_ground() => {
                    let mut extended = bindings.clone();
                    extended.insert(v.clone(), other.clone());
                    BuiltinResult::Success(extended)
                }
                _ if !subject.is_ground() || !object.is_ground() => BuiltinResult::NotReady,
                _ => check(subject == object),
            }
        });

        self.register(&format!("{}notEqualTo", ns::LOG), |subject, object, _| {
            if !subject.is_ground() || !object.is_ground() {
                return BuiltinResult::NotReady;
            }
            check(subject != object)
        });
    }

    fn register_string(&mut self) {
        self.register(&format!("{}contains", ns::STRING), |subject, object, _| {
            match (get_string(subject), get_string(object)) {
                (Some(a), Some(b)) => check(a.contains(&b)),
                _ => not_ready_or_fail(subject, object),
            }
        });

        self.register(&format!("{}startsWith", ns::STRING), |subject, object, _| {
            match (get_string(subject), get_string(object)) {
                (Some(a), Some(b)) => check(a.starts_with(&b)),
                _ => not_ready_or_fail(subject, object),
            }
        });

        self.register(&format!("{}matches", ns::STRING), |subject, object, _| {
            match (get_string(subject), get_string(object)) {
                (Some(text), Some(pattern)) => match Regex::new(&pattern) {
                    Ok(re) => check(re.is_match(&text)),
                    Err(e) => {
                        tracing::debug!(pattern = %pattern, error = %e, "invalid regex in string:matches");
                        BuiltinResult::Failure
                    }
                },
                _ => not_ready_or_fail(subject, object),
            }
        });
    }

    fn register_math(&mut self) {
        self.register(&format!("{}lessThan", ns::MATH), |subject, object, _| {
            match (get_number(subject), get_number(object)) {
                (Some(a), Some(b)) => check(a < b),
                _ => not_ready_or_fail(subject, object),
            }
        });

        self.register(&format!("{}greaterThan", ns::MATH), |subject, object, _| {
            match (get_number(subject), get_number(object)) {
                (Some(a), Some(b)) => check(a > b),
                _ => not_ready_or_fail(subject, object),
            }
        });

        // ( a b ... ) math:sum c
        self.register(&format!("{}sum", ns::MATH), |subject, object, bindings| {
            let Term::List(list) = subject else {
                return BuiltinResult::Failure;
            };
            if !list.is_ground() {
                return BuiltinResult::NotReady;
            }
            let items = list.items();
            if let Some(ints) = items.iter().map(get_integer).collect::<Option<Vec<i64>>>() {
                return match ints.iter().try_fold(0i64, |acc, n| acc.checked_add(*n)) {
                    Some(total) => match_or_bind(object, Term::integer(total), bindings),
                    None => BuiltinResult::Failure,
                };
            }
            match items.iter().map(get_number).collect::<Option<Vec<f64>>>() {
                Some(nums) => {
                    let total: f64 = nums.iter().sum();
                    match_or_bind(object, Term::typed_literal(total.to_string(), ns::XSD_DECIMAL), bindings)
                }
                None => BuiltinResult::Failure,
            }
        });
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn check(holds: bool) -> BuiltinResult {
    if holds {
        BuiltinResult::Success(Bindings::default())
    } else {
        BuiltinResult::Failure
    }
}

fn not_ready_or_fail(subject: &Term, object: &Term) -> BuiltinResult {
    if subject.is_ground() && object.is_ground() {
        BuiltinResult::Failure
    } else {
        BuiltinResult::NotReady
    }
}

fn get_number(term: &Term) -> Option<f64> {
    term.as_literal().and_then(|lit| lit.as_float())
}

fn get_integer(term: &Term) -> Option<i64> {
    term.as_literal().and_then(|lit| lit.as_integer())
}

fn get_string(term: &Term) -> Option<String> {
    match term {
        Term::Literal(lit) => Some(lit.value().to_string()),
        Term::Uri(uri) => Some(uri.as_str().to_string()),
        _ => None,
    }
}

/// Bind `object` to `value`, or compare numerically when already bound
fn match_or_bind(object: &Term, value: Term, bindings: &Bindings) -> BuiltinResult {
    match object {
        Term::Variable(var) => {
            let mut extended = bindings.clone();
            extended.insert(var.clone(), value);
            BuiltinResult::Success(extended)
        }
        Term::Literal(_) => match (get_number(object), get_number(&value)) {
            (Some(a), Some(b)) => check((a - b).abs() < f64::EPSILON),
            _ => BuiltinResult::Failure,
        },
        _ => BuiltinResult::Failure,
    }
}
