//! In-process N3 rule engine
//!
//! Forward chaining over `{ body } => { head }` rules:
//! - `?x` variables and body blank nodes are matched universally
//! - head blank nodes that do not occur in the body are existentials and
//!   get a fresh node on every firing
//! - each (rule, body binding) pair fires at most once, which is what makes
//!   existential heads terminate
//! - builtin body patterns are evaluated after the ordinary ones
//!
//! [`main`] is the command-line style entry point used by the embedded
//! reasoner backend: it reads its input files from a virtual filesystem and
//! prints the resulting graph as N3.

use fnv::{FnvHashMap, FnvHashSet};
use indexmap::IndexMap;

use super::ReasonerError;
use crate::builtins::{BuiltinRegistry, BuiltinResult};
use crate::parser::parse_n3;
use crate::serializer::to_n3;
use crate::store::Store;
use crate::term::{ns, substitute_triple, Bindings, BlankNode, FormulaRef, Quad, Term, Triple, Variable};

/// File name to contents
pub type Vfs = IndexMap<String, String>;

pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// A rule in N3 (antecedent => consequent)
#[derive(Clone, Debug)]
pub struct Rule {
    pub antecedent: Vec<Triple>,
    pub consequent: Vec<Triple>,
    /// Body variables, in first-seen order; the firing key
    variables: Vec<Variable>,
}

impl Rule {
    /// Body blank nodes become variables; the same node in the head is
    /// bound through them.
    pub fn new(antecedent: Vec<Triple>, consequent: Vec<Triple>) -> Self {
        let mut renamed = FnvHashMap::default();
        let antecedent: Vec<Triple> = antecedent
            .iter()
            .map(|t| map_triple(t, &mut |term| blank_to_variable(term, &mut renamed, true)))
            .collect();
        let consequent: Vec<Triple> = consequent
            .iter()
            .map(|t| map_triple(t, &mut |term| blank_to_variable(term, &mut renamed, false)))
            .collect();

        let mut variables = Vec::new();
        for triple in &antecedent {
            for term in triple.terms() {
                collect_variables(term, &mut variables);
            }
        }

        Rule {
            antecedent,
            consequent,
            variables,
        }
    }

    pub fn from_formulas(body: &FormulaRef, head: &FormulaRef) -> Self {
        Self::new(body.triples().to_vec(), head.triples().to_vec())
    }

    /// `Some` if `quad` is a `{..} log:implies {..}` statement
    pub fn from_quad(quad: &Quad) -> Option<Self> {
        if !matches!(quad.predicate(), Term::Uri(u) if u.as_str() == ns::LOG_IMPLIES) {
            return None;
        }
        match (quad.subject(), quad.object()) {
            (Term::Formula(body), Term::Formula(head)) => Some(Self::from_formulas(body, head)),
            _ => None,
        }
    }
}

fn map_triple(triple: &Triple, f: &mut dyn FnMut(&Term) -> Option<Term>) -> Triple {
    Triple::new(
        map_term(&triple.subject, f),
        map_term(&triple.predicate, f),
        map_term(&triple.object, f),
    )
}

fn map_term(term: &Term, f: &mut dyn FnMut(&Term) -> Option<Term>) -> Term {
    if let Some(mapped) = f(term) {
        return mapped;
    }
    match term {
        Term::List(list) => Term::list(list.items().iter().map(|t| map_term(t, f)).collect()),
        other => other.clone(),
    }
}

fn blank_to_variable(
    term: &Term,
    renamed: &mut FnvHashMap<BlankNode, Variable>,
    in_body: bool,
) -> Option<Term> {
    let Term::BlankNode(b) = term else {
        return None;
    };
    if in_body {
        let var = renamed
            .entry(b.clone())
            .or_insert_with(|| Variable::new(format!("_{}", b.key())));
        return Some(Term::Variable(var.clone()));
    }
    renamed.get(b).map(|v| Term::Variable(v.clone()))
}

fn collect_variables(term: &Term, vars: &mut Vec<Variable>) {
    match term {
        Term::Variable(v) if !vars.contains(v) => vars.push(v.clone()),
        Term::List(list) => list.items().iter().for_each(|t| collect_variables(t, vars)),
        _ => {}
    }
}

#[derive(Clone, Debug, Default)]
pub struct ChainerStats {
    pub steps: usize,
    pub firings: usize,
    pub derived: usize,
}

/// The forward-chaining loop
pub struct ForwardChainer {
    rules: Vec<Rule>,
    builtins: BuiltinRegistry,
    max_steps: usize,
    fired: FnvHashSet<(usize, Vec<Term>)>,
    stats: ChainerStats,
}

impl ForwardChainer {
    pub fn new(max_steps: usize) -> Self {
        ForwardChainer {
            rules: Vec::new(),
            builtins: BuiltinRegistry::new(),
            max_steps,
            fired: FnvHashSet::default(),
            stats: ChainerStats::default(),
        }
    }

    pub fn add_rule(&mut self, mut rule: Rule) {
        // stable: ordinary patterns keep their order, builtins move last
        let builtins = &self.builtins;
        rule.antecedent
            .sort_by_key(|t| builtins.is_builtin_term(&t.predicate));
        self.rules.push(rule);
    }

    pub fn stats(&self) -> &ChainerStats {
        &self.stats
    }

    /// Saturate `store`; returns the derived quads in derivation order
    pub fn run(&mut self, store: &mut Store) -> Store {
        let mut derived = Store::new();

        loop {
            if self.stats.steps >= self.max_steps {
                tracing::warn!(max_steps = self.max_steps, "inference stopped at step bound");
                break;
            }
            self.stats.steps += 1;

            let pending = self.step(store);
            if pending.is_empty() {
                break;
            }
            for triple in pending {
                if store.add(triple.clone()) {
                    derived.add(triple);
                    self.stats.derived += 1;
                }
            }
        }

        derived
    }

    /// One pass over every rule. Returns the head triples of new firings.
    fn step(&mut self, store: &Store) -> Vec<Triple> {
        let mut pending = Vec::new();

        for (index, rule) in self.rules.iter().enumerate() {
            let mut solutions = Vec::new();
            self.solve(store, &rule.antecedent, Bindings::default(), &mut solutions);

            for bindings in solutions {
                let key: Vec<Term> = rule
                    .variables
                    .iter()
                    .map(|v| bindings.get(v).cloned().unwrap_or_else(|| Term::Variable(v.clone())))
                    .collect();
                if !self.fired.insert((index, key)) {
                    continue;
                }
                self.stats.firings += 1;

                let mut existentials: FnvHashMap<BlankNode, Term> = FnvHashMap::default();
                for pattern in &rule.consequent {
                    let triple = substitute_triple(pattern, &bindings);
                    let triple = map_triple(&triple, &mut |term| match term {
                        Term::BlankNode(b) => Some(
                            existentials
                                .entry(b.clone())
                                .or_insert_with(Term::fresh_blank)
                                .clone(),
                        ),
                        _ => None,
                    });
                    if triple.is_ground() {
                        pending.push(triple);
                    } else {
                        tracing::debug!(triple = %triple, "dropping head triple with unbound variables");
                    }
                }
            }
        }

        pending
    }

    fn solve(&self, store: &Store, patterns: &[Triple], bindings: Bindings, out: &mut Vec<Bindings>) {
        let Some((first, rest)) = patterns.split_first() else {
            out.push(bindings);
            return;
        };
        let pattern = substitute_triple(first, &bindings);

        if let Some(uri) = pattern.predicate.as_uri().filter(|u| self.builtins.is_builtin(u.as_str())) {
            match self
                .builtins
                .evaluate(uri.as_str(), &pattern.subject, &pattern.object, &bindings)
            {
                BuiltinResult::Success(extra) => {
                    let mut merged = bindings;
                    merged.extend(extra);
                    self.solve(store, rest, merged, out);
                }
                BuiltinResult::Failure => {}
                BuiltinResult::NotReady => {
                    tracing::trace!(builtin = uri.as_str(), "builtin arguments unbound");
                }
            }
            return;
        }

        for found in store.match_pattern(&pattern) {
            let mut merged = bindings.clone();
            merged.extend(found);
            self.solve(store, rest, merged, out);
        }
    }
}

#[derive(Debug, Default)]
struct Options {
    quiet: bool,
    pass_all: bool,
    max_steps: Option<usize>,
    files: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<Options, ReasonerError> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--quiet" => options.quiet = true,
            "--nope" => {}
            "--pass" => options.pass_all = true,
            "--pass-only-new" => options.pass_all = false,
            "--max-steps" => {
                let value = iter
                    .next()
                    .ok_or_else(|| ReasonerError::InvalidArgument("--max-steps needs a value".into()))?;
                let steps = value
                    .parse()
                    .map_err(|_| ReasonerError::InvalidArgument(format!("--max-steps {}", value)))?;
                options.max_steps = Some(steps);
            }
            flag if flag.starts_with("--") => {
                return Err(ReasonerError::InvalidArgument(flag.to_string()));
            }
            file => options.files.push(file.to_string()),
        }
    }
    Ok(options)
}

/// Engine entry point
///
/// Recognized flags: `--quiet`, `--nope`, `--pass` (print every fact),
/// `--pass-only-new` (print derived facts only, the default) and
/// `--max-steps N`. Every other argument names a file in `vfs`; rules and
/// facts may be mixed across files.
pub fn main(vfs: &Vfs, args: &[String], print: &mut dyn FnMut(&str)) -> Result<(), ReasonerError> {
    let options = parse_args(args)?;
    let mut chainer = ForwardChainer::new(options.max_steps.unwrap_or(DEFAULT_MAX_STEPS));
    let mut facts = Store::new();

    for name in &options.files {
        let text = vfs
            .get(name)
            .ok_or_else(|| ReasonerError::MissingFile(name.clone()))?;
        let store = parse_n3(text).map_err(|e| ReasonerError::Engine(format!("{}: {}", name, e)))?;
        for quad in store.iter() {
            match Rule::from_quad(quad) {
                Some(rule) => chainer.add_rule(rule),
                None => {
                    facts.add_quad(quad.clone());
                }
            }
        }
    }

    let derived = chainer.run(&mut facts);
    if !options.quiet {
        let stats = chainer.stats();
        tracing::info!(
            steps = stats.steps,
            firings = stats.firings,
            derived = stats.derived,
            "inference finished"
        );
    }

    let output = if options.pass_all { &facts } else { &derived };
    print(&to_n3(output));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "@prefix ex: <http://example.org/> .\n";

    fn run(files: &[(&str, &str)], args: &[&str]) -> Result<Store, ReasonerError> {
        let vfs: Vfs = files
            .iter()
            .map(|(n, t)| (n.to_string(), format!("{}{}", PREFIX, t)))
            .collect();
        let mut argv: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        argv.extend(files.iter().map(|(n, _)| n.to_string()));
        let mut out = String::new();
        main(&vfs, &argv, &mut |s| out.push_str(s))?;
        Ok(parse_n3(&out).unwrap())
    }

    fn ex(local: &str) -> Term {
        Term::uri(format!("http://example.org/{}", local))
    }

    #[test]
    fn test_pass_through() {
        let out = run(&[("data_0.n3", "ex:a a ex:T .")], &["--quiet", "--pass"]).unwrap();
        assert!(out.contains(&Triple::new(ex("a"), Term::uri(ns::RDF_TYPE), ex("T"))));
    }

    #[test]
    fn test_transitive_rule() {
        let out = run(
            &[
                ("data_0.n3", "ex:a ex:sub ex:b . ex:b ex:sub ex:c ."),
                ("rules_0.n3", "{ ?x ex:sub ?y . ?y ex:sub ?z } => { ?x ex:sub ?z } ."),
            ],
            &["--pass-only-new"],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert!(out.contains(&Triple::new(ex("a"), ex("sub"), ex("c"))));
    }

    #[test]
    fn test_existential_head_fires_once_per_binding() {
        let out = run(
            &[
                ("data_0.n3", "ex:a a ex:Item . ex:b a ex:Item ."),
                ("rules_0.n3", "{ ?x a ex:Item } => { [] ex:about ?x ; ex:kind ex:Note } ."),
            ],
            &["--pass"],
        )
        .unwrap();
        let notes: Vec<&Quad> = out.iter().filter(|q| q.object() == &ex("Note")).collect();
        assert_eq!(notes.len(), 2);
        assert_ne!(notes[0].subject(), notes[1].subject());
        assert!(notes[0].subject().is_blank());
    }

    #[test]
    fn test_body_blank_nodes_match_anything() {
        let out = run(
            &[
                ("data_0.n3", "ex:a ex:p [ ex:q ex:v ] ."),
                ("rules_0.n3", "{ ?s ex:p _:x . _:x ex:q ?v } => { ?s ex:r ?v } ."),
            ],
            &[],
        )
        .unwrap();
        assert!(out.contains(&Triple::new(ex("a"), ex("r"), ex("v"))));
    }

    #[test]
    fn test_builtins_filter() {
        let out = run(
            &[
                ("data_0.n3", "ex:a ex:n 3 . ex:b ex:n 12 ."),
                (
                    "rules_0.n3",
                    "@prefix math: <http://www.w3.org/2000/10/swap/math#> .\n\
                     { ?x ex:n ?n . ?n math:greaterThan 10 } => { ?x a ex:Big } .",
                ),
            ],
            &[],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert!(out.contains(&Triple::new(ex("b"), Term::uri(ns::RDF_TYPE), ex("Big"))));
    }

    #[test]
    fn test_step_bound_stops_runaway_rules() {
        let out = run(
            &[
                ("data_0.n3", "ex:a ex:next [] ."),
                ("rules_0.n3", "{ ?x ex:next ?y } => { ?y ex:next [] } ."),
            ],
            &["--max-steps", "5"],
        )
        .unwrap();
        assert!(out.len() <= 5);
    }

    #[test]
    fn test_missing_file_and_bad_flag() {
        let vfs = Vfs::new();
        let mut sink = |_: &str| {};
        assert!(matches!(
            main(&vfs, &["nope.n3".to_string()], &mut sink),
            Err(ReasonerError::MissingFile(_))
        ));
        assert!(matches!(
            main(&vfs, &["--frobnicate".to_string()], &mut sink),
            Err(ReasonerError::InvalidArgument(_))
        ));
    }
}
