//! RDF writers
//!
//! N3/Turtle output is prefix-compacted and grouped by subject. N-Triples
//! and N-Quads use full IRIs, and JSON-LD is written in flattened form
//! (`@graph` of node objects) with the prefixes as its `@context`.
//!
//! Blank nodes are written as `_:b<id>` so that nodes from different
//! documents merged into one store never collide on a shared label.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::parser::Format;
use crate::store::Store;
use crate::term::{escape_string, ns, Datatype, FormulaRef, GraphName, Literal, Quad, Term, Triple};

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("{format} cannot represent {what}")]
    Unsupported { format: &'static str, what: String },

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Prefixes offered to the N3 writer when the caller supplies none
pub fn default_prefixes() -> IndexMap<String, String> {
    [
        ("rdf", ns::RDF),
        ("rdfs", ns::RDFS),
        ("xsd", ns::XSD),
        ("log", ns::LOG),
        ("pol", ns::POL),
        ("fno", ns::FNO),
        ("sh", ns::SH),
        ("as", ns::AS),
    ]
    .into_iter()
    .map(|(p, n)| (p.to_string(), n.to_string()))
    .collect()
}

/// Serialize a store in the requested syntax
pub fn serialize(
    store: &Store,
    format: Format,
    prefixes: &IndexMap<String, String>,
) -> Result<String, SerializeError> {
    match format {
        Format::N3 | Format::Turtle => Ok(write_n3(store, prefixes)),
        Format::NTriples => write_lines(store, false),
        Format::NQuads => write_lines(store, true),
        Format::JsonLd => write_jsonld(store, prefixes),
    }
}

/// N3 with the default prefix table
pub fn to_n3(store: &Store) -> String {
    write_n3(store, &default_prefixes())
}

struct N3Formatter<'a> {
    prefixes: &'a IndexMap<String, String>,
}

impl<'a> N3Formatter<'a> {
    fn compact_uri(&self, uri: &str) -> String {
        for (short, long) in self.prefixes {
            if let Some(local) = uri.strip_prefix(long.as_str()) {
                if is_valid_local_name(local) {
                    return format!("{}:{}", short, local);
                }
            }
        }
        format!("<{}>", uri)
    }

    fn predicate(&self, term: &Term) -> String {
        match term {
            Term::Uri(u) if u.as_str() == ns::RDF_TYPE => "a".to_string(),
            Term::Uri(u) if u.as_str() == ns::LOG_IMPLIES => "=>".to_string(),
            other => self.term(other),
        }
    }

    fn term(&self, term: &Term) -> String {
        match term {
            Term::Uri(u) => self.compact_uri(u.as_str()),
            Term::Literal(l) => self.literal(l),
            Term::BlankNode(b) => format!("_:{}", b.serial_label()),
            Term::Variable(v) => v.to_string(),
            Term::List(l) => {
                let items: Vec<String> = l.items().iter().map(|t| self.term(t)).collect();
                format!("( {} )", items.join(" "))
            }
            Term::Formula(f) => self.formula(f),
        }
    }

    fn literal(&self, lit: &Literal) -> String {
        let value = escape_string(lit.value());
        match lit.datatype() {
            Datatype::Plain => format!("\"{}\"", value),
            Datatype::Language(lang) => format!("\"{}\"@{}", value, lang),
            Datatype::Typed(dt) => format!("\"{}\"^^{}", value, self.compact_uri(dt)),
        }
    }

    fn formula(&self, formula: &FormulaRef) -> String {
        let parts: Vec<String> = formula
            .triples()
            .iter()
            .map(|t| format!("{} {} {}", self.term(&t.subject), self.predicate(&t.predicate), self.term(&t.object)))
            .collect();
        if parts.is_empty() {
            "{}".to_string()
        } else {
            format!("{{ {} }}", parts.join(" . "))
        }
    }
}

fn is_valid_local_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    !s.ends_with('.') && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn collect_namespaces(term: &Term, prefixes: &IndexMap<String, String>, used: &mut HashSet<String>) {
    let namespace_of = |iri: &str| {
        prefixes
            .values()
            .find(|ns| iri.strip_prefix(ns.as_str()).map_or(false, is_valid_local_name))
            .cloned()
    };
    match term {
        Term::Uri(u) => used.extend(namespace_of(u.as_str())),
        Term::Literal(l) => used.extend(l.datatype_uri().and_then(namespace_of)),
        Term::Formula(f) => {
            for t in f.triples() {
                for part in t.terms() {
                    collect_namespaces(part, prefixes, used);
                }
            }
        }
        Term::List(l) => {
            for item in l.items() {
                collect_namespaces(item, prefixes, used);
            }
        }
        Term::BlankNode(_) | Term::Variable(_) => {}
    }
}

fn write_n3(store: &Store, prefixes: &IndexMap<String, String>) -> String {
    let graphs = store.graph_names();
    if !graphs.is_empty() {
        tracing::debug!(graphs = graphs.len(), "N3 output flattens named graphs into the default graph");
    }

    let formatter = N3Formatter { prefixes };
    let mut used = HashSet::new();
    for triple in store.triples() {
        for term in triple.terms() {
            collect_namespaces(term, prefixes, &mut used);
        }
    }

    let mut output = String::new();
    for (short, long) in prefixes {
        if used.contains(long) {
            let _ = writeln!(output, "@prefix {}: <{}> .", short, long);
        }
    }
    if !used.is_empty() {
        output.push('\n');
    }

    let mut by_subject: IndexMap<String, Vec<&Triple>> = IndexMap::new();
    let mut seen = HashSet::new();
    for triple in store.triples() {
        if seen.insert(triple) {
            by_subject
                .entry(formatter.term(&triple.subject))
                .or_default()
                .push(triple);
        }
    }

    for (subject, triples) in by_subject {
        if let [single] = triples.as_slice() {
            let _ = writeln!(
                output,
                "{} {} {} .",
                subject,
                formatter.predicate(&single.predicate),
                formatter.term(&single.object)
            );
            continue;
        }
        let _ = writeln!(output, "{}", subject);
        for (i, t) in triples.iter().enumerate() {
            let sep = if i + 1 < triples.len() { ";" } else { "." };
            let _ = writeln!(
                output,
                "    {} {} {}",
                formatter.predicate(&t.predicate),
                formatter.term(&t.object),
                sep
            );
        }
    }
    output
}

/// Replace list terms by `rdf:first`/`rdf:rest` chains
fn lower_lists(quad: &Quad, format: &'static str, out: &mut Vec<Quad>) -> Result<(), SerializeError> {
    fn lower(term: &Term, graph: &GraphName, format: &'static str, out: &mut Vec<Quad>) -> Result<Term, SerializeError> {
        match term {
            Term::List(list) => {
                let mut head = Term::uri(ns::RDF_NIL);
                for item in list.items().iter().rev() {
                    let item = lower(item, graph, format, out)?;
                    let cell = Term::fresh_blank();
                    out.push(Quad::new(Triple::new(cell.clone(), Term::uri(ns::RDF_FIRST), item), graph.clone()));
                    out.push(Quad::new(Triple::new(cell.clone(), Term::uri(ns::RDF_REST), head), graph.clone()));
                    head = cell;
                }
                Ok(head)
            }
            Term::Formula(_) => Err(SerializeError::Unsupported {
                format,
                what: "quoted formulas".into(),
            }),
            Term::Variable(v) => Err(SerializeError::Unsupported {
                format,
                what: format!("variable {}", v),
            }),
            other => Ok(other.clone()),
        }
    }

    let subject = lower(&quad.triple.subject, &quad.graph, format, out)?;
    let predicate = lower(&quad.triple.predicate, &quad.graph, format, out)?;
    let object = lower(&quad.triple.object, &quad.graph, format, out)?;
    out.push(Quad::new(Triple::new(subject, predicate, object), quad.graph.clone()));
    Ok(())
}

fn line_term(term: &Term) -> String {
    match term {
        Term::BlankNode(b) => format!("_:{}", b.serial_label()),
        other => other.to_string(),
    }
}

fn write_lines(store: &Store, with_graph: bool) -> Result<String, SerializeError> {
    let format = if with_graph { "N-Quads" } else { "N-Triples" };
    let mut lowered = Vec::new();
    for quad in store.iter() {
        lower_lists(quad, format, &mut lowered)?;
    }

    let mut output = String::new();
    let mut seen = HashSet::new();
    for quad in &lowered {
        let graph = match (&quad.graph, with_graph) {
            (GraphName::Named(g), true) => format!(" {}", line_term(g)),
            _ => String::new(),
        };
        let line = format!(
            "{} {} {}{} .",
            line_term(&quad.triple.subject),
            line_term(&quad.triple.predicate),
            line_term(&quad.triple.object),
            graph
        );
        if seen.insert(line.clone()) {
            output.push_str(&line);
            output.push('\n');
        }
    }
    Ok(output)
}

fn node_id(term: &Term) -> Option<String> {
    match term {
        Term::Uri(u) => Some(u.as_str().to_string()),
        Term::BlankNode(b) => Some(format!("_:{}", b.serial_label())),
        _ => None,
    }
}

fn jsonld_value(term: &Term) -> Result<Value, SerializeError> {
    if let Some(id) = node_id(term) {
        return Ok(json!({ "@id": id }));
    }
    match term {
        Term::Literal(l) => Ok(match l.datatype() {
            Datatype::Plain => Value::String(l.value().to_string()),
            Datatype::Language(lang) => json!({ "@value": l.value(), "@language": lang }),
            Datatype::Typed(dt) => json!({ "@value": l.value(), "@type": dt }),
        }),
        Term::List(list) => {
            let items = list.items().iter().map(jsonld_value).collect::<Result<Vec<_>, _>>()?;
            Ok(json!({ "@list": items }))
        }
        Term::Formula(_) => Err(SerializeError::Unsupported {
            format: "JSON-LD",
            what: "quoted formulas".into(),
        }),
        _ => Err(SerializeError::Unsupported {
            format: "JSON-LD",
            what: format!("term {}", term),
        }),
    }
}

fn write_jsonld(store: &Store, prefixes: &IndexMap<String, String>) -> Result<String, SerializeError> {
    let mut graphs: IndexMap<Option<String>, IndexMap<String, Map<String, Value>>> = IndexMap::new();
    graphs.entry(None).or_default();

    for quad in store.iter() {
        let subject = node_id(&quad.triple.subject).ok_or_else(|| SerializeError::Unsupported {
            format: "JSON-LD",
            what: format!("subject {}", quad.triple.subject),
        })?;
        let predicate = quad.triple.predicate.as_uri().ok_or_else(|| SerializeError::Unsupported {
            format: "JSON-LD",
            what: format!("predicate {}", quad.triple.predicate),
        })?;
        let graph_key = quad.graph.as_term().and_then(node_id);

        let node = graphs
            .entry(graph_key)
            .or_default()
            .entry(subject.clone())
            .or_insert_with(|| {
                let mut m = Map::new();
                m.insert("@id".into(), Value::String(subject));
                m
            });

        let (key, value) = match (&quad.triple.object, predicate.as_str() == ns::RDF_TYPE) {
            (object, true) if object.is_node() => ("@type".to_string(), Value::String(node_id(object).unwrap_or_default())),
            (object, _) => (predicate.as_str().to_string(), jsonld_value(object)?),
        };
        if let Value::Array(values) = node.entry(key).or_insert_with(|| Value::Array(Vec::new())) {
            values.push(value);
        }
    }

    let mut top: Vec<Value> = Vec::new();
    for (graph, nodes) in graphs {
        let nodes: Vec<Value> = nodes.into_values().map(Value::Object).collect();
        match graph {
            None => top.extend(nodes),
            Some(id) => top.push(json!({ "@id": id, "@graph": nodes })),
        }
    }

    let mut doc = Map::new();
    if !prefixes.is_empty() {
        let context: Map<String, Value> = prefixes
            .iter()
            .map(|(p, n)| (p.clone(), Value::String(n.clone())))
            .collect();
        doc.insert("@context".into(), Value::Object(context));
    }
    doc.insert("@graph".into(), Value::Array(top));
    Ok(serde_json::to_string_pretty(&Value::Object(doc))?)
}

/// One JSON-LD node object rooted at `root`, with what it reaches embedded
///
/// A node with triples is embedded where it is first reached and referenced
/// by `@id` after that, so cycles end. Blank nodes keep an `@id` only when
/// referenced more than once. Predicates and types are compacted against
/// `prefixes`, which also become the `@context`.
pub fn frame_jsonld(store: &Store, root: &Term, prefixes: &IndexMap<String, String>) -> Result<String, SerializeError> {
    let mut references: HashMap<&Term, usize> = HashMap::new();
    for quad in store.iter() {
        *references.entry(quad.object()).or_default() += 1;
    }
    let mut framer = Framer {
        store,
        prefixes,
        references,
        embedded: HashSet::new(),
    };

    let mut doc = Map::new();
    if !prefixes.is_empty() {
        let context: Map<String, Value> = prefixes
            .iter()
            .map(|(p, n)| (p.clone(), Value::String(n.clone())))
            .collect();
        doc.insert("@context".into(), Value::Object(context));
    }
    doc.extend(framer.node(root)?);
    Ok(serde_json::to_string_pretty(&Value::Object(doc))?)
}

struct Framer<'a> {
    store: &'a Store,
    prefixes: &'a IndexMap<String, String>,
    references: HashMap<&'a Term, usize>,
    embedded: HashSet<Term>,
}

impl Framer<'_> {
    fn node(&mut self, subject: &Term) -> Result<Map<String, Value>, SerializeError> {
        self.embedded.insert(subject.clone());
        let mut node = Map::new();
        let shared = self.references.get(subject).copied().unwrap_or(0) > 1;
        if !subject.is_blank() || shared {
            if let Some(id) = node_id(subject) {
                node.insert("@id".into(), Value::String(id));
            }
        }

        let store = self.store;
        for quad in store.quads_with_subject(subject) {
            let predicate = quad.triple.predicate.as_uri().ok_or_else(|| SerializeError::Unsupported {
                format: "JSON-LD",
                what: format!("predicate {}", quad.triple.predicate),
            })?;
            let object = &quad.triple.object;
            let (key, value) = match node_id(object) {
                Some(id) if predicate.as_str() == ns::RDF_TYPE => ("@type".to_string(), Value::String(self.compact(&id))),
                _ => (self.compact(predicate.as_str()), self.value(object)?),
            };
            match node.get_mut(&key) {
                Some(Value::Array(values)) => values.push(value),
                Some(single) => {
                    let first = single.take();
                    *single = Value::Array(vec![first, value]);
                }
                None => {
                    node.insert(key, value);
                }
            }
        }
        Ok(node)
    }

    fn value(&mut self, object: &Term) -> Result<Value, SerializeError> {
        let embeddable = object.is_node()
            && !self.embedded.contains(object)
            && self.store.quads_with_subject(object).next().is_some();
        if embeddable {
            Ok(Value::Object(self.node(object)?))
        } else {
            jsonld_value(object)
        }
    }

    fn compact(&self, iri: &str) -> String {
        for (prefix, namespace) in self.prefixes {
            if let Some(local) = iri.strip_prefix(namespace.as_str()) {
                if is_valid_local_name(local) {
                    return format!("{}:{}", prefix, local);
                }
            }
        }
        iri.to_string()
    }
}
