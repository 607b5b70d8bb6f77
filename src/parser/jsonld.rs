//! JSON-LD to RDF
//!
//! Supports the subset that activity-stream notifications and the crate's
//! own JSON-LD output use: inline and array contexts with prefixes, term
//! definitions (`@id`, `@type` coercion, `@container: @list`), `@vocab`,
//! `@base`, keyword aliases, `@id`, `@type`, `@graph`, value objects,
//! `@list` and nested node objects. Remote contexts are never fetched; the
//! ActivityStreams and COAR Notify contexts are built in, other URLs are
//! ignored with a warning.

use std::collections::HashMap;

use fnv::FnvHashMap;
use serde_json::{Map, Value};

use super::{Document, ParseError};
use crate::term::{ns, BlankNode, GraphName, Quad, Term, Triple, Uri};

pub const ACTIVITYSTREAMS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";
pub const COAR_NOTIFY_CONTEXT: &str = "https://purl.org/coar/notify";

/// ActivityStreams properties whose string values are IRIs
const AS_ID_TERMS: &[&str] = &[
    "actor", "attachment", "attributedTo", "audience", "bcc", "bto", "cc", "context",
    "current", "first", "generator", "icon", "image", "inReplyTo", "instrument", "last",
    "location", "next", "object", "oneOf", "anyOf", "origin", "partOf", "prev", "preview",
    "replies", "result", "tag", "target", "to", "url", "href", "followers", "following",
    "liked", "likes", "outbox", "shares", "streams", "endpoints",
];

const MAX_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq)]
enum Coercion {
    None,
    Id,
    Vocab,
    Datatype(String),
}

#[derive(Debug, Clone)]
struct TermDef {
    iri: String,
    coercion: Coercion,
    list: bool,
}

impl TermDef {
    fn simple(iri: impl Into<String>) -> Self {
        TermDef {
            iri: iri.into(),
            coercion: Coercion::None,
            list: false,
        }
    }

    fn id(iri: impl Into<String>) -> Self {
        TermDef {
            coercion: Coercion::Id,
            ..TermDef::simple(iri)
        }
    }
}

/// Active context
#[derive(Debug, Clone, Default)]
struct Context {
    vocab: Option<String>,
    base: Option<String>,
    terms: HashMap<String, TermDef>,
}

impl Context {
    fn merge(&mut self, value: &Value) -> Result<(), ParseError> {
        match value {
            Value::Null => {
                let base = self.base.take();
                *self = Context { base, ..Context::default() };
            }
            Value::String(url) => self.merge_remote(url),
            Value::Array(items) => {
                for item in items {
                    self.merge(item)?;
                }
            }
            Value::Object(map) => self.merge_object(map)?,
            other => {
                return Err(ParseError::JsonLd(format!("invalid @context entry: {}", other)));
            }
        }
        Ok(())
    }

    fn merge_remote(&mut self, url: &str) {
        let normalized = url.trim_end_matches('/').trim_end_matches(".jsonld");
        let normalized = normalized.replace("http://", "https://");
        if normalized == ACTIVITYSTREAMS_CONTEXT {
            self.vocab = Some(ns::AS.to_string());
            self.terms.insert("as".into(), TermDef::simple(ns::AS));
            self.terms.insert("ldp".into(), TermDef::simple(ns::LDP));
            self.terms.insert("xsd".into(), TermDef::simple(ns::XSD));
            self.terms.insert("id".into(), TermDef::simple("@id"));
            self.terms.insert("type".into(), TermDef::simple("@type"));
            for term in AS_ID_TERMS {
                self.terms.insert((*term).into(), TermDef::id(format!("{}{}", ns::AS, term)));
            }
            self.terms.insert("inbox".into(), TermDef::id(format!("{}inbox", ns::LDP)));
        } else if normalized == COAR_NOTIFY_CONTEXT {
            self.terms.insert(
                "coar-notify".into(),
                TermDef::simple("https://purl.org/coar/notify_vocabulary/"),
            );
            self.terms.insert("ietf".into(), TermDef::simple("http://www.iana.org/assignments/relation/"));
            self.terms.insert("sorg".into(), TermDef::simple("http://schema.org/"));
            self.terms.insert("ldp".into(), TermDef::simple(ns::LDP));
            self.terms.insert("inbox".into(), TermDef::id(format!("{}inbox", ns::LDP)));
            self.terms.insert(
                "ietf:cite-as".into(),
                TermDef::id("http://www.iana.org/assignments/relation/cite-as"),
            );
            self.terms.insert(
                "ietf:item".into(),
                TermDef::id("http://www.iana.org/assignments/relation/item"),
            );
        } else {
            tracing::warn!(context = %url, "remote JSON-LD context is not loaded");
        }
    }

    fn merge_object(&mut self, map: &Map<String, Value>) -> Result<(), ParseError> {
        for (key, value) in map {
            match key.as_str() {
                "@vocab" => self.vocab = value.as_str().map(|v| self.expand(v, true)),
                "@base" => self.base = value.as_str().map(str::to_string),
                "@language" | "@version" | "@protected" | "@propagate" => {}
                _ => match value {
                    Value::Null => {
                        self.terms.remove(key);
                    }
                    Value::String(iri) => {
                        self.terms.insert(key.clone(), TermDef::simple(iri.clone()));
                    }
                    Value::Object(def) => {
                        let iri = def
                            .get("@id")
                            .and_then(Value::as_str)
                            .unwrap_or(key)
                            .to_string();
                        let coercion = match def.get("@type").and_then(Value::as_str) {
                            Some("@id") => Coercion::Id,
                            Some("@vocab") => Coercion::Vocab,
                            Some(dt) => Coercion::Datatype(dt.to_string()),
                            None => Coercion::None,
                        };
                        let list = def.get("@container").and_then(Value::as_str) == Some("@list");
                        self.terms.insert(key.clone(), TermDef { iri, coercion, list });
                    }
                    other => {
                        return Err(ParseError::JsonLd(format!(
                            "invalid term definition for '{}': {}",
                            key, other
                        )));
                    }
                },
            }
        }
        Ok(())
    }

    /// Keyword a key stands for, following aliases
    fn keyword<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        if key.starts_with('@') {
            return Some(key);
        }
        self.terms
            .get(key)
            .map(|def| def.iri.as_str())
            .filter(|iri| iri.starts_with('@'))
    }

    fn expand(&self, value: &str, vocab: bool) -> String {
        self.expand_at(value, vocab, 0)
    }

    fn expand_at(&self, value: &str, vocab: bool, depth: usize) -> String {
        if value.starts_with('@') || depth > MAX_EXPANSION_DEPTH {
            return value.to_string();
        }
        if vocab {
            if let Some(def) = self.terms.get(value) {
                return self.expand_at(&def.iri, true, depth + 1);
            }
        }
        if let Some((prefix, suffix)) = value.split_once(':') {
            if prefix == "_" || suffix.starts_with("//") {
                return value.to_string();
            }
            if let Some(def) = self.terms.get(prefix) {
                return format!("{}{}", self.expand_at(&def.iri, true, depth + 1), suffix);
            }
            return value.to_string();
        }
        if vocab {
            if let Some(v) = &self.vocab {
                return format!("{}{}", v, value);
            }
        }
        match &self.base {
            Some(base) => Uri::new(base.clone()).resolve(value).as_str().to_string(),
            None => value.to_string(),
        }
    }
}

struct JsonLdParser {
    store_quads: Vec<Quad>,
    blank_labels: FnvHashMap<String, BlankNode>,
}

impl JsonLdParser {
    fn emit(&mut self, subject: Term, predicate: Term, object: Term, graph: &GraphName) {
        self.store_quads
            .push(Quad::new(Triple::new(subject, predicate, object), graph.clone()));
    }

    fn id_term(&mut self, iri: &str) -> Term {
        match iri.strip_prefix("_:") {
            Some(label) => Term::BlankNode(
                self.blank_labels
                    .entry(label.to_string())
                    .or_insert_with(|| BlankNode::labeled(label))
                    .clone(),
            ),
            None => Term::uri(iri),
        }
    }

    fn element(&mut self, value: &Value, ctx: &Context, graph: &GraphName) -> Result<(), ParseError> {
        match value {
            Value::Array(items) => {
                for item in items {
                    self.element(item, ctx, graph)?;
                }
                Ok(())
            }
            Value::Object(map) => self.node(map, ctx, graph).map(|_| ()),
            other => Err(ParseError::JsonLd(format!("expected a node object, found {}", other))),
        }
    }

    fn node(&mut self, map: &Map<String, Value>, outer: &Context, graph: &GraphName) -> Result<Term, ParseError> {
        let local;
        let ctx = match map.get("@context") {
            Some(c) => {
                let mut merged = outer.clone();
                merged.merge(c)?;
                local = merged;
                &local
            }
            None => outer,
        };

        let mut subject = None;
        for (key, value) in map {
            if ctx.keyword(key) == Some("@id") {
                let id = value
                    .as_str()
                    .ok_or_else(|| ParseError::JsonLd("@id must be a string".into()))?;
                subject = Some(self.id_term(&ctx.expand(id, false)));
            }
        }
        let has_id = subject.is_some();
        let subject = subject.unwrap_or_else(Term::fresh_blank);

        for (key, value) in map {
            match ctx.keyword(key) {
                Some("@id") | Some("@context") => {}
                Some("@type") => {
                    let types: Vec<&Value> = match value {
                        Value::Array(items) => items.iter().collect(),
                        single => vec![single],
                    };
                    for t in types {
                        let t = t
                            .as_str()
                            .ok_or_else(|| ParseError::JsonLd("@type must be a string".into()))?;
                        let object = self.id_term(&ctx.expand(t, true));
                        self.emit(subject.clone(), Term::uri(ns::RDF_TYPE), object, graph);
                    }
                }
                Some("@graph") => {
                    let inner = if has_id {
                        GraphName::Named(subject.clone())
                    } else {
                        graph.clone()
                    };
                    self.element(value, ctx, &inner)?;
                }
                Some(other) => {
                    tracing::debug!(keyword = other, "ignoring unsupported JSON-LD keyword");
                }
                None => {
                    let predicate = ctx.expand(key, true);
                    if predicate.starts_with("_:") || !predicate.contains(':') {
                        tracing::debug!(term = %key, "dropping property without an IRI mapping");
                        continue;
                    }
                    let def = ctx.terms.get(key);
                    let mut objects = Vec::new();
                    if def.map_or(false, |d| d.list) {
                        let items = match value {
                            Value::Array(items) => items.as_slice(),
                            single => std::slice::from_ref(single),
                        };
                        objects.push(self.list(items, def, ctx, graph)?);
                    } else {
                        self.values(value, def, ctx, graph, &mut objects)?;
                    }
                    for object in objects {
                        self.emit(subject.clone(), Term::uri(predicate.as_str()), object, graph);
                    }
                }
            }
        }

        Ok(subject)
    }

    fn values(
        &mut self,
        value: &Value,
        def: Option<&TermDef>,
        ctx: &Context,
        graph: &GraphName,
        out: &mut Vec<Term>,
    ) -> Result<(), ParseError> {
        let coercion = def.map(|d| &d.coercion).unwrap_or(&Coercion::None);
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    self.values(item, def, ctx, graph, out)?;
                }
            }
            Value::Bool(b) => out.push(Term::typed_literal(b.to_string(), ns::XSD_BOOLEAN)),
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    out.push(Term::typed_literal(n.to_string(), ns::XSD_INTEGER));
                } else {
                    let f = n.as_f64().unwrap_or_default();
                    out.push(Term::typed_literal(format!("{:E}", f), ns::XSD_DOUBLE));
                }
            }
            Value::String(s) => out.push(match coercion {
                Coercion::Id => self.id_term(&ctx.expand(s, false)),
                Coercion::Vocab => self.id_term(&ctx.expand(s, true)),
                Coercion::Datatype(dt) => Term::typed_literal(s.clone(), ctx.expand(dt, true)),
                Coercion::None => Term::literal(s.clone()),
            }),
            Value::Object(map) => {
                if let Some(v) = map.get("@value") {
                    out.push(self.value_object(v, map, ctx)?);
                } else if let Some(items) = map.get("@list") {
                    let items = match items {
                        Value::Array(items) => items.as_slice(),
                        single => std::slice::from_ref(single),
                    };
                    out.push(self.list(items, def, ctx, graph)?);
                } else if let Some(items) = map.get("@set") {
                    self.values(items, def, ctx, graph, out)?;
                } else {
                    out.push(self.node(map, ctx, graph)?);
                }
            }
        }
        Ok(())
    }

    fn value_object(&mut self, value: &Value, map: &Map<String, Value>, ctx: &Context) -> Result<Term, ParseError> {
        let lexical = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => return Err(ParseError::JsonLd(format!("invalid @value: {}", other))),
        };
        if let Some(dt) = map.get("@type").and_then(Value::as_str) {
            return Ok(Term::typed_literal(lexical, ctx.expand(dt, true)));
        }
        if let Some(lang) = map.get("@language").and_then(Value::as_str) {
            return Ok(Term::lang_literal(lexical, lang));
        }
        Ok(match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Term::typed_literal(lexical, ns::XSD_INTEGER),
            Value::Number(_) => Term::typed_literal(lexical, ns::XSD_DOUBLE),
            Value::Bool(_) => Term::typed_literal(lexical, ns::XSD_BOOLEAN),
            _ => Term::literal(lexical),
        })
    }

    /// Build an `rdf:first` / `rdf:rest` chain
    fn list(
        &mut self,
        items: &[Value],
        def: Option<&TermDef>,
        ctx: &Context,
        graph: &GraphName,
    ) -> Result<Term, ParseError> {
        let item_def = def.map(|d| TermDef { list: false, ..d.clone() });
        let mut head = Term::uri(ns::RDF_NIL);
        for item in items.iter().rev() {
            let mut values = Vec::new();
            self.values(item, item_def.as_ref(), ctx, graph, &mut values)?;
            for value in values.into_iter().rev() {
                let cell = Term::fresh_blank();
                self.emit(cell.clone(), Term::uri(ns::RDF_FIRST), value, graph);
                self.emit(cell.clone(), Term::uri(ns::RDF_REST), head, graph);
                head = cell;
            }
        }
        Ok(head)
    }
}

/// Parse a JSON-LD document into quads
pub fn parse(input: &str, base: Option<&str>) -> Result<Document, ParseError> {
    let json: Value = serde_json::from_str(input)?;
    let ctx = Context {
        base: base.map(str::to_string),
        ..Context::default()
    };

    let mut parser = JsonLdParser {
        store_quads: Vec::new(),
        blank_labels: FnvHashMap::default(),
    };
    parser.element(&json, &ctx, &GraphName::Default)?;

    let mut doc = Document {
        base: base.map(str::to_string),
        ..Document::default()
    };
    doc.store.extend_quads(parser.store_quads);
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activitystreams_notification() {
        let doc = parse(
            r#"{
                "@context": ["https://www.w3.org/ns/activitystreams", {"ex": "http://example.org/"}],
                "id": "urn:uuid:1",
                "type": ["Announce", "ex:Extra"],
                "actor": "https://alice.example/profile#me",
                "object": { "id": "https://alice.example/paper", "name": "A paper" },
                "ex:count": 3
            }"#,
            None,
        )
        .unwrap();
        let store = doc.store;
        let notification = Term::uri("urn:uuid:1");

        assert_eq!(
            store.objects_of(&notification, &Term::uri(ns::RDF_TYPE)),
            vec![
                Term::uri(format!("{}Announce", ns::AS)),
                Term::uri("http://example.org/Extra")
            ]
        );
        assert_eq!(
            store.objects_of(&notification, &Term::uri(format!("{}actor", ns::AS))),
            vec![Term::uri("https://alice.example/profile#me")]
        );
        assert_eq!(
            store.objects_of(&Term::uri("https://alice.example/paper"), &Term::uri(format!("{}name", ns::AS))),
            vec![Term::literal("A paper")]
        );
        assert_eq!(
            store.objects_of(&notification, &Term::uri("http://example.org/count")),
            vec![Term::integer(3)]
        );
    }

    #[test]
    fn test_named_graph_and_blank_labels() {
        let doc = parse(
            r#"{
                "@context": {"ex": "http://example.org/"},
                "@graph": [
                    {"@id": "_:a", "ex:knows": {"@id": "_:a"}},
                    {"@id": "ex:g", "@graph": [{"@id": "ex:s", "ex:p": {"@value": "v", "@language": "en"}}]}
                ]
            }"#,
            None,
        )
        .unwrap();
        let quads = doc.store.quads();
        assert_eq!(quads.len(), 2);
        assert_eq!(quads[0].subject(), quads[0].object());
        assert!(quads[0].graph.is_default());
        assert_eq!(quads[1].graph, GraphName::Named(Term::uri("http://example.org/g")));
        assert_eq!(quads[1].object(), &Term::lang_literal("v", "en"));
    }

    #[test]
    fn test_list_container() {
        let doc = parse(
            r#"{
                "@context": {"items": {"@id": "http://example.org/items", "@container": "@list"}},
                "@id": "http://example.org/s",
                "items": ["a", "b"]
            }"#,
            None,
        )
        .unwrap();
        // two cells with first/rest each, plus the link from the subject
        assert_eq!(doc.store.len(), 5);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse("{ nope", None), Err(ParseError::Json(_))));
    }
}
