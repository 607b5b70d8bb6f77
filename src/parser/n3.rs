//! Notation3 / Turtle / N-Triples parser
//!
//! Handles the parts of N3 that reasoner input and output use: prefix and
//! base directives (both `@prefix` and SPARQL style), `a`, `;` and `,`
//! abbreviations, `[]` property lists, `()` collections, literals, quoted
//! formulas `{ }`, variables and the `=>` / `<=` implication shorthands.
//! Rules stay in the graph as `{..} log:implies {..}` triples; the rule
//! engine picks them up from there.

use std::sync::Arc;

use fnv::FnvHashMap;
use indexmap::IndexMap;
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, multispace1},
    combinator::{opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use super::{location, Document, ParseError};
use crate::store::Store;
use crate::term::{ns, BlankNode, FormulaRef, Literal, Term, Triple, Uri, Variable};

/// Whitespace and `#` comments
fn ws(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), preceded(char('#'), take_while(|c| c != '\n'))),
        ))),
    )(input)
}

pub(super) fn skip_ws(input: &str) -> &str {
    ws(input).map(|(rest, _)| rest).unwrap_or(input)
}

pub(super) fn iri_ref(input: &str) -> IResult<&str, &str> {
    delimited(
        char('<'),
        take_while(|c: char| c != '>' && c != '<' && c != '"' && !c.is_whitespace()),
        char('>'),
    )(input)
}

/// `prefix:local`. A trailing `.` terminates the statement, not the name.
fn prefixed_name(input: &str) -> IResult<&str, (&str, &str)> {
    let (rest, prefix) =
        take_while(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))(input)?;
    let (rest, _) = char(':')(rest)?;
    let (_, local) =
        take_while(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '%'))(rest)?;
    let local = local.trim_end_matches('.');
    Ok((&rest[local.len()..], (prefix, local)))
}

fn variable(input: &str) -> IResult<&str, &str> {
    preceded(char('?'), take_while1(|c: char| c.is_alphanumeric() || c == '_'))(input)
}

pub(super) fn blank_label(input: &str) -> IResult<&str, &str> {
    let (rest, _) = nom::bytes::complete::tag("_:")(input)?;
    let (_, label) =
        take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))(rest)?;
    let label = label.trim_end_matches('.');
    if label.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TakeWhile1,
        )));
    }
    Ok((&rest[label.len()..], label))
}

fn numeric_literal(input: &str) -> IResult<&str, Literal> {
    let (rest, text) = recognize(tuple((
        opt(alt((char('+'), char('-')))),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit1)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((
            alt((char('e'), char('E'))),
            opt(alt((char('+'), char('-')))),
            digit1,
        ))),
    )))(input)?;

    let datatype = if text.contains(['e', 'E']) {
        ns::XSD_DOUBLE
    } else if text.contains('.') {
        ns::XSD_DECIMAL
    } else {
        ns::XSD_INTEGER
    };
    Ok((rest, Literal::typed(text.to_string(), datatype.to_string())))
}

fn fail(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Escaped))
}

/// Quoted string in any of the four N3 forms, with escapes decoded
pub(super) fn string_literal(input: &str) -> IResult<&str, String> {
    let quote = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find(|q| input.starts_with(q))
        .ok_or_else(|| fail(input))?;
    let long = quote.len() == 3;
    let body = &input[quote.len()..];

    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        if body[i..].starts_with(quote) {
            return Ok((&body[i + quote.len()..], out));
        }
        match c {
            '\\' => {
                let (_, escaped) = chars.next().ok_or_else(|| fail(input))?;
                match escaped {
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'u' | 'U' => {
                        let width = if escaped == 'u' { 4 } else { 8 };
                        let hex: String = chars.by_ref().take(width).map(|(_, h)| h).collect();
                        let decoded = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| fail(input))?;
                        out.push(decoded);
                    }
                    other => out.push(other),
                }
            }
            '\n' | '\r' if !long => return Err(fail(input)),
            c => out.push(c),
        }
    }
    Err(fail(input))
}

fn starts_with_keyword(input: &str, keyword: &str) -> bool {
    input
        .get(..keyword.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(keyword))
        && input[keyword.len()..].starts_with(char::is_whitespace)
}

/// Prefixes and base in effect while parsing
#[derive(Debug, Clone, Default)]
pub struct ParserState {
    prefixes: IndexMap<String, String>,
    base: Option<Uri>,
}

impl ParserState {
    pub fn add_prefix(&mut self, prefix: &str, namespace: &str) {
        let namespace = self.resolve_relative(namespace);
        self.prefixes
            .insert(prefix.to_string(), namespace.as_str().to_string());
    }

    /// Declared prefixes win; a few well-known ones resolve without a declaration
    pub fn resolve_prefix(&self, prefix: &str, local: &str) -> Option<Uri> {
        let namespace = match self.prefixes.get(prefix) {
            Some(ns) => ns.as_str(),
            None => well_known_prefix(prefix)?,
        };
        Some(Uri::new(format!("{}{}", namespace, local)))
    }

    pub fn resolve_relative(&self, relative: &str) -> Uri {
        match &self.base {
            Some(base) => base.resolve(relative),
            None => Uri::new(relative.to_string()),
        }
    }

    pub fn prefixes(&self) -> &IndexMap<String, String> {
        &self.prefixes
    }
}

fn well_known_prefix(prefix: &str) -> Option<&'static str> {
    match prefix {
        "rdf" => Some(ns::RDF),
        "rdfs" => Some(ns::RDFS),
        "xsd" => Some(ns::XSD),
        "log" => Some(ns::LOG),
        "math" => Some(ns::MATH),
        "string" => Some(ns::STRING),
        _ => None,
    }
}

/// One-shot parser over a single N3 document
pub struct N3Parser<'s> {
    source: &'s str,
    state: ParserState,
    triples: Vec<Triple>,
    blank_labels: FnvHashMap<String, BlankNode>,
    next_formula_id: u64,
}

impl<'s> N3Parser<'s> {
    pub fn new(source: &'s str) -> Self {
        N3Parser {
            source,
            state: ParserState::default(),
            triples: Vec::new(),
            blank_labels: FnvHashMap::default(),
            next_formula_id: 0,
        }
    }

    pub fn with_base(source: &'s str, base: &str) -> Self {
        let mut parser = Self::new(source);
        parser.state.base = Some(Uri::new(base.to_string()));
        parser
    }

    /// Parse the whole document
    pub fn parse(mut self) -> Result<Document, ParseError> {
        let mut remaining = self.source;
        loop {
            remaining = skip_ws(remaining);
            if remaining.is_empty() {
                break;
            }
            remaining = if remaining.starts_with('@') {
                self.directive(remaining)?
            } else if starts_with_keyword(remaining, "PREFIX") || starts_with_keyword(remaining, "BASE") {
                self.sparql_directive(remaining)?
            } else {
                self.statement(remaining, false)?
            };
        }

        let mut store = Store::new();
        store.add_all(self.triples);
        Ok(Document {
            store,
            prefixes: self.state.prefixes,
            base: self.state.base.map(|b| b.as_str().to_string()),
        })
    }

    fn syntax(&self, at: &str, message: impl Into<String>) -> ParseError {
        let (line, column) = location(self.source, at);
        ParseError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    fn expect<'a>(&self, input: &'a str, c: char, what: &str) -> Result<&'a str, ParseError> {
        let input = skip_ws(input);
        input
            .strip_prefix(c)
            .ok_or_else(|| self.syntax(input, format!("expected '{}' {}", c, what)))
    }

    fn directive<'a>(&mut self, input: &'a str) -> Result<&'a str, ParseError> {
        if let Some(rest) = input.strip_prefix("@prefix") {
            let rest = self.prefix_body(rest)?;
            self.expect(rest, '.', "after @prefix")
        } else if let Some(rest) = input.strip_prefix("@base") {
            let rest = self.base_body(rest)?;
            self.expect(rest, '.', "after @base")
        } else if input.starts_with("@forAll") || input.starts_with("@forSome") || input.starts_with("@keywords") {
            // quantifier and keyword declarations carry no triples
            match input.find('.') {
                Some(end) => Ok(&input[end + 1..]),
                None => Err(self.syntax(input, "unterminated directive")),
            }
        } else {
            Err(self.syntax(input, "unknown directive"))
        }
    }

    fn sparql_directive<'a>(&mut self, input: &'a str) -> Result<&'a str, ParseError> {
        if starts_with_keyword(input, "PREFIX") {
            self.prefix_body(&input[6..])
        } else {
            self.base_body(&input[4..])
        }
    }

    fn prefix_body<'a>(&mut self, input: &'a str) -> Result<&'a str, ParseError> {
        let input = skip_ws(input);
        let (rest, prefix) = take_while::<_, &str, nom::error::Error<&str>>(|c: char| {
            c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
        })(input)
        .map_err(|_| self.syntax(input, "expected prefix name"))?;
        let rest = self.expect(rest, ':', "after prefix name")?;
        let rest = skip_ws(rest);
        let (rest, namespace) = iri_ref(rest).map_err(|_| self.syntax(rest, "expected namespace IRI"))?;
        self.state.add_prefix(prefix, namespace);
        Ok(rest)
    }

    fn base_body<'a>(&mut self, input: &'a str) -> Result<&'a str, ParseError> {
        let input = skip_ws(input);
        let (rest, base) = iri_ref(input).map_err(|_| self.syntax(input, "expected base IRI"))?;
        self.state.base = Some(self.state.resolve_relative(base));
        Ok(rest)
    }

    /// `subject predicateObjectList .` (the dot is optional before `}`)
    fn statement<'a>(&mut self, input: &'a str, in_formula: bool) -> Result<&'a str, ParseError> {
        let (rest, subject) = self.term(input)?;
        let rest = skip_ws(rest);

        let bare_property_list = input.starts_with('[') && (rest.starts_with('.') || rest.starts_with('}'));
        let rest = if bare_property_list {
            rest
        } else {
            self.predicate_object_list(rest, &subject)?
        };

        let rest = skip_ws(rest);
        if let Some(after) = rest.strip_prefix('.') {
            Ok(after)
        } else if in_formula && rest.starts_with('}') {
            Ok(rest)
        } else {
            Err(self.syntax(rest, "expected '.' at end of statement"))
        }
    }

    fn predicate_object_list<'a>(&mut self, input: &'a str, subject: &Term) -> Result<&'a str, ParseError> {
        let mut remaining = input;
        loop {
            let (rest, predicate, inverse) = self.verb(skip_ws(remaining))?;
            let rest = self.object_list(skip_ws(rest), subject, &predicate, inverse)?;
            let mut rest = skip_ws(rest);

            if !rest.starts_with(';') {
                return Ok(rest);
            }
            while let Some(after) = rest.strip_prefix(';') {
                rest = skip_ws(after);
            }
            if rest.is_empty() || rest.starts_with(['.', ']', '}']) {
                return Ok(rest);
            }
            remaining = rest;
        }
    }

    fn object_list<'a>(
        &mut self,
        input: &'a str,
        subject: &Term,
        predicate: &Term,
        inverse: bool,
    ) -> Result<&'a str, ParseError> {
        let mut remaining = input;
        loop {
            let (rest, object) = self.term(remaining)?;
            let triple = if inverse {
                Triple::new(object, predicate.clone(), subject.clone())
            } else {
                Triple::new(subject.clone(), predicate.clone(), object)
            };
            self.triples.push(triple);

            let rest = skip_ws(rest);
            match rest.strip_prefix(',') {
                Some(after) => remaining = skip_ws(after),
                None => return Ok(rest),
            }
        }
    }

    /// Predicate position, returning whether subject and object swap
    fn verb<'a>(&mut self, input: &'a str) -> Result<(&'a str, Term, bool), ParseError> {
        if let Some(rest) = input.strip_prefix('a') {
            if rest.starts_with(|c: char| c.is_whitespace() || matches!(c, '<' | '[' | '(' | '_' | '?' | '{')) {
                return Ok((rest, Term::uri(ns::RDF_TYPE), false));
            }
        }
        if let Some(rest) = input.strip_prefix("=>") {
            return Ok((rest, Term::uri(ns::LOG_IMPLIES), false));
        }
        if let Some(rest) = input.strip_prefix("<=") {
            return Ok((rest, Term::uri(ns::LOG_IMPLIES), true));
        }
        if let Some(rest) = input.strip_prefix('=') {
            return Ok((rest, Term::uri("http://www.w3.org/2002/07/owl#sameAs"), false));
        }
        let (rest, term) = self.term(input)?;
        Ok((rest, term, false))
    }

    fn term<'a>(&mut self, input: &'a str) -> Result<(&'a str, Term), ParseError> {
        let input = skip_ws(input);

        if input.starts_with('{') {
            return self.formula(input);
        }
        if input.starts_with('[') {
            return self.blank_property_list(input);
        }
        if input.starts_with('(') {
            return self.collection(input);
        }
        if input.starts_with('"') || input.starts_with('\'') {
            return self.literal(input);
        }
        if let Ok((rest, iri)) = iri_ref(input) {
            return Ok((rest, Term::Uri(Arc::new(self.state.resolve_relative(iri)))));
        }
        if let Ok((rest, name)) = variable(input) {
            return Ok((rest, Term::Variable(Variable::new(name))));
        }
        if let Ok((rest, label)) = blank_label(input) {
            let node = self
                .blank_labels
                .entry(label.to_string())
                .or_insert_with(|| BlankNode::labeled(label))
                .clone();
            return Ok((rest, Term::BlankNode(node)));
        }
        if input.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.')) {
            if let Ok((rest, lit)) = numeric_literal(input) {
                return Ok((rest, Term::Literal(Arc::new(lit))));
            }
        }
        for word in ["true", "false"] {
            if let Some(rest) = input.strip_prefix(word) {
                if !rest.starts_with(|c: char| c.is_alphanumeric() || matches!(c, ':' | '_' | '-')) {
                    return Ok((rest, Term::typed_literal(word, ns::XSD_BOOLEAN)));
                }
            }
        }
        if let Ok((rest, (prefix, local))) = prefixed_name(input) {
            let uri = self.state.resolve_prefix(prefix, local).ok_or_else(|| {
                let (line, _) = location(self.source, input);
                ParseError::UndefinedPrefix {
                    prefix: prefix.to_string(),
                    line,
                }
            })?;
            return Ok((rest, Term::Uri(Arc::new(uri))));
        }

        let preview: String = input.chars().take(20).collect();
        Err(self.syntax(input, format!("cannot parse term starting with '{}'", preview)))
    }

    fn formula<'a>(&mut self, input: &'a str) -> Result<(&'a str, Term), ParseError> {
        let mut remaining = self.expect(input, '{', "to open formula")?;
        let outer = std::mem::take(&mut self.triples);
        let id = self.next_formula_id;
        self.next_formula_id += 1;

        loop {
            remaining = skip_ws(remaining);
            if let Some(rest) = remaining.strip_prefix('}') {
                remaining = rest;
                break;
            }
            if remaining.is_empty() {
                self.triples = outer;
                return Err(self.syntax(remaining, "unterminated formula"));
            }
            remaining = self.statement(remaining, true)?;
        }

        let inner = std::mem::replace(&mut self.triples, outer);
        Ok((remaining, Term::Formula(FormulaRef::new(id, inner))))
    }

    fn blank_property_list<'a>(&mut self, input: &'a str) -> Result<(&'a str, Term), ParseError> {
        let rest = skip_ws(self.expect(input, '[', "to open property list")?);
        let blank = Term::fresh_blank();
        if let Some(rest) = rest.strip_prefix(']') {
            return Ok((rest, blank));
        }
        let rest = self.predicate_object_list(rest, &blank)?;
        let rest = self.expect(rest, ']', "to close property list")?;
        Ok((rest, blank))
    }

    fn collection<'a>(&mut self, input: &'a str) -> Result<(&'a str, Term), ParseError> {
        let mut remaining = self.expect(input, '(', "to open collection")?;
        let mut items = Vec::new();
        loop {
            remaining = skip_ws(remaining);
            if let Some(rest) = remaining.strip_prefix(')') {
                return Ok((rest, Term::list(items)));
            }
            if remaining.is_empty() {
                return Err(self.syntax(remaining, "unterminated collection"));
            }
            let (rest, item) = self.term(remaining)?;
            items.push(item);
            remaining = rest;
        }
    }

    fn literal<'a>(&mut self, input: &'a str) -> Result<(&'a str, Term), ParseError> {
        let (rest, lexical) = string_literal(input).map_err(|_| self.syntax(input, "invalid string literal"))?;

        if let Some(after) = rest.strip_prefix('@') {
            let (after, lang) = take_while1::<_, &str, nom::error::Error<&str>>(|c: char| {
                c.is_alphanumeric() || c == '-'
            })(after)
            .map_err(|_| self.syntax(after, "invalid language tag"))?;
            return Ok((after, Term::lang_literal(lexical, lang)));
        }

        if let Some(after) = rest.strip_prefix("^^") {
            if let Ok((after, dt)) = iri_ref(after) {
                let dt = self.state.resolve_relative(dt);
                return Ok((after, Term::typed_literal(lexical, dt.as_str())));
            }
            if let Ok((after, (prefix, local))) = prefixed_name(after) {
                let dt = self.state.resolve_prefix(prefix, local).ok_or_else(|| {
                    ParseError::UndefinedPrefix {
                        prefix: prefix.to_string(),
                        line: location(self.source, after).0,
                    }
                })?;
                return Ok((after, Term::typed_literal(lexical, dt.as_str())));
            }
            return Err(self.syntax(after, "expected datatype IRI"));
        }

        Ok((rest, Term::literal(lexical)))
    }
}
