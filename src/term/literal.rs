//! Literal values

use std::fmt;

use super::uri::ns;

/// How a literal's lexical form is qualified
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum Datatype {
    /// Simple literal (implicitly xsd:string)
    Plain,
    /// Language-tagged string
    Language(String),
    /// Literal with an explicit datatype IRI
    Typed(String),
}

/// An RDF literal value
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    value: String,
    datatype: Datatype,
}

impl Literal {
    pub fn plain(value: String) -> Self {
        Literal { value, datatype: Datatype::Plain }
    }

    /// Create a typed literal. `xsd:string` collapses to a simple literal.
    pub fn typed(value: String, datatype: String) -> Self {
        if datatype == format!("{}string", ns::XSD) {
            return Literal::plain(value);
        }
        Literal { value, datatype: Datatype::Typed(datatype) }
    }

    pub fn with_language(value: String, lang: String) -> Self {
        Literal {
            value,
            datatype: Datatype::Language(lang.to_lowercase()),
        }
    }

    pub fn integer(value: i64) -> Self {
        Literal::typed(value.to_string(), format!("{}integer", ns::XSD))
    }

    /// Lexical form
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    pub fn is_plain(&self) -> bool {
        matches!(self.datatype, Datatype::Plain)
    }

    pub fn language(&self) -> Option<&str> {
        match &self.datatype {
            Datatype::Language(lang) => Some(lang),
            _ => None,
        }
    }

    pub fn datatype_uri(&self) -> Option<&str> {
        match &self.datatype {
            Datatype::Typed(uri) => Some(uri),
            _ => None,
        }
    }

    /// Parse the lexical form as an integer, tolerating surrounding
    /// whitespace and a leading `+`.
    pub fn as_integer(&self) -> Option<i64> {
        let trimmed = self.value.trim();
        trimmed.strip_prefix('+').unwrap_or(trimmed).parse().ok()
    }

    pub fn as_float(&self) -> Option<f64> {
        self.value.trim().parse().ok()
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self.value.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

/// Escape a lexical form for use inside a double-quoted N3/N-Triples string
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = escape_string(&self.value);
        match &self.datatype {
            Datatype::Plain => write!(f, "\"{}\"", value),
            Datatype::Language(lang) => write!(f, "\"{}\"@{}", value, lang),
            Datatype::Typed(dt) => write!(f, "\"{}\"^^<{}>", value, dt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_literal() {
        let lit = Literal::plain("hello".into());
        assert_eq!(lit.value(), "hello");
        assert!(lit.is_plain());
        assert_eq!(format!("{}", lit), "\"hello\"");
    }

    #[test]
    fn test_display_escapes_quotes() {
        let lit = Literal::plain("say \"hi\"\n".into());
        assert_eq!(format!("{}", lit), "\"say \\\"hi\\\"\\n\"");
    }

    #[test]
    fn test_integer_parsing() {
        let lit = Literal::typed("42".into(), format!("{}integer", ns::XSD));
        assert_eq!(lit.as_integer(), Some(42));
        assert_eq!(Literal::plain(" +7 ".into()).as_integer(), Some(7));
        assert_eq!(Literal::plain("seven".into()).as_integer(), None);
    }

    #[test]
    fn test_xsd_string_is_plain() {
        let lit = Literal::typed("x".into(), format!("{}string", ns::XSD));
        assert!(lit.is_plain());
    }

    #[test]
    fn test_lang_literal() {
        let lit = Literal::with_language("hello".into(), "EN".into());
        assert_eq!(lit.language(), Some("en"));
        assert_eq!(format!("{}", lit), "\"hello\"@en");
    }
}
