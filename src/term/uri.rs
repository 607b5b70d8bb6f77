//! IRIs and the vocabularies the orchestrator speaks

use std::fmt;

/// An IRI reference (named node)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uri {
    value: String,
}

impl Uri {
    pub fn new(value: String) -> Self {
        Uri { value }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Everything up to and including the last `#` or `/`
    pub fn namespace(&self) -> &str {
        match self.split_point() {
            Some(pos) => &self.value[..=pos],
            None => &self.value,
        }
    }

    /// Fragment or last path segment
    pub fn local_name(&self) -> &str {
        match self.split_point() {
            Some(pos) => &self.value[pos + 1..],
            None => &self.value,
        }
    }

    fn split_point(&self) -> Option<usize> {
        self.value.rfind('#').or_else(|| self.value.rfind('/'))
    }

    /// True if the IRI carries a scheme (`urn:`, `http:` ...)
    pub fn is_absolute(&self) -> bool {
        has_scheme(&self.value)
    }

    /// Resolve a reference against this IRI as base
    pub fn resolve(&self, relative: &str) -> Uri {
        if relative.is_empty() {
            return self.clone();
        }
        if has_scheme(relative) {
            return Uri::new(relative.to_string());
        }

        if relative.starts_with('#') {
            let base = match self.value.find('#') {
                Some(pos) => &self.value[..pos],
                None => &self.value,
            };
            return Uri::new(format!("{}{}", base, relative));
        }

        let base = self
            .value
            .find(|c: char| c == '?' || c == '#')
            .map_or(self.value.as_str(), |pos| &self.value[..pos]);
        let (root, base_path) = match base.find("://") {
            Some(scheme_end) => {
                let authority_start = scheme_end + 3;
                let authority_end = base[authority_start..]
                    .find('/')
                    .map_or(base.len(), |p| authority_start + p);
                base.split_at(authority_end)
            }
            None if has_scheme(base) => base.split_at(base.find(':').map_or(0, |p| p + 1)),
            None => ("", base),
        };

        let merged = if relative.starts_with('/') {
            relative.to_string()
        } else {
            match base_path.rfind('/') {
                Some(pos) => format!("{}{}", &base_path[..=pos], relative),
                None if base.contains("://") => format!("/{}", relative),
                None => relative.to_string(),
            }
        };

        let (path, suffix) = merged.split_at(merged.find(|c: char| c == '?' || c == '#').unwrap_or(merged.len()));
        Uri::new(format!("{}{}{}", root, remove_dot_segments(path), suffix))
    }
}

/// RFC 3986 section 5.2.4
fn remove_dot_segments(path: &str) -> String {
    let absolute = path.starts_with('/');
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;
    let mut output: Vec<&str> = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "." => {}
            ".." => {
                if output.len() > 1 || (!absolute && !output.is_empty()) {
                    output.pop();
                }
            }
            other => output.push(other),
        }
        if i == last && matches!(*segment, "." | "..") {
            output.push("");
        }
    }
    output.join("/")
}

fn has_scheme(value: &str) -> bool {
    match value.find(':') {
        Some(0) | None => false,
        Some(pos) => {
            let scheme = &value[..pos];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
    }
}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.value)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.value)
    }
}

impl From<&str> for Uri {
    fn from(s: &str) -> Self {
        Uri::new(s.to_string())
    }
}

impl From<String> for Uri {
    fn from(s: String) -> Self {
        Uri::new(s)
    }
}

/// Well-known namespaces
pub mod ns {
    pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
    pub const LOG: &str = "http://www.w3.org/2000/10/swap/log#";
    pub const MATH: &str = "http://www.w3.org/2000/10/swap/math#";
    pub const STRING: &str = "http://www.w3.org/2000/10/swap/string#";

    /// Koreografeye policy vocabulary
    pub const POL: &str = "https://www.example.org/ns/policy#";
    /// Function Ontology
    pub const FNO: &str = "https://w3id.org/function/ontology#";
    pub const SH: &str = "http://www.w3.org/ns/shacl#";
    pub const AS: &str = "https://www.w3.org/ns/activitystreams#";
    pub const LDP: &str = "http://www.w3.org/ns/ldp#";

    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDF_FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
    pub const RDF_REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
    pub const RDF_NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
    pub const LOG_IMPLIES: &str = "http://www.w3.org/2000/10/swap/log#implies";

    pub const POL_POLICY: &str = "https://www.example.org/ns/policy#policy";
    pub const POL_MAIN_SUBJECT: &str = "https://www.example.org/ns/policy#mainSubject";
    pub const POL_ORIGIN: &str = "https://www.example.org/ns/policy#origin";
    pub const FNO_EXECUTION: &str = "https://w3id.org/function/ontology#Execution";
    pub const FNO_EXECUTES: &str = "https://w3id.org/function/ontology#executes";
    pub const SH_ORDER: &str = "http://www.w3.org/ns/shacl#order";

    pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
}
