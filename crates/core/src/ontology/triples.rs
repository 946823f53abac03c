//! Flat statement model shared by the graph readers.

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

pub const SKOS_NS: &str = "http://www.w3.org/2004/02/skos/core#";
pub const SKOS_CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#Concept";
pub const SKOS_CONCEPT_SCHEME: &str = "http://www.w3.org/2004/02/skos/core#ConceptScheme";
pub const SKOS_PREF_LABEL: &str = "http://www.w3.org/2004/02/skos/core#prefLabel";
pub const SKOS_ALT_LABEL: &str = "http://www.w3.org/2004/02/skos/core#altLabel";
pub const SKOS_BROADER: &str = "http://www.w3.org/2004/02/skos/core#broader";
pub const SKOS_NARROWER: &str = "http://www.w3.org/2004/02/skos/core#narrower";
pub const SKOS_IN_SCHEME: &str = "http://www.w3.org/2004/02/skos/core#inScheme";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        language: Option<String>,
        datatype: Option<String>,
    },
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: &str) -> Self {
        Term::Literal {
            value: value.into(),
            language: None,
            datatype: Some(datatype.to_string()),
        }
    }

    /// Node identity as used for concept uris; blank nodes keep a `_:` prefix.
    pub fn node_id(&self) -> Option<String> {
        match self {
            Term::Iri(iri) => Some(iri.clone()),
            Term::Blank(label) => Some(format!("_:{label}")),
            Term::Literal { .. } => None,
        }
    }

    /// Lexical form: the IRI, blank label or literal value.
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri(value) | Term::Blank(value) => value,
            Term::Literal { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }
}

/// Resolves `reference` against `base` for the simple cases found in ontology files:
/// absolute IRIs pass through, fragments and relative names are appended.
pub(crate) fn resolve_iri(base: Option<&str>, reference: &str) -> String {
    match base {
        Some(base) if !has_scheme(reference) => {
            if reference.starts_with('#') {
                let stem = base.split('#').next().unwrap_or(base);
                format!("{stem}{reference}")
            } else if reference.is_empty() {
                base.to_string()
            } else if base.ends_with('/') || base.ends_with('#') {
                format!("{base}{reference}")
            } else {
                match base.rfind('/') {
                    Some(index) => format!("{}{reference}", &base[..=index]),
                    None => format!("{base}{reference}"),
                }
            }
        }
        _ => reference.to_string(),
    }
}

fn has_scheme(reference: &str) -> bool {
    reference.split_once(':').is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}
