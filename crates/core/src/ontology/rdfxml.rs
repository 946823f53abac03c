//! RDF/XML reader: node and property element striping over quick-xml events,
//! with a scoped namespace table and DOCTYPE entity expansion.

use super::triples::{resolve_iri, Term, Triple, RDF_NS, RDF_TYPE, XML_NS};
use crate::OntologyError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;

type ParseResult<T> = Result<T, OntologyError>;

pub fn parse_rdf_xml(input: &str) -> ParseResult<Vec<Triple>> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut parser = RdfXmlParser::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => parser.open(&element)?,
            Ok(Event::Empty(element)) => {
                parser.open(&element)?;
                parser.close();
            }
            Ok(Event::End(_)) => parser.close(),
            Ok(Event::Text(text)) => {
                let entities = &parser.entities;
                let value = text
                    .unescape_with(|entity| entities.get(entity).map(String::as_str))
                    .map_err(|error| OntologyError::RdfXml(error.to_string()))?
                    .into_owned();
                parser.text(&value);
            }
            Ok(Event::CData(data)) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                parser.text(&value);
            }
            Ok(Event::DocType(doctype)) => {
                parser.declare_entities(&String::from_utf8_lossy(&doctype))?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => {
                return Err(OntologyError::RdfXml(format!(
                    "at byte {}: {error}",
                    reader.buffer_position()
                )))
            }
        }
    }
    Ok(parser.triples)
}

#[derive(Debug)]
enum Frame {
    /// Outside any node, or directly inside `rdf:RDF`.
    Root,
    Node {
        subject: Term,
    },
    Property {
        subject: Term,
        predicate: String,
        datatype: Option<String>,
        text: String,
        object: Option<Term>,
        /// The statement was already emitted from attributes.
        complete: bool,
    },
    /// Content that is not interpreted (e.g. `rdf:parseType="Literal"`).
    Skipped,
}

#[derive(Debug)]
struct Scope {
    namespaces: Vec<(String, String)>,
    language: Option<String>,
    base: Option<String>,
}

#[derive(Default)]
struct RdfXmlParser {
    frames: Vec<Frame>,
    scopes: Vec<Scope>,
    entities: HashMap<String, String>,
    triples: Vec<Triple>,
    blank_counter: usize,
}

struct Attribute {
    name: String,
    value: String,
}

impl RdfXmlParser {
    fn declare_entities(&mut self, doctype: &str) -> ParseResult<()> {
        let pattern = Regex::new(r#"<!ENTITY\s+([A-Za-z_][\w.-]*)\s+["']([^"']*)["']\s*>"#)
            .map_err(|error| OntologyError::RdfXml(error.to_string()))?;
        for captures in pattern.captures_iter(doctype) {
            self.entities
                .insert(captures[1].to_string(), captures[2].to_string());
        }
        Ok(())
    }

    fn fresh_blank(&mut self) -> Term {
        self.blank_counter += 1;
        Term::Blank(format!("genid{}", self.blank_counter))
    }

    fn namespace(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NS);
        }
        self.scopes.iter().rev().find_map(|scope| {
            scope
                .namespaces
                .iter()
                .find(|(declared, _)| declared == prefix)
                .map(|(_, uri)| uri.as_str())
        })
    }

    fn language(&self) -> Option<String> {
        self.scopes.iter().rev().find_map(|scope| scope.language.clone())
    }

    fn base(&self) -> Option<String> {
        self.scopes.iter().rev().find_map(|scope| scope.base.clone())
    }

    /// Expands `prefix:local` (or the default namespace for unprefixed element names).
    fn expand(&self, qname: &str, is_element: bool) -> ParseResult<String> {
        match qname.split_once(':') {
            Some((prefix, local)) => match self.namespace(prefix) {
                Some(namespace) => Ok(format!("{namespace}{local}")),
                None => Err(OntologyError::RdfXml(format!("undeclared namespace prefix '{prefix}'"))),
            },
            None if is_element => match self.namespace("") {
                Some(namespace) => Ok(format!("{namespace}{qname}")),
                None => Err(OntologyError::RdfXml(format!("element '{qname}' has no namespace"))),
            },
            // Unqualified RDF attributes are accepted for older documents.
            None => Ok(format!("{RDF_NS}{qname}")),
        }
    }

    fn open(&mut self, element: &BytesStart) -> ParseResult<()> {
        let name = std::str::from_utf8(element.name().as_ref())
            .map_err(|error| OntologyError::RdfXml(error.to_string()))?
            .to_string();

        let mut scope = Scope {
            namespaces: Vec::new(),
            language: None,
            base: None,
        };
        let mut attributes = Vec::new();
        for attribute in element.attributes() {
            let attribute = attribute.map_err(|error| OntologyError::RdfXml(error.to_string()))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let entities = &self.entities;
            let value = attribute
                .unescape_value_with(|entity| entities.get(entity).map(String::as_str))
                .map_err(|error| OntologyError::RdfXml(error.to_string()))?
                .into_owned();

            if key == "xmlns" {
                scope.namespaces.push((String::new(), value));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                scope.namespaces.push((prefix.to_string(), value));
            } else if key == "xml:lang" {
                scope.language = Some(value);
            } else if key == "xml:base" {
                scope.base = Some(value);
            } else if !key.starts_with("xml") {
                attributes.push(Attribute { name: key, value });
            }
        }
        self.scopes.push(scope);

        let element_iri = self.expand(&name, true)?;
        let mut expanded = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            expanded.push(Attribute {
                name: self.expand(&attribute.name, false)?,
                value: attribute.value,
            });
        }

        let parent_subject = match self.frames.last() {
            Some(Frame::Node { subject }) => Some(subject.clone()),
            _ => None,
        };
        let inside_property = matches!(self.frames.last(), Some(Frame::Property { .. }));
        let skipped = matches!(self.frames.last(), Some(Frame::Skipped));

        let frame = if skipped {
            Frame::Skipped
        } else if let Some(subject) = parent_subject {
            self.property_element(subject, element_iri, &expanded)
        } else if inside_property {
            let node = self.node_element(&element_iri, &expanded);
            if let (Frame::Node { subject }, Some(Frame::Property { object, .. })) =
                (&node, self.frames.last_mut())
            {
                *object = Some(subject.clone());
            }
            node
        } else if element_iri == format!("{RDF_NS}RDF") {
            Frame::Root
        } else {
            self.node_element(&element_iri, &expanded)
        };
        self.frames.push(frame);
        Ok(())
    }

    fn node_element(&mut self, element_iri: &str, attributes: &[Attribute]) -> Frame {
        let base = self.base();
        let mut subject = None;
        for attribute in attributes {
            match attribute.name.strip_prefix(RDF_NS) {
                Some("about") => subject = Some(Term::Iri(resolve_iri(base.as_deref(), &attribute.value))),
                Some("ID") => {
                    subject = Some(Term::Iri(resolve_iri(base.as_deref(), &format!("#{}", attribute.value))))
                }
                Some("nodeID") => subject = Some(Term::Blank(attribute.value.clone())),
                _ => {}
            }
        }
        let subject = match subject {
            Some(subject) => subject,
            None => self.fresh_blank(),
        };

        if element_iri != format!("{RDF_NS}Description") {
            self.triples
                .push(Triple::new(subject.clone(), RDF_TYPE, Term::iri(element_iri)));
        }
        self.property_attributes(&subject, attributes);
        Frame::Node { subject }
    }

    /// Non-syntax attributes become statements about `subject`.
    fn property_attributes(&mut self, subject: &Term, attributes: &[Attribute]) {
        let language = self.language();
        for attribute in attributes {
            let syntax = attribute.name.strip_prefix(RDF_NS).is_some_and(|local| {
                matches!(
                    local,
                    "about" | "ID" | "nodeID" | "resource" | "datatype" | "parseType"
                )
            });
            if syntax {
                continue;
            }
            let object = if attribute.name == RDF_TYPE {
                Term::iri(attribute.value.clone())
            } else {
                Term::Literal {
                    value: attribute.value.clone(),
                    language: language.clone(),
                    datatype: None,
                }
            };
            self.triples
                .push(Triple::new(subject.clone(), attribute.name.clone(), object));
        }
    }

    fn property_element(&mut self, subject: Term, predicate: String, attributes: &[Attribute]) -> Frame {
        let base = self.base();
        let mut resource = None;
        let mut datatype = None;
        let mut parse_type = None;
        for attribute in attributes {
            match attribute.name.strip_prefix(RDF_NS) {
                Some("resource") => resource = Some(Term::Iri(resolve_iri(base.as_deref(), &attribute.value))),
                Some("nodeID") => resource = Some(Term::Blank(attribute.value.clone())),
                Some("datatype") => datatype = Some(attribute.value.clone()),
                Some("parseType") => parse_type = Some(attribute.value.clone()),
                _ => {}
            }
        }

        match parse_type.as_deref() {
            Some("Resource") => {
                let node = self.fresh_blank();
                self.triples.push(Triple::new(subject, predicate, node.clone()));
                return Frame::Node { subject: node };
            }
            Some(_) => return Frame::Skipped,
            None => {}
        }

        let has_property_attributes = attributes.iter().any(|attribute| {
            !attribute
                .name
                .strip_prefix(RDF_NS)
                .is_some_and(|local| matches!(local, "resource" | "nodeID" | "datatype" | "ID"))
        });
        if has_property_attributes && resource.is_none() {
            resource = Some(self.fresh_blank());
        }

        match resource {
            Some(object) => {
                self.property_attributes(&object, attributes);
                self.triples
                    .push(Triple::new(subject.clone(), predicate.clone(), object));
                Frame::Property {
                    subject,
                    predicate,
                    datatype,
                    text: String::new(),
                    object: None,
                    complete: true,
                }
            }
            None => Frame::Property {
                subject,
                predicate,
                datatype,
                text: String::new(),
                object: None,
                complete: false,
            },
        }
    }

    fn text(&mut self, value: &str) {
        if let Some(Frame::Property { text, .. }) = self.frames.last_mut() {
            text.push_str(value);
        }
    }

    fn close(&mut self) {
        let language = self.language();
        self.scopes.pop();
        let Some(frame) = self.frames.pop() else {
            return;
        };
        if let Frame::Property {
            subject,
            predicate,
            datatype,
            text,
            object,
            complete: false,
        } = frame
        {
            let object = object.unwrap_or_else(|| match datatype {
                Some(datatype) => Term::Literal {
                    value: text,
                    language: None,
                    datatype: Some(datatype),
                },
                None => Term::Literal {
                    value: text,
                    language,
                    datatype: None,
                },
            });
            self.triples.push(Triple::new(subject, predicate, object));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::triples::{SKOS_ALT_LABEL, SKOS_BROADER, SKOS_CONCEPT, SKOS_IN_SCHEME, SKOS_PREF_LABEL};

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE rdf:RDF [
  <!ENTITY voc "http://example.org/voc#">
]>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:skos="http://www.w3.org/2004/02/skos/core#"
         xml:lang="de">
  <skos:ConceptScheme rdf:about="&voc;scheme">
    <skos:prefLabel>Archiv</skos:prefLabel>
  </skos:ConceptScheme>
  <skos:Concept rdf:about="&voc;letters">
    <skos:prefLabel>Briefe</skos:prefLabel>
    <skos:altLabel xml:lang="en">Letters</skos:altLabel>
    <skos:inScheme rdf:resource="&voc;scheme"/>
  </skos:Concept>
  <rdf:Description rdf:about="&voc;postcards">
    <rdf:type rdf:resource="http://www.w3.org/2004/02/skos/core#Concept"/>
    <skos:prefLabel>Postkarten</skos:prefLabel>
    <skos:broader>
      <skos:Concept rdf:about="&voc;letters"/>
    </skos:broader>
  </rdf:Description>
</rdf:RDF>"#;

    fn find<'a>(triples: &'a [Triple], subject: &str, predicate: &str) -> Vec<&'a Term> {
        triples
            .iter()
            .filter(|t| t.subject == Term::iri(subject) && t.predicate == predicate)
            .map(|t| &t.object)
            .collect()
    }

    #[test]
    fn skos_document_yields_expected_statements() -> Result<(), OntologyError> {
        let triples = parse_rdf_xml(DOCUMENT)?;
        let letters = "http://example.org/voc#letters";
        let postcards = "http://example.org/voc#postcards";

        assert!(find(&triples, letters, RDF_TYPE).contains(&&Term::iri(SKOS_CONCEPT)));
        assert_eq!(
            find(&triples, letters, SKOS_PREF_LABEL),
            vec![&Term::Literal {
                value: "Briefe".into(),
                language: Some("de".into()),
                datatype: None,
            }]
        );
        let alt = find(&triples, letters, SKOS_ALT_LABEL);
        assert!(matches!(alt[0], Term::Literal { value, language: Some(lang), .. } if value == "Letters" && lang == "en"));
        assert_eq!(
            find(&triples, letters, SKOS_IN_SCHEME),
            vec![&Term::iri("http://example.org/voc#scheme")]
        );

        assert_eq!(find(&triples, postcards, RDF_TYPE), vec![&Term::iri(SKOS_CONCEPT)]);
        assert_eq!(find(&triples, postcards, SKOS_BROADER), vec![&Term::iri(letters)]);
        assert_eq!(find(&triples, postcards, SKOS_PREF_LABEL)[0].lexical(), "Postkarten");
        Ok(())
    }

    #[test]
    fn parse_type_resource_creates_blank_node() -> Result<(), OntologyError> {
        let triples = parse_rdf_xml(
            r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns:ex="http://ex.org/">
                 <rdf:Description rdf:about="http://ex.org/a" ex:title="Titel">
                   <ex:author rdf:parseType="Resource"><ex:name>Anna</ex:name></ex:author>
                 </rdf:Description>
               </rdf:RDF>"#,
        )?;
        assert_eq!(find(&triples, "http://ex.org/a", "http://ex.org/title")[0].lexical(), "Titel");
        let author = find(&triples, "http://ex.org/a", "http://ex.org/author");
        assert!(matches!(author[0], Term::Blank(_)));
        let name = triples
            .iter()
            .find(|t| &t.subject == author[0] && t.predicate == "http://ex.org/name")
            .map(|t| t.object.lexical());
        assert_eq!(name, Some("Anna"));
        Ok(())
    }

    #[test]
    fn undeclared_prefix_is_an_error() {
        let result = parse_rdf_xml(r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><foo:Bar/></rdf:RDF>"#);
        assert!(matches!(result, Err(OntologyError::RdfXml(_))));
    }
}
