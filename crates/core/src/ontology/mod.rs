pub mod rdfxml;
pub mod taxonomy;
pub mod triples;
pub mod turtle;

use crate::{ConceptMatch, MatchType, OntologyError};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use triples::{
    Term, Triple, RDF_TYPE, SKOS_ALT_LABEL, SKOS_BROADER, SKOS_CONCEPT, SKOS_CONCEPT_SCHEME,
    SKOS_IN_SCHEME, SKOS_NARROWER, SKOS_PREF_LABEL,
};

pub use rdfxml::parse_rdf_xml;
pub use taxonomy::{add_taxonomy, Taxonomy, TaxonomyNode};
pub use turtle::parse_turtle;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Concept {
    pub uri: String,
    /// May be empty when the source declares no preferred label.
    pub label: String,
    pub aliases: Vec<String>,
    pub broader: Vec<String>,
    pub narrower: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ConceptScheme {
    pub uri: String,
    pub label: Option<String>,
    pub concepts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConceptRef {
    pub uri: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConceptHierarchy {
    pub uri: String,
    pub label: String,
    pub broader: Vec<ConceptRef>,
    pub narrower: Vec<ConceptRef>,
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|existing| existing == value) {
        values.push(value.to_string());
    }
}

/// Facet over one concept scheme: the record field plus its selectable concepts.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SchemeFacet {
    pub field: String,
    pub values: Vec<ConceptRef>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportedConcept {
    pub uri: String,
    pub label: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TaxonomyRelations {
    pub broader: BTreeMap<String, Vec<String>>,
    pub narrower: BTreeMap<String, Vec<String>>,
}

/// Flat JSON view of every loaded concept, for browsing clients.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TaxonomyExport {
    pub concepts: Vec<ExportedConcept>,
    pub relations: TaxonomyRelations,
}

/// Mutable collection phase of a [`ConceptIndex`].
#[derive(Debug, Default)]
pub struct ConceptIndexBuilder {
    concepts: BTreeMap<String, Concept>,
    schemes: BTreeMap<String, ConceptScheme>,
}

impl ConceptIndexBuilder {
    pub fn concept_mut(&mut self, uri: &str) -> &mut Concept {
        self.concepts
            .entry(uri.to_string())
            .or_insert_with(|| Concept {
                uri: uri.to_string(),
                ..Concept::default()
            })
    }

    pub fn scheme_mut(&mut self, uri: &str) -> &mut ConceptScheme {
        self.schemes
            .entry(uri.to_string())
            .or_insert_with(|| ConceptScheme {
                uri: uri.to_string(),
                ..ConceptScheme::default()
            })
    }

    pub fn add_scheme_member(&mut self, scheme: &str, concept: &str) {
        push_unique(&mut self.scheme_mut(scheme).concepts, concept);
    }

    /// Records `child` as narrower than `parent`, in both directions.
    pub fn link(&mut self, parent: &str, child: &str) {
        push_unique(&mut self.concept_mut(child).broader, parent);
        push_unique(&mut self.concept_mut(parent).narrower, child);
    }

    /// Collects SKOS concepts and schemes from parsed statements. Relations are
    /// taken as stated; an asserted `broader` does not imply the inverse.
    pub fn add_graph(&mut self, triples: &[Triple]) {
        let mut concepts = HashSet::new();
        let mut schemes = HashSet::new();
        for triple in triples.iter().filter(|t| t.predicate == RDF_TYPE) {
            let (Some(subject), Term::Iri(class)) = (triple.subject.node_id(), &triple.object) else {
                continue;
            };
            if class == SKOS_CONCEPT {
                concepts.insert(subject);
            } else if class == SKOS_CONCEPT_SCHEME {
                schemes.insert(subject);
            }
        }

        for uri in &concepts {
            self.concept_mut(uri);
        }
        for uri in &schemes {
            self.scheme_mut(uri);
        }

        for triple in triples {
            let Some(subject) = triple.subject.node_id() else {
                continue;
            };
            let value = triple
                .object
                .node_id()
                .unwrap_or_else(|| triple.object.lexical().to_string());

            if triple.predicate == SKOS_IN_SCHEME && schemes.contains(&value) {
                self.add_scheme_member(&value, &subject);
            }

            if concepts.contains(&subject) {
                let concept = self.concept_mut(&subject);
                match triple.predicate.as_str() {
                    SKOS_PREF_LABEL => concept.label = value,
                    SKOS_ALT_LABEL => push_unique(&mut concept.aliases, &value),
                    SKOS_BROADER => push_unique(&mut concept.broader, &value),
                    SKOS_NARROWER => push_unique(&mut concept.narrower, &value),
                    SKOS_IN_SCHEME => {
                        concept.scheme.get_or_insert(value);
                    }
                    _ => {}
                }
            } else if schemes.contains(&subject) && triple.predicate == SKOS_PREF_LABEL {
                self.scheme_mut(&subject).label = Some(value);
            }
        }
    }

    /// Parses one ontology file by extension (`rdf`/`xml`, `ttl`, `json`) and adds it.
    /// Nothing is added when the file fails to parse.
    pub fn load_file(&mut self, path: &Path) -> Result<(), OntologyError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let raw = std::fs::read_to_string(path).map_err(|source| OntologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match extension.as_str() {
            "rdf" | "xml" => {
                let triples = parse_rdf_xml(&raw)?;
                self.add_graph(&triples);
            }
            "ttl" => {
                let triples = parse_turtle(&raw)?;
                self.add_graph(&triples);
            }
            "json" => {
                let taxonomy: Taxonomy = serde_json::from_str(&raw)?;
                let name = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("taxonomy");
                add_taxonomy(self, name, &taxonomy);
            }
            other => return Err(OntologyError::UnsupportedFormat(other.to_string())),
        }
        Ok(())
    }

    pub fn build(self) -> ConceptIndex {
        let entries = self
            .concepts
            .into_iter()
            .map(|(uri, concept)| {
                let label_key = Some(concept.label.to_lowercase()).filter(|key| !key.trim().is_empty());
                let alias_keys = concept
                    .aliases
                    .iter()
                    .filter_map(|alias| {
                        let key = alias.to_lowercase();
                        (!key.trim().is_empty()).then(|| (key, alias.clone()))
                    })
                    .collect();
                (
                    uri,
                    Entry {
                        concept,
                        label_key,
                        alias_keys,
                    },
                )
            })
            .collect();

        ConceptIndex {
            entries,
            schemes: self.schemes,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    concept: Concept,
    /// Lowercased label; `None` for an empty label.
    label_key: Option<String>,
    /// Lowercased alias paired with its original spelling.
    alias_keys: Vec<(String, String)>,
}

/// Read-only concept lookup built once from all ontology sources.
#[derive(Debug, Clone, Default)]
pub struct ConceptIndex {
    entries: BTreeMap<String, Entry>,
    schemes: BTreeMap<String, ConceptScheme>,
}

impl ConceptIndex {
    pub fn builder() -> ConceptIndexBuilder {
        ConceptIndexBuilder::default()
    }

    /// Loads `*.rdf`, then `*.ttl`, then `*.json` from `dir` (file names in
    /// order within each group). Unreadable files are logged and skipped; a
    /// missing directory yields an empty index.
    pub fn load_dir(dir: &Path) -> Result<Self, OntologyError> {
        let mut builder = ConceptIndexBuilder::default();
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "ontology directory not found; no concepts loaded");
            return Ok(builder.build());
        }

        let entries = std::fs::read_dir(dir).map_err(|source| OntologyError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        for extension in ["rdf", "ttl", "json"] {
            for path in files.iter().filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
            }) {
                match builder.load_file(path) {
                    Ok(()) => tracing::info!(path = %path.display(), "ontology loaded"),
                    Err(error) => {
                        tracing::error!(path = %path.display(), %error, "failed to load ontology")
                    }
                }
            }
        }

        let index = builder.build();
        tracing::info!(
            concepts = index.len(),
            schemes = index.schemes.len(),
            "concept index ready"
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn concept(&self, uri: &str) -> Option<&Concept> {
        self.entries.get(uri).map(|entry| &entry.concept)
    }

    pub fn all_concepts(&self) -> impl Iterator<Item = &Concept> {
        self.entries.values().map(|entry| &entry.concept)
    }

    pub fn schemes(&self) -> impl Iterator<Item = &ConceptScheme> {
        self.schemes.values()
    }

    /// Case-insensitive containment of labels (confidence 1.0) and aliases
    /// (0.9). At most one match per uri, carrying the highest confidence seen.
    pub fn find_concepts(&self, text: &str) -> Vec<ConceptMatch> {
        let haystack = text.to_lowercase();
        let mut matches: Vec<ConceptMatch> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        let mut record = |entry: &Entry, match_type: MatchType, display: &str| {
            let confidence = match_type.confidence();
            match positions.get(&entry.concept.uri) {
                Some(&position) => {
                    let existing = &mut matches[position];
                    if confidence > existing.confidence {
                        existing.confidence = confidence;
                        existing.match_type = match_type;
                    }
                }
                None => {
                    positions.insert(entry.concept.uri.clone(), matches.len());
                    matches.push(ConceptMatch {
                        uri: entry.concept.uri.clone(),
                        label: display.to_string(),
                        match_type,
                        confidence,
                        scheme: entry.concept.scheme.clone(),
                    });
                }
            }
        };

        for entry in self.entries.values() {
            if let Some(key) = &entry.label_key {
                if haystack.contains(key.as_str()) {
                    record(entry, MatchType::Exact, &entry.concept.label);
                }
            }
        }

        for entry in self.entries.values() {
            let hit = entry
                .alias_keys
                .iter()
                .find(|(key, _)| haystack.contains(key.as_str()));
            if let Some((_, alias)) = hit {
                let display = if entry.concept.label.is_empty() {
                    alias.as_str()
                } else {
                    entry.concept.label.as_str()
                };
                record(entry, MatchType::Alias, display);
            }
        }

        matches
    }

    /// `uri` followed by its direct broader and/or narrower uris. One hop only.
    pub fn expand_query(&self, uri: &str, include_broader: bool, include_narrower: bool) -> Vec<String> {
        let mut expanded = vec![uri.to_string()];
        if let Some(concept) = self.concept(uri) {
            if include_broader {
                expanded.extend(concept.broader.iter().cloned());
            }
            if include_narrower {
                expanded.extend(concept.narrower.iter().cloned());
            }
        }
        expanded
    }

    /// Labelled one-hop neighbourhood. Unknown uris get empty labels.
    pub fn hierarchy(&self, uri: &str) -> ConceptHierarchy {
        let label_of = |uri: &str| {
            self.concept(uri)
                .map(|concept| concept.label.clone())
                .unwrap_or_default()
        };
        let refs = |uris: &[String]| {
            uris.iter()
                .map(|uri| ConceptRef {
                    uri: uri.clone(),
                    label: label_of(uri),
                })
                .collect()
        };

        match self.concept(uri) {
            Some(concept) => ConceptHierarchy {
                uri: uri.to_string(),
                label: concept.label.clone(),
                broader: refs(&concept.broader),
                narrower: refs(&concept.narrower),
            },
            None => ConceptHierarchy {
                uri: uri.to_string(),
                label: String::new(),
                broader: Vec::new(),
                narrower: Vec::new(),
            },
        }
    }

    /// One facet per scheme, keyed by scheme label (`Unknown` without one).
    /// Concepts without a label are listed under their uri.
    pub fn facet_config(&self) -> BTreeMap<String, SchemeFacet> {
        self.schemes
            .values()
            .map(|scheme| {
                let label = scheme.label.clone().unwrap_or_else(|| "Unknown".to_string());
                let values = scheme
                    .concepts
                    .iter()
                    .map(|uri| ConceptRef {
                        uri: uri.clone(),
                        label: self
                            .concept(uri)
                            .map(|concept| concept.label.clone())
                            .filter(|label| !label.is_empty())
                            .unwrap_or_else(|| uri.clone()),
                    })
                    .collect();
                let facet = SchemeFacet {
                    field: format!("concepts.{}", label.to_lowercase().replace(' ', "_")),
                    values,
                };
                (label, facet)
            })
            .collect()
    }

    pub fn taxonomy_export(&self) -> TaxonomyExport {
        let mut export = TaxonomyExport::default();
        for concept in self.all_concepts() {
            export.concepts.push(ExportedConcept {
                uri: concept.uri.clone(),
                label: concept.label.clone(),
                alternatives: concept
                    .aliases
                    .iter()
                    .filter(|alias| !alias.trim().is_empty())
                    .cloned()
                    .collect(),
            });
            if !concept.broader.is_empty() {
                export
                    .relations
                    .broader
                    .insert(concept.uri.clone(), concept.broader.clone());
            }
            if !concept.narrower.is_empty() {
                export
                    .relations
                    .narrower
                    .insert(concept.uri.clone(), concept.narrower.clone());
            }
        }
        export
    }

    /// Writes [`Self::taxonomy_export`] as pretty-printed JSON.
    pub fn save_taxonomy_json(&self, path: &Path) -> Result<(), OntologyError> {
        let json = serde_json::to_string_pretty(&self.taxonomy_export())?;
        std::fs::write(path, json).map_err(|source| OntologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), concepts = self.len(), "taxonomy exported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DOCUMENT_TYPES: &str = r#"{
        "id": "document_types",
        "label": "Dokumenttypen",
        "children": [
            {
                "id": "contracts",
                "label": "Verträge",
                "aliases": ["Vertrag", "Contract", ""],
                "children": [
                    {"id": "rental_contract", "label": "Mietvertrag"}
                ]
            },
            {"id": "invoices", "label": "Rechnungen", "aliases": ["Rechnung"]},
            {"id": "placeholder", "label": ""}
        ]
    }"#;

    fn taxonomy_index() -> Result<ConceptIndex, serde_json::Error> {
        let taxonomy: Taxonomy = serde_json::from_str(DOCUMENT_TYPES)?;
        let mut builder = ConceptIndex::builder();
        add_taxonomy(&mut builder, "document_types", &taxonomy);
        Ok(builder.build())
    }

    #[test]
    fn alias_hit_reports_primary_label() -> Result<(), serde_json::Error> {
        let index = taxonomy_index()?;
        let matches = index.find_concepts("Der Vertrag ist gültig");

        assert_eq!(matches.len(), 1);
        let hit = &matches[0];
        assert_eq!(hit.uri, "urn:document_types:contracts");
        assert_eq!(hit.label, "Verträge");
        assert_eq!(hit.match_type, MatchType::Alias);
        assert!((hit.confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(hit.scheme.as_deref(), Some("urn:document_types"));
        Ok(())
    }

    #[test]
    fn exact_label_beats_alias_and_uris_are_unique() -> Result<(), serde_json::Error> {
        let index = taxonomy_index()?;
        let matches = index.find_concepts("MIETVERTRAG und Verträge, eine RECHNUNG");

        let mut uris: Vec<&str> = matches.iter().map(|m| m.uri.as_str()).collect();
        let total = uris.len();
        uris.sort_unstable();
        uris.dedup();
        assert_eq!(uris.len(), total);

        let contracts = matches
            .iter()
            .find(|m| m.uri == "urn:document_types:contracts")
            .map(|m| (m.match_type, m.confidence));
        assert_eq!(contracts, Some((MatchType::Exact, 1.0)));

        let invoices = matches
            .iter()
            .find(|m| m.uri == "urn:document_types:invoices")
            .map(|m| m.match_type);
        assert_eq!(invoices, Some(MatchType::Alias));
        assert!(matches.iter().any(|m| m.uri == "urn:document_types:rental_contract"));
        Ok(())
    }

    #[test]
    fn empty_labels_and_aliases_never_match() -> Result<(), serde_json::Error> {
        let index = taxonomy_index()?;
        assert!(index.find_concepts("nichts passendes").is_empty());
        assert!(index.concept("urn:document_types:placeholder").is_some());
        Ok(())
    }

    #[test]
    fn expansion_is_one_hop_and_toggleable() -> Result<(), serde_json::Error> {
        let index = taxonomy_index()?;
        let contracts = "urn:document_types:contracts";

        assert_eq!(
            index.expand_query(contracts, true, true),
            vec![
                contracts.to_string(),
                "urn:document_types:document_types".to_string(),
                "urn:document_types:rental_contract".to_string(),
            ]
        );
        assert_eq!(
            index.expand_query("urn:document_types:rental_contract", true, false),
            vec![
                "urn:document_types:rental_contract".to_string(),
                contracts.to_string(),
            ]
        );
        assert_eq!(index.expand_query("urn:unknown", true, true), vec!["urn:unknown".to_string()]);

        let hierarchy = index.hierarchy(contracts);
        assert_eq!(hierarchy.broader[0].label, "Dokumenttypen");
        assert_eq!(hierarchy.narrower[0].label, "Mietvertrag");
        assert_eq!(index.hierarchy("urn:unknown").label, "");
        Ok(())
    }

    #[test]
    fn facets_follow_schemes_and_fall_back_to_uris() -> Result<(), serde_json::Error> {
        let index = taxonomy_index()?;
        let facets = index.facet_config();

        assert_eq!(facets.len(), 1);
        let facet = &facets["document_types"];
        assert_eq!(facet.field, "concepts.document_types");
        assert_eq!(facet.values.len(), 5);
        assert_eq!(facet.values[0].label, "Dokumenttypen");
        assert_eq!(facet.values[1].label, "Verträge");
        let placeholder = facet
            .values
            .iter()
            .find(|value| value.uri == "urn:document_types:placeholder")
            .map(|value| value.label.as_str());
        assert_eq!(placeholder, Some("urn:document_types:placeholder"));
        Ok(())
    }

    #[test]
    fn unlabelled_scheme_facet_is_unknown() {
        let mut builder = ConceptIndex::builder();
        builder.concept_mut("urn:x:a").label = "Alte Akten".into();
        builder.add_scheme_member("urn:x", "urn:x:a");
        let facets = builder.build().facet_config();
        assert_eq!(facets["Unknown"].field, "concepts.unknown");
        assert_eq!(facets["Unknown"].values[0].label, "Alte Akten");

        let mut labelled = ConceptIndex::builder();
        labelled.scheme_mut("urn:y").label = Some("Alte Akten".into());
        assert_eq!(labelled.build().facet_config()["Alte Akten"].field, "concepts.alte_akten");
    }

    #[test]
    fn taxonomy_export_lists_concepts_and_relations() -> Result<(), Box<dyn std::error::Error>> {
        let index = taxonomy_index()?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("taxonomy.json");
        index.save_taxonomy_json(&path)?;

        let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        let concepts = saved["concepts"].as_array().ok_or("concepts missing")?;
        assert_eq!(concepts.len(), 5);

        let contracts = concepts
            .iter()
            .find(|concept| concept["uri"] == "urn:document_types:contracts")
            .ok_or("contracts missing")?;
        assert_eq!(contracts["label"], "Verträge");
        assert_eq!(contracts["alternatives"], serde_json::json!(["Vertrag", "Contract"]));

        let rental = concepts
            .iter()
            .find(|concept| concept["uri"] == "urn:document_types:rental_contract")
            .ok_or("rental contract missing")?;
        assert!(rental.get("alternatives").is_none());

        assert_eq!(
            saved["relations"]["broader"]["urn:document_types:rental_contract"],
            serde_json::json!(["urn:document_types:contracts"])
        );
        assert_eq!(
            saved["relations"]["narrower"]["urn:document_types:document_types"],
            serde_json::json!([
                "urn:document_types:contracts",
                "urn:document_types:invoices",
                "urn:document_types:placeholder"
            ])
        );
        assert!(saved["relations"]["broader"].get("urn:document_types:document_types").is_none());
        Ok(())
    }

    #[test]
    fn graph_statements_build_concepts_and_schemes() -> Result<(), OntologyError> {
        let triples = parse_turtle(
            r#"@prefix skos: <http://www.w3.org/2004/02/skos/core#> .
               @prefix ex: <http://ex.org/> .
               ex:scheme a skos:ConceptScheme ; skos:prefLabel "Archiv" .
               ex:letters a skos:Concept ; skos:prefLabel "Letters"@en, "Briefe"@de ;
                   skos:altLabel "Korrespondenz" ; skos:inScheme ex:scheme ;
                   skos:narrower ex:postcards .
               ex:postcards a skos:Concept ; skos:prefLabel "Postkarten" ."#,
        )?;
        let mut builder = ConceptIndex::builder();
        builder.add_graph(&triples);
        let index = builder.build();

        let letters = index.concept("http://ex.org/letters");
        assert_eq!(letters.map(|c| c.label.as_str()), Some("Briefe"));
        assert_eq!(letters.map(|c| c.scheme.clone()), Some(Some("http://ex.org/scheme".to_string())));
        // stated relations only
        assert_eq!(index.concept("http://ex.org/postcards").map(|c| c.broader.len()), Some(0));

        let schemes: Vec<&ConceptScheme> = index.schemes().collect();
        assert_eq!(schemes.len(), 1);
        assert_eq!(schemes[0].label.as_deref(), Some("Archiv"));
        assert_eq!(schemes[0].concepts, vec!["http://ex.org/letters".to_string()]);

        let found = index.find_concepts("ein Korrespondenz-Ordner");
        assert_eq!(found[0].scheme.as_deref(), Some("http://ex.org/scheme"));
        Ok(())
    }

    #[test]
    fn load_dir_skips_broken_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("document_types.json"), DOCUMENT_TYPES)?;
        fs::write(dir.path().join("broken.ttl"), "@prefix nope")?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;
        fs::write(
            dir.path().join("letters.rdf"),
            r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                        xmlns:skos="http://www.w3.org/2004/02/skos/core#">
                 <skos:Concept rdf:about="http://ex.org/letters"><skos:prefLabel>Briefe</skos:prefLabel></skos:Concept>
               </rdf:RDF>"#,
        )?;

        let index = ConceptIndex::load_dir(dir.path())?;
        assert!(index.concept("http://ex.org/letters").is_some());
        assert!(index.concept("urn:document_types:invoices").is_some());
        assert_eq!(index.len(), 6);

        let missing = ConceptIndex::load_dir(&dir.path().join("absent"))?;
        assert!(missing.is_empty());
        Ok(())
    }

    #[test]
    fn bundled_demo_ontologies_load() -> Result<(), Box<dyn std::error::Error>> {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/ontologies");
        let index = ConceptIndex::load_dir(&dir)?;

        let matches = index.find_concepts("Der Vertrag ist gültig, siehe Gesetz");
        let contract = matches
            .iter()
            .find(|found| found.uri == "urn:document_types:contracts")
            .ok_or("contracts not matched")?;
        assert_eq!(contract.match_type, MatchType::Alias);
        assert_eq!(contract.label, "Verträge");
        assert!(matches.iter().any(|found| found.uri == "http://example.org/legal#law"));

        let expanded = index.expand_query("http://example.org/legal#civil_law", true, false);
        assert_eq!(expanded, vec![
            "http://example.org/legal#civil_law".to_string(),
            "http://example.org/legal#law".to_string(),
        ]);
        Ok(())
    }
}
