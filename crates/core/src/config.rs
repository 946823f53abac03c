use crate::error::IngestError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Extension groups selectable through `DirectoryConfig::file_types`.
pub const FILE_TYPE_GROUPS: [(&str, &[&str]); 7] = [
    ("libreoffice", &["odt", "ods", "odp", "odg", "odf"]),
    (
        "microsoft_office",
        &["doc", "docx", "xls", "xlsx", "ppt", "pptx", "docm", "xlsm", "pptm"],
    ),
    ("images", &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif"]),
    ("pdf", &["pdf"]),
    ("text", &["txt", "md", "csv", "json", "xml", "html", "htm"]),
    ("email", &["eml", "msg"]),
    ("archives", &["zip", "tar", "gz", "7z"]),
];

const ALL_FILE_TYPES: &str = "all";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub id: String,
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default)]
    pub watch: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_file_types")]
    pub file_types: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(skip)]
    excludes: Option<GlobSet>,
}

fn default_true() -> bool {
    true
}

fn default_file_types() -> Vec<String> {
    vec![ALL_FILE_TYPES.to_string()]
}

impl DirectoryConfig {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            enabled: true,
            recursive: true,
            watch: false,
            description: String::new(),
            file_types: default_file_types(),
            exclude_patterns: Vec::new(),
            excludes: None,
        }
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_file_types(mut self, file_types: &[&str]) -> Self {
        self.file_types = file_types.iter().map(|item| item.to_string()).collect();
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: &[&str]) -> Result<Self, IngestError> {
        self.exclude_patterns = patterns.iter().map(|item| item.to_string()).collect();
        self.compile()?;
        Ok(self)
    }

    fn compile(&mut self) -> Result<(), IngestError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_patterns {
            builder.add(Glob::new(pattern)?);
        }
        self.excludes = Some(builder.build()?);
        Ok(())
    }

    fn validate(&mut self) -> Result<(), IngestError> {
        if self.id.trim().is_empty() {
            return Err(IngestError::InvalidConfig(
                "directory entry has an empty id".to_string(),
            ));
        }
        if self.path.as_os_str().is_empty() {
            return Err(IngestError::InvalidConfig(format!(
                "directory '{}' has an empty path",
                self.id
            )));
        }
        for file_type in &self.file_types {
            let known = file_type == ALL_FILE_TYPES
                || FILE_TYPE_GROUPS.iter().any(|(group, _)| *group == file_type.as_str());
            if !known {
                return Err(IngestError::InvalidConfig(format!(
                    "directory '{}' lists unknown file type group '{}'",
                    self.id, file_type
                )));
            }
        }
        self.compile()
    }

    /// Exclude patterns are checked first, then the configured file-type groups.
    pub fn allows(&self, path: &Path) -> bool {
        if let Some(excludes) = &self.excludes {
            if excludes.is_match(path) {
                return false;
            }
            if let Ok(relative) = path.strip_prefix(&self.path) {
                if excludes.is_match(relative) {
                    return false;
                }
            }
            let file_name_excluded = path
                .file_name()
                .is_some_and(|name| excludes.is_match(Path::new(name)));
            if file_name_excluded {
                return false;
            }
        }

        if self.file_types.iter().any(|item| item == ALL_FILE_TYPES) {
            return true;
        }

        let Some(extension) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
        else {
            return false;
        };

        self.file_types.iter().any(|file_type| {
            FILE_TYPE_GROUPS
                .iter()
                .find(|(group, _)| *group == file_type.as_str())
                .is_some_and(|(_, extensions)| extensions.contains(&extension.as_str()))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default)]
    pub directories: Vec<DirectoryConfig>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for IndexingConfig {
    fn default() -> Self {
        let mut data = DirectoryConfig::new("data", "/data");
        data.description = "Main data directory".to_string();
        data.exclude_patterns = vec![
            "*.tmp".to_string(),
            "*.bak".to_string(),
            ".git/*".to_string(),
            "__pycache__/*".to_string(),
        ];

        let mut watch = DirectoryConfig::new("watch", "/watch").with_watch(true);
        watch.description = "Watched drop directory".to_string();

        let mut config = Self {
            directories: vec![data, watch],
            version: default_version(),
        };
        // Built-in patterns are static and always valid.
        for directory in &mut config.directories {
            let _ = directory.compile();
        }
        config
    }
}

impl IndexingConfig {
    /// Reads `path`, falling back to the built-in default when it does not exist.
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, IngestError> {
        let mut config: IndexingConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<(), IngestError> {
        let mut seen = HashSet::new();
        for directory in &mut self.directories {
            directory.validate()?;
            if !seen.insert(directory.id.clone()) {
                return Err(IngestError::InvalidConfig(format!(
                    "duplicate directory id '{}'",
                    directory.id
                )));
            }
        }
        Ok(())
    }

    pub fn enabled_directories(&self) -> impl Iterator<Item = &DirectoryConfig> {
        self.directories.iter().filter(|directory| directory.enabled)
    }

    pub fn watched_directories(&self) -> impl Iterator<Item = &DirectoryConfig> {
        self.enabled_directories().filter(|directory| directory.watch)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FacetSource {
    Field,
    Nested,
    Ontology,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetDefinition {
    pub id: String,
    pub label: String,
    pub field: String,
    #[serde(rename = "type", default = "default_facet_type")]
    pub kind: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub order: u32,
    #[serde(default = "default_facet_size")]
    pub size: u32,
    #[serde(default = "default_facet_source")]
    pub source: FacetSource,
    #[serde(default)]
    pub nested_path: Option<String>,
}

fn default_facet_type() -> String {
    "terms".to_string()
}

fn default_facet_size() -> u32 {
    20
}

fn default_facet_source() -> FacetSource {
    FacetSource::Field
}

impl FacetDefinition {
    pub fn terms(id: &str, label: &str, field: &str, order: u32, size: u32) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            field: field.to_string(),
            kind: default_facet_type(),
            enabled: true,
            order,
            size,
            source: FacetSource::Field,
            nested_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetConfig {
    #[serde(default)]
    pub facets: Vec<FacetDefinition>,
}

impl Default for FacetConfig {
    fn default() -> Self {
        let mut concepts = FacetDefinition::terms("concepts", "Concepts", "concepts.label.keyword", 4, 50);
        concepts.source = FacetSource::Nested;
        concepts.nested_path = Some("concepts".to_string());

        Self {
            facets: vec![
                FacetDefinition::terms("document_type", "Document type", "document_type", 1, 20),
                FacetDefinition::terms("mime_type", "File type", "mime_type", 2, 20),
                FacetDefinition::terms("categories", "Categories", "categories", 3, 30),
                concepts,
                FacetDefinition::terms("language", "Language", "language", 5, 10),
            ],
        }
    }
}

impl FacetConfig {
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, IngestError> {
        let config: FacetConfig = serde_json::from_str(raw)?;
        let mut seen = HashSet::new();
        for facet in &config.facets {
            if facet.id.trim().is_empty() || facet.field.trim().is_empty() {
                return Err(IngestError::InvalidConfig(
                    "facet entries need a non-empty id and field".to_string(),
                ));
            }
            if facet.source == FacetSource::Nested && facet.nested_path.is_none() {
                return Err(IngestError::InvalidConfig(format!(
                    "nested facet '{}' has no nested_path",
                    facet.id
                )));
            }
            if !seen.insert(facet.id.clone()) {
                return Err(IngestError::InvalidConfig(format!(
                    "duplicate facet id '{}'",
                    facet.id
                )));
            }
        }
        Ok(config)
    }

    /// Enabled facets in display order.
    pub fn enabled(&self) -> Vec<&FacetDefinition> {
        let mut facets: Vec<_> = self.facets.iter().filter(|facet| facet.enabled).collect();
        facets.sort_by_key(|facet| facet.order);
        facets
    }
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub use_gpu: bool,
    pub enable_legacy_script: bool,
    pub languages: String,
    pub legacy_languages: String,
    pub detail_languages: Vec<String>,
    /// Detail-engine acceptance on the legacy-script path (strictly greater).
    pub legacy_detail_min_confidence: f32,
    /// Detail-engine acceptance for handwriting without legacy handling.
    pub handwriting_detail_min_confidence: f32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            use_gpu: true,
            enable_legacy_script: true,
            languages: "deu+eng".to_string(),
            legacy_languages: "deu_frak+deu+eng".to_string(),
            detail_languages: vec!["de".to_string(), "en".to_string()],
            legacy_detail_min_confidence: 50.0,
            handwriting_detail_min_confidence: 40.0,
        }
    }
}
