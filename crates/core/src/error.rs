use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to hash {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file not found: {0}")]
    MissingFile(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("glob error: {0}")]
    Glob(#[from] globset::Error),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ocr engine unavailable: {0}")]
    Unavailable(String),

    #[error("ocr engine failed: {0}")]
    EngineFailed(String),

    #[error("pdf rasterization failed: {0}")]
    Rasterize(String),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("parsing service returned {status}: {details}")]
    Service { status: u16, details: String },

    #[error("unexpected parsing service payload: {0}")]
    Payload(String),
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf metadata error: {0}")]
    Pdf(String),

    #[error("image metadata error: {0}")]
    Image(#[from] image::ImageError),

    #[error("office metadata error: {0}")]
    Office(String),
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("page index error: {0}")]
    Index(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum OntologyError {
    #[error("io error while reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("taxonomy json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("turtle syntax error at line {line}: {message}")]
    Turtle { line: usize, message: String },

    #[error("rdf/xml error: {0}")]
    RdfXml(String),

    #[error("unsupported ontology format: {0}")]
    UnsupportedFormat(String),
}

/// The step of the per-file pipeline that degraded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Parse,
    Metadata,
    Ocr,
    Index,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StepFailure {
    pub fn new(kind: FailureKind, error: impl ToString) -> Self {
        Self {
            kind,
            message: error.to_string(),
        }
    }
}
