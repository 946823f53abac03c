use crate::error::StepFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

pub type Metadata = Map<String, Value>;

/// Coarse script class derived from image statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TextType {
    Standard,
    Historical,
    Handwriting,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OcrMethod {
    /// General-purpose multi-language engine (tesseract).
    Baseline,
    /// GPU-capable, paragraph-aware engine.
    Detail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrResult {
    pub text: String,
    /// Engine-normalized, 0-100.
    pub confidence: f32,
    pub method: OcrMethod,
    pub text_type: TextType,
    pub gpu_used: bool,
    pub is_legacy_script: bool,
    pub preprocessed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OcrResult {
    pub fn failed(method: OcrMethod, text_type: TextType, error: impl ToString) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            method,
            text_type,
            gpu_used: false,
            is_legacy_script: false,
            preprocessed: false,
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Alias,
}

impl MatchType {
    pub fn confidence(self) -> f32 {
        match self {
            MatchType::Exact => 1.0,
            MatchType::Alias => 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptMatch {
    pub uri: String,
    pub label: String,
    pub match_type: MatchType,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FileCategory {
    #[serde(rename = "PDF")]
    Pdf,
    LibreOffice,
    #[serde(rename = "Microsoft Office")]
    MicrosoftOffice,
    Image,
    Text,
    #[serde(rename = "HTML")]
    Html,
    Other,
}

pub const LIBREOFFICE_EXTENSIONS: [&str; 5] = ["odt", "ods", "odp", "odg", "odf"];
pub const MICROSOFT_OFFICE_EXTENSIONS: [&str; 9] = [
    "doc", "docx", "xls", "xlsx", "ppt", "pptx", "docm", "xlsm", "pptm",
];
pub const OCR_IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

impl FileCategory {
    /// Classifies a lowercase extension without the leading dot.
    pub fn from_extension(extension: &str) -> Self {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        let extension = extension.as_str();

        if extension == "pdf" {
            FileCategory::Pdf
        } else if LIBREOFFICE_EXTENSIONS.contains(&extension) {
            FileCategory::LibreOffice
        } else if MICROSOFT_OFFICE_EXTENSIONS.contains(&extension) {
            FileCategory::MicrosoftOffice
        } else if OCR_IMAGE_EXTENSIONS.contains(&extension) {
            FileCategory::Image
        } else if matches!(extension, "txt" | "md") {
            FileCategory::Text
        } else if matches!(extension, "html" | "htm") {
            FileCategory::Html
        } else {
            FileCategory::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FileCategory::Pdf => "PDF",
            FileCategory::LibreOffice => "LibreOffice",
            FileCategory::MicrosoftOffice => "Microsoft Office",
            FileCategory::Image => "Image",
            FileCategory::Text => "Text",
            FileCategory::Html => "HTML",
            FileCategory::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedContent {
    pub content: String,
    pub metadata: Metadata,
}

/// The indexed representation of one ingested file, keyed by `hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub hash: String,
    pub title: String,
    pub file_name: String,
    pub file_extension: String,
    pub file_path: String,
    pub mime_type: String,
    pub file_type_category: FileCategory,
    pub file_size: u64,
    pub created_date: Option<DateTime<Utc>>,
    pub modified_date: Option<DateTime<Utc>>,
    pub indexed_date: DateTime<Utc>,
    pub content: String,
    pub ocr_text: String,
    pub has_ocr: bool,
    pub metadata: Metadata,
    pub language: String,
    pub page_count: Option<u64>,
    pub source_directory: String,
    pub concepts: Vec<ConceptMatch>,
    pub categories: Vec<String>,
    pub document_type: Option<String>,
    pub tags: Vec<String>,
    #[serde(default)]
    pub processing_errors: Vec<StepFailure>,
}

/// One crawled HTML page, keyed by `url_hash`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebPageRecord {
    pub url: String,
    pub url_hash: String,
    pub title: String,
    pub content: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub author: String,
    pub links: Vec<String>,
    pub domain: String,
    pub crawled_date: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub rasterize_dpi: u32,
    /// PDFs whose parsed text (trimmed) is shorter than this are OCRed.
    pub scanned_pdf_min_chars: usize,
    pub batch_size: usize,
    pub watch_debounce: Duration,
    pub watch_poll_interval: Duration,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            rasterize_dpi: 300,
            scanned_pdf_min_chars: 100,
            batch_size: 10,
            watch_debounce: Duration::from_secs(1),
            watch_poll_interval: Duration::from_secs(1),
        }
    }
}
