use crate::{
    config::{DirectoryConfig, IndexingConfig},
    error::{FailureKind, StepFailure},
    metadata::{detect_language, dotted_extension, text_statistics, MetadataExtractor},
    ocr::OcrCascade,
    ontology::ConceptIndex,
    traits::{ContentParser, DocumentIndex, PageRasterizer},
    ConceptMatch, DocumentRecord, FileCategory, IngestError, IngestionOptions, Metadata,
    ParsedContent,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Lowercase hex SHA-256 of the file bytes.
pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path).map_err(|source| IngestError::Hash {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Files under `directory` in path order, split into those the directory
/// rules accept and the number rejected.
pub fn discover_files(directory: &DirectoryConfig) -> (Vec<PathBuf>, usize) {
    let max_depth = if directory.recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    let mut rejected = 0;

    for entry in WalkDir::new(&directory.path)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if directory.allows(entry.path()) {
            files.push(entry.path().to_path_buf());
        } else {
            rejected += 1;
        }
    }

    files.sort_unstable();
    (files, rejected)
}

/// First concept label containing "type", case-insensitively.
pub fn document_type_from(concepts: &[ConceptMatch]) -> Option<String> {
    concepts
        .iter()
        .find(|concept| concept.label.to_lowercase().contains("type"))
        .map(|concept| concept.label.clone())
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Indexed,
    /// A record with the same content hash exists; nothing was written.
    AlreadyIndexed,
    IndexFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub path: PathBuf,
    pub hash: String,
    pub status: IngestStatus,
    pub has_ocr: bool,
    pub concept_count: usize,
    pub failures: Vec<StepFailure>,
}

impl IngestReport {
    pub fn degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct IngestionPipeline<I, P>
where
    I: DocumentIndex,
    P: ContentParser,
{
    index: I,
    parser: P,
    cascade: Arc<OcrCascade>,
    rasterizer: Arc<dyn PageRasterizer>,
    concepts: Arc<ConceptIndex>,
    extractor: MetadataExtractor,
    options: IngestionOptions,
}

impl<I, P> IngestionPipeline<I, P>
where
    I: DocumentIndex,
    P: ContentParser,
{
    pub fn new(
        index: I,
        parser: P,
        cascade: Arc<OcrCascade>,
        rasterizer: Arc<dyn PageRasterizer>,
        concepts: Arc<ConceptIndex>,
    ) -> Self {
        Self {
            index,
            parser,
            cascade,
            rasterizer,
            concepts,
            extractor: MetadataExtractor,
            options: IngestionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: IngestionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &IngestionOptions {
        &self.options
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Runs every step for one file. Only a missing path or an unreadable
    /// file is an error; every later failure degrades its step and is
    /// listed in the report.
    pub async fn ingest_file(&self, path: &Path, source_directory: &str) -> Result<IngestReport, IngestError> {
        if !path.exists() {
            return Err(IngestError::MissingFile(path.display().to_string()));
        }
        if !path.is_file() {
            return Err(IngestError::NotAFile(path.display().to_string()));
        }

        let hash = digest_file(path)?;
        let mut report = IngestReport {
            path: path.to_path_buf(),
            hash: hash.clone(),
            status: IngestStatus::Indexed,
            has_ocr: false,
            concept_count: 0,
            failures: Vec::new(),
        };

        match self.index.exists_by_hash(&hash).await {
            Ok(true) => {
                info!(path = %path.display(), hash = %hash, "already indexed");
                report.status = IngestStatus::AlreadyIndexed;
                return Ok(report);
            }
            Ok(false) => {}
            Err(lookup_error) => {
                error!(path = %path.display(), error = %lookup_error, "dedup lookup failed; not indexing");
                report.status = IngestStatus::IndexFailed;
                report.failures.push(StepFailure::new(FailureKind::Index, lookup_error));
                return Ok(report);
            }
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = dotted_extension(path);
        let category = FileCategory::from_extension(&extension);
        let mime_type = mime_guess::from_path(path).first_or_octet_stream().to_string();
        info!(path = %path.display(), category = category.label(), "indexing");

        let structural = self.extractor.extract(path);
        if let Some(failure) = &structural.failure {
            report.failures.push(StepFailure::new(FailureKind::Metadata, failure));
        }

        let parsed = match self.parser.parse(path).await {
            Ok(parsed) => parsed,
            Err(parse_error) => {
                warn!(path = %path.display(), error = %parse_error, "parsing service failed");
                report.failures.push(StepFailure::new(FailureKind::Parse, parse_error));
                ParsedContent::default()
            }
        };
        let ParsedContent { content, metadata } = parsed;
        let mut metadata = metadata;
        metadata.extend(structural.metadata);

        let ocr_text = match category {
            FileCategory::Image => {
                info!(path = %path.display(), "running ocr on image");
                self.ocr_image(path, &mut report.failures).await
            }
            FileCategory::Pdf if content.trim().chars().count() < self.options.scanned_pdf_min_chars => {
                info!(path = %path.display(), "pdf looks scanned; running ocr");
                self.ocr_pdf(path, &mut report.failures).await
            }
            _ => String::new(),
        };
        let has_ocr = !ocr_text.trim().is_empty();

        let full_text = format!("{file_name} {content} {ocr_text}");
        let concepts = self.concepts.find_concepts(&full_text);
        let categories: Vec<String> = concepts.iter().map(|concept| concept.label.clone()).collect();
        let document_type = document_type_from(&concepts);

        let language = metadata
            .get("language")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| detect_language(&format!("{content} {ocr_text}")).map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        let analysed_text = [content.trim(), ocr_text.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        metadata.insert("text_statistics".into(), text_statistics(&analysed_text));

        let (file_size, created_date, modified_date) = file_times(path);
        let file_path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        report.has_ocr = has_ocr;
        report.concept_count = concepts.len();

        let record = DocumentRecord {
            hash: hash.clone(),
            title: file_name.clone(),
            file_name,
            file_extension: extension,
            file_path: file_path.to_string_lossy().to_string(),
            mime_type,
            file_type_category: category,
            file_size,
            created_date,
            modified_date,
            indexed_date: Utc::now(),
            content,
            ocr_text,
            has_ocr,
            page_count: page_count(&metadata),
            metadata,
            language,
            source_directory: source_directory.to_string(),
            concepts,
            categories,
            document_type,
            tags: Vec::new(),
            processing_errors: report.failures.clone(),
        };

        match self.index.upsert_document(&record).await {
            Ok(()) => info!(
                path = %path.display(),
                has_ocr,
                concepts = report.concept_count,
                "indexed"
            ),
            Err(index_error) => {
                error!(path = %path.display(), error = %index_error, "index write failed");
                report.status = IngestStatus::IndexFailed;
                report.failures.push(StepFailure::new(FailureKind::Index, index_error));
            }
        }

        Ok(report)
    }

    async fn ocr_image(&self, path: &Path, failures: &mut Vec<StepFailure>) -> String {
        let image = match image::open(path) {
            Ok(image) => image,
            Err(open_error) => {
                warn!(path = %path.display(), error = %open_error, "image could not be decoded for ocr");
                failures.push(StepFailure::new(FailureKind::Ocr, open_error));
                return String::new();
            }
        };

        let result = self.cascade.extract_auto(&image, None, None).await;
        if let Some(message) = &result.error {
            failures.push(StepFailure::new(FailureKind::Ocr, message));
        }
        result.text
    }

    /// Rasterizes every page and joins the non-empty page texts with page markers.
    async fn ocr_pdf(&self, path: &Path, failures: &mut Vec<StepFailure>) -> String {
        let pages = match self.rasterizer.rasterize(path, self.options.rasterize_dpi).await {
            Ok(pages) => pages,
            Err(raster_error) => {
                warn!(path = %path.display(), error = %raster_error, "pdf rasterization failed");
                failures.push(StepFailure::new(FailureKind::Ocr, raster_error));
                return String::new();
            }
        };

        let mut texts = Vec::new();
        for (index, page) in pages.pages().iter().enumerate() {
            let image = match image::open(page) {
                Ok(image) => image,
                Err(open_error) => {
                    warn!(page = %page.display(), error = %open_error, "page image could not be decoded");
                    failures.push(StepFailure::new(FailureKind::Ocr, open_error));
                    continue;
                }
            };

            let result = self.cascade.extract_auto(&image, None, None).await;
            if let Some(message) = &result.error {
                failures.push(StepFailure::new(FailureKind::Ocr, message));
            }
            let text = result.text.trim();
            if !text.is_empty() {
                texts.push(format!("--- Seite {} ---\n{}", index + 1, text));
            }
        }

        texts.join("\n\n")
    }
}

fn file_times(path: &Path) -> (u64, Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match fs::metadata(path) {
        Ok(stat) => (
            stat.len(),
            stat.created().ok().map(DateTime::<Utc>::from),
            stat.modified().ok().map(DateTime::<Utc>::from),
        ),
        Err(_) => (0, None, None),
    }
}

/// `xmpTPg:NPages` from the parsing service, else the structural `page_count`.
fn page_count(metadata: &Metadata) -> Option<u64> {
    ["xmpTPg:NPages", "page_count"]
        .iter()
        .filter_map(|key| metadata.get(*key))
        .find_map(|value| match value {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub indexed: usize,
    pub already_indexed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.indexed + self.already_indexed + self.failed + self.skipped
    }

    pub(crate) fn record(mut self, outcome: &Result<IngestReport, IngestError>) -> Self {
        match outcome {
            Ok(report) => match report.status {
                IngestStatus::Indexed => self.indexed += 1,
                IngestStatus::AlreadyIndexed => self.already_indexed += 1,
                IngestStatus::IndexFailed => self.failed += 1,
            },
            Err(_) => self.failed += 1,
        }
        self
    }

    fn combine(self, other: Self) -> Self {
        Self {
            indexed: self.indexed + other.indexed,
            already_indexed: self.already_indexed + other.already_indexed,
            failed: self.failed + other.failed,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Sequential runner over file lists and configured directories.
pub struct BatchRunner<'a, I, P>
where
    I: DocumentIndex,
    P: ContentParser,
{
    pipeline: &'a IngestionPipeline<I, P>,
}

impl<'a, I, P> BatchRunner<'a, I, P>
where
    I: DocumentIndex,
    P: ContentParser,
{
    pub fn new(pipeline: &'a IngestionPipeline<I, P>) -> Self {
        Self { pipeline }
    }

    /// Files are processed one at a time; groups only set the progress log cadence.
    pub async fn run(&self, files: &[PathBuf], source_directory: &str) -> BatchSummary {
        let group_size = self.pipeline.options.batch_size.max(1);
        let groups = files.len().div_ceil(group_size);
        let mut summary = BatchSummary::default();

        for (group, chunk) in files.chunks(group_size).enumerate() {
            for path in chunk {
                let outcome = self.pipeline.ingest_file(path, source_directory).await;
                if let Err(ingest_error) = &outcome {
                    error!(path = %path.display(), error = %ingest_error, "file skipped");
                }
                summary = summary.record(&outcome);
            }
            info!(
                source = source_directory,
                group = group + 1,
                groups,
                indexed = summary.indexed,
                already_indexed = summary.already_indexed,
                failed = summary.failed,
                "batch progress"
            );
        }

        summary
    }

    pub async fn index_directory(&self, directory: &DirectoryConfig) -> BatchSummary {
        if !directory.path.exists() {
            warn!(path = %directory.path.display(), "directory does not exist");
            return BatchSummary::default();
        }
        if !directory.path.is_dir() {
            error!(path = %directory.path.display(), "not a directory");
            return BatchSummary::default();
        }

        info!(
            path = %directory.path.display(),
            recursive = directory.recursive,
            "indexing directory"
        );
        let (files, rejected) = discover_files(directory);
        let mut summary = self.run(&files, &directory.id).await;
        summary.skipped += rejected;

        info!(
            path = %directory.path.display(),
            indexed = summary.indexed,
            skipped = summary.skipped,
            "directory complete"
        );
        summary
    }

    /// Every enabled directory that is not watched.
    pub async fn index_configured(&self, config: &IndexingConfig) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for directory in config.enabled_directories().filter(|directory| !directory.watch) {
            summary = summary.combine(self.index_directory(directory).await);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ocr::{OcrRequest, RasterizedPages, Recognition},
        stores::MemoryIndex,
        traits::OcrEngine,
        OcrError, OcrMethod, OcrSettings, ParseError, SearchError,
    };
    use async_trait::async_trait;
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct FakeParser {
        content: Option<String>,
    }

    #[async_trait]
    impl ContentParser for FakeParser {
        async fn parse(&self, _path: &Path) -> Result<ParsedContent, ParseError> {
            match &self.content {
                Some(content) => {
                    let mut metadata = Metadata::new();
                    metadata.insert("xmpTPg:NPages".into(), Value::from("3"));
                    metadata.insert("file_name".into(), Value::from("from-parser"));
                    Ok(ParsedContent {
                        content: content.clone(),
                        metadata,
                    })
                }
                None => Err(ParseError::Payload("service down".to_string())),
            }
        }
    }

    struct FixedEngine;

    #[async_trait]
    impl OcrEngine for FixedEngine {
        fn method(&self) -> OcrMethod {
            OcrMethod::Baseline
        }

        async fn extract(&self, _image: &DynamicImage, _request: &OcrRequest) -> Result<Recognition, OcrError> {
            Ok(Recognition {
                text: "recognized words".to_string(),
                confidence: 88.0,
                gpu_used: false,
            })
        }
    }

    #[derive(Default)]
    struct FakeRasterizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageRasterizer for FakeRasterizer {
        async fn rasterize(&self, _pdf: &Path, _dpi: u32) -> Result<RasterizedPages, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let workdir = tempfile::tempdir()?;
            let mut pages = Vec::new();
            for number in 1..=2 {
                let page = workdir.path().join(format!("page-{number}.png"));
                GrayImage::from_pixel(32, 32, Luma([255])).save(&page)?;
                pages.push(page);
            }
            Ok(RasterizedPages::new(pages, Some(workdir)))
        }
    }

    struct BrokenIndex;

    #[async_trait]
    impl DocumentIndex for BrokenIndex {
        async fn exists_by_hash(&self, _hash: &str) -> Result<bool, SearchError> {
            Ok(false)
        }

        async fn upsert_document(&self, _record: &DocumentRecord) -> Result<(), SearchError> {
            Err(SearchError::Request("cluster read-only".to_string()))
        }
    }

    fn concepts() -> Arc<ConceptIndex> {
        let mut builder = ConceptIndex::builder();
        let concept = builder.concept_mut("urn:types:contract");
        concept.label = "Contract type".to_string();
        concept.aliases = vec!["Vertrag".to_string()];
        Arc::new(builder.build())
    }

    fn pipeline<I: DocumentIndex>(
        index: I,
        content: Option<&str>,
        rasterizer: Arc<FakeRasterizer>,
    ) -> IngestionPipeline<I, FakeParser> {
        let cascade = OcrCascade::new(Arc::new(FixedEngine), None, OcrSettings::default());
        IngestionPipeline::new(
            index,
            FakeParser {
                content: content.map(str::to_string),
            },
            Arc::new(cascade),
            rasterizer,
            concepts(),
        )
    }

    #[tokio::test]
    async fn unchanged_file_is_written_once() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.txt");
        fs::write(&path, "plain text body")?;

        let index = Arc::new(MemoryIndex::new());
        let pipeline = pipeline(index.clone(), Some("plain text body"), Arc::default());

        let first = pipeline.ingest_file(&path, "data").await?;
        assert_eq!(first.status, IngestStatus::Indexed);
        let second = pipeline.ingest_file(&path, "data").await?;
        assert_eq!(second.status, IngestStatus::AlreadyIndexed);
        assert_eq!(first.hash, second.hash);
        assert_eq!(index.write_count(), 1);
        assert_eq!(index.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn scanned_pdf_is_ocred_per_page() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("scan.pdf");
        fs::write(&path, b"%PDF-1.4\n%scanned")?;

        let index = Arc::new(MemoryIndex::new());
        let rasterizer = Arc::new(FakeRasterizer::default());
        let pipeline = pipeline(index.clone(), Some("  short  "), rasterizer.clone());

        let report = pipeline.ingest_file(&path, "scans").await?;
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);
        assert!(report.has_ocr);
        assert!(report.failures.iter().any(|failure| failure.kind == FailureKind::Metadata));

        let record = index.get(&report.hash).ok_or("record missing")?;
        assert_eq!(
            record.ocr_text,
            "--- Seite 1 ---\nrecognized words\n\n--- Seite 2 ---\nrecognized words"
        );
        assert_eq!(record.file_type_category, FileCategory::Pdf);
        assert_eq!(record.page_count, Some(3));
        assert_eq!(record.source_directory, "scans");
        assert!(record.metadata.contains_key("pdf_error"));
        assert_eq!(record.processing_errors, report.failures);
        Ok(())
    }

    #[tokio::test]
    async fn text_rich_pdf_skips_ocr() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("digital.pdf");
        fs::write(&path, b"%PDF-1.4\n%digital")?;

        let rasterizer = Arc::new(FakeRasterizer::default());
        let body = "x".repeat(100);
        let pipeline = pipeline(MemoryIndex::new(), Some(&body), rasterizer.clone());

        let report = pipeline.ingest_file(&path, "data").await?;
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
        assert!(!report.has_ocr);
        Ok(())
    }

    #[tokio::test]
    async fn images_are_always_ocred() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("photo.png");
        GrayImage::from_pixel(32, 32, Luma([250])).save(&path)?;

        let index = Arc::new(MemoryIndex::new());
        let pipeline = pipeline(index.clone(), Some(&"long ".repeat(50)), Arc::default());

        let report = pipeline.ingest_file(&path, "data").await?;
        let record = index.get(&report.hash).ok_or("record missing")?;
        assert!(record.has_ocr);
        assert_eq!(record.ocr_text, "recognized words");
        assert_eq!(record.mime_type, "image/png");
        assert_eq!(record.file_extension, ".png");
        let stats = record.metadata.get("text_statistics").ok_or("statistics missing")?;
        assert_eq!(stats["word_count"], serde_json::json!(52));
        assert_eq!(stats["paragraph_count"], serde_json::json!(2));
        Ok(())
    }

    #[tokio::test]
    async fn parse_failure_degrades_to_empty_content() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("letter.txt");
        fs::write(&path, "body")?;

        let index = Arc::new(MemoryIndex::new());
        let pipeline = pipeline(index.clone(), None, Arc::default());

        let report = pipeline.ingest_file(&path, "data").await?;
        assert_eq!(report.status, IngestStatus::Indexed);
        assert!(report.degraded());
        assert_eq!(report.failures[0].kind, FailureKind::Parse);

        let record = index.get(&report.hash).ok_or("record missing")?;
        assert!(record.content.is_empty());
        assert_eq!(record.language, "unknown");
        Ok(())
    }

    #[tokio::test]
    async fn concepts_drive_categories_and_document_type() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("vertrag_2024.txt");
        fs::write(&path, "x")?;

        let index = Arc::new(MemoryIndex::new());
        let pipeline = pipeline(index.clone(), Some("Der Vertrag ist gültig"), Arc::default());

        let report = pipeline.ingest_file(&path, "data").await?;
        let record = index.get(&report.hash).ok_or("record missing")?;
        assert_eq!(record.concepts.len(), 1);
        assert_eq!(record.categories, vec!["Contract type".to_string()]);
        assert_eq!(record.document_type.as_deref(), Some("Contract type"));
        assert_eq!(record.language, "de");
        // structural metadata is applied after the parser's
        assert_eq!(
            record.metadata.get("file_name"),
            Some(&Value::from("vertrag_2024.txt"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn index_write_failure_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("a.txt");
        fs::write(&path, "a")?;

        let pipeline = pipeline(BrokenIndex, Some("a"), Arc::default());
        let report = pipeline.ingest_file(&path, "data").await?;
        assert_eq!(report.status, IngestStatus::IndexFailed);
        assert_eq!(report.failures.last().map(|failure| failure.kind), Some(FailureKind::Index));
        Ok(())
    }

    #[tokio::test]
    async fn missing_and_directory_paths_are_errors() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pipeline = pipeline(MemoryIndex::new(), Some(""), Arc::default());

        let missing = pipeline.ingest_file(&dir.path().join("gone.txt"), "data").await;
        assert!(matches!(missing, Err(IngestError::MissingFile(_))));
        let directory = pipeline.ingest_file(dir.path(), "data").await;
        assert!(matches!(directory, Err(IngestError::NotAFile(_))));
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.pdf");
        fs::write(&file_path, b"abc")?;

        let first = digest_file(&file_path)?;
        assert_eq!(first, digest_file(&file_path)?);
        assert_eq!(
            first,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(matches!(
            digest_file(&dir.path().join("missing")),
            Err(IngestError::Hash { .. })
        ));
        Ok(())
    }

    #[test]
    fn document_type_needs_type_in_label() {
        let concept = |label: &str| ConceptMatch {
            uri: format!("urn:x:{label}"),
            label: label.to_string(),
            match_type: crate::MatchType::Exact,
            confidence: 1.0,
            scheme: None,
        };
        assert_eq!(document_type_from(&[concept("Invoice"), concept("Letter TYPE")]).as_deref(), Some("Letter TYPE"));
        assert_eq!(document_type_from(&[concept("Invoice")]), None);
    }

    #[tokio::test]
    async fn directory_scan_respects_rules() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        fs::write(dir.path().join("a.txt"), "a")?;
        fs::write(nested.join("b.txt"), "b")?;
        fs::write(dir.path().join("c.tmp"), "c")?;

        let index = Arc::new(MemoryIndex::new());
        let pipeline = pipeline(index.clone(), Some("text"), Arc::default());
        let runner = BatchRunner::new(&pipeline);

        let directory = DirectoryConfig::new("docs", dir.path()).with_exclude_patterns(&["*.tmp"])?;
        let summary = runner.index_directory(&directory).await;
        assert_eq!(summary, BatchSummary { indexed: 2, already_indexed: 0, failed: 0, skipped: 1 });

        let mut flat = DirectoryConfig::new("flat", dir.path());
        flat.recursive = false;
        let (files, _) = discover_files(&flat);
        assert_eq!(files.len(), 2);

        let again = runner.index_directory(&directory).await;
        assert_eq!(again.already_indexed, 2);
        assert_eq!(index.write_count(), 2);

        let missing = runner.index_directory(&DirectoryConfig::new("gone", dir.path().join("gone"))).await;
        assert_eq!(missing.total(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn configured_run_skips_watched_directories() -> Result<(), Box<dyn std::error::Error>> {
        let scanned = tempdir()?;
        let watched = tempdir()?;
        fs::write(scanned.path().join("a.txt"), "a")?;
        fs::write(watched.path().join("b.txt"), "b")?;

        let raw = serde_json::json!({
            "directories": [
                {"id": "scanned", "path": scanned.path()},
                {"id": "watched", "path": watched.path(), "watch": true},
                {"id": "off", "path": watched.path(), "enabled": false}
            ]
        });
        let config = IndexingConfig::from_json(&raw.to_string())?;

        let index = Arc::new(MemoryIndex::new());
        let pipeline = pipeline(index.clone(), Some("text"), Arc::default());
        let summary = BatchRunner::new(&pipeline).index_configured(&config).await;
        assert_eq!(summary.indexed, 1);
        assert_eq!(index.write_count(), 1);
        Ok(())
    }
}
