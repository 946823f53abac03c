pub mod config;
pub mod crawl;
pub mod error;
pub mod ingest;
pub mod metadata;
pub mod models;
pub mod ocr;
pub mod ontology;
pub mod parser;
pub mod stores;
pub mod traits;
pub mod watch;

pub use config::{
    DirectoryConfig, FacetConfig, FacetDefinition, FacetSource, IndexingConfig, OcrSettings,
};
pub use error::{
    CrawlError, FailureKind, IngestError, MetadataError, OcrError, OntologyError, ParseError, SearchError,
    StepFailure,
};
pub use crawl::{CrawlSummary, PageOutcome, WebCrawler};
pub use ingest::{
    digest_file, discover_files, BatchRunner, BatchSummary, IngestReport, IngestStatus,
    IngestionPipeline,
};
pub use metadata::{MetadataExtractor, StructuralMetadata};
pub use models::{
    ConceptMatch, DocumentRecord, FileCategory, IngestionOptions, MatchType, Metadata, OcrMethod,
    OcrResult, ParsedContent, TextType, WebPageRecord,
};
pub use ocr::{
    BatchItem, BatchOcr, DetailEndpointConfig, OcrCascade, OcrStatsSnapshot, PdftoppmRasterizer, PreprocessMode,
    RecognitionPreset, RemoteDetailEngine, TesseractEngine, TextTypeClassifier,
};
pub use ontology::{Concept, ConceptHierarchy, ConceptIndex, ConceptScheme, SchemeFacet, TaxonomyExport};
pub use parser::TikaParser;
pub use stores::{FacetCounts, MemoryIndex, OpenSearchStore};
pub use traits::{ContentParser, DocumentIndex, OcrEngine, PageIndex, PageRasterizer};
pub use watch::{WatchEvent, WatchEventKind, WatchLoop};
