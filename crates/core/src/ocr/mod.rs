pub mod batch;
pub mod cascade;
pub mod classify;
pub mod detail;
pub mod engine;
pub mod filters;
pub mod preprocess;
pub mod rasterize;
pub mod tesseract;

pub use batch::{BatchItem, BatchOcr};
pub use cascade::{plan_strategies, AttemptInput, OcrCascade, OcrStats, OcrStatsSnapshot, Strategy};
pub use classify::{ImageStatistics, TextTypeClassifier};
pub use detail::{DetailEndpointConfig, RemoteDetailEngine};
pub use engine::{OcrRequest, RasterizedPages, Recognition, RecognitionPreset};
pub use preprocess::{preprocess, PreprocessMode, Step};
pub use rasterize::PdftoppmRasterizer;
pub use tesseract::TesseractEngine;
