use super::{
    classify::TextTypeClassifier,
    preprocess::{preprocess, PreprocessMode},
    OcrRequest, RecognitionPreset,
};
use crate::{traits::OcrEngine, OcrMethod, OcrResult, OcrSettings, TextType};
use image::DynamicImage;
use serde::Serialize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptInput {
    Original,
    /// The handwriting-preprocessed image shared by the legacy-script path.
    LegacyPreprocessed,
}

/// One step of the cascade. Strategies run in order until one is accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// Accepted only when the reported confidence is strictly above `min_confidence`.
    DetailEngine {
        input: AttemptInput,
        min_confidence: f32,
        legacy_script: bool,
    },
    /// Baseline engine with the legacy-script language model and the
    /// handwriting preset. Always accepted.
    LegacyFallback,
    /// Baseline engine on the image preprocessed for `mode`. Always accepted.
    BaselineEngine { mode: PreprocessMode },
}

/// Strategies for one image, given its classified type.
pub fn plan_strategies(
    text_type: TextType,
    legacy_script: bool,
    detail_available: bool,
    settings: &OcrSettings,
) -> Vec<Strategy> {
    let mut strategies = Vec::new();

    if text_type == TextType::Handwriting && legacy_script {
        if detail_available {
            strategies.push(Strategy::DetailEngine {
                input: AttemptInput::LegacyPreprocessed,
                min_confidence: settings.legacy_detail_min_confidence,
                legacy_script: true,
            });
        }
        strategies.push(Strategy::LegacyFallback);
        return strategies;
    }

    if text_type == TextType::Handwriting && detail_available {
        strategies.push(Strategy::DetailEngine {
            input: AttemptInput::Original,
            min_confidence: settings.handwriting_detail_min_confidence,
            legacy_script: false,
        });
    }
    strategies.push(Strategy::BaselineEngine {
        mode: PreprocessMode::from(text_type),
    });
    strategies
}

#[derive(Debug, Default)]
pub struct OcrStats {
    total_processed: AtomicU64,
    gpu_processed: AtomicU64,
    legacy_script_detected: AtomicU64,
    preprocessing_applied: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct OcrStatsSnapshot {
    pub total_processed: u64,
    pub gpu_processed: u64,
    pub legacy_script_detected: u64,
    pub preprocessing_applied: u64,
    pub detail_engine_available: bool,
    pub legacy_script_enabled: bool,
}

impl OcrStats {
    pub fn snapshot(&self, detail_engine_available: bool, legacy_script_enabled: bool) -> OcrStatsSnapshot {
        OcrStatsSnapshot {
            total_processed: self.total_processed.load(Ordering::Relaxed),
            gpu_processed: self.gpu_processed.load(Ordering::Relaxed),
            legacy_script_detected: self.legacy_script_detected.load(Ordering::Relaxed),
            preprocessing_applied: self.preprocessing_applied.load(Ordering::Relaxed),
            detail_engine_available,
            legacy_script_enabled,
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Adaptive OCR: classifies the image, then walks the planned strategies.
/// Never fails; engine errors become zero-confidence results.
pub struct OcrCascade {
    baseline: Arc<dyn OcrEngine>,
    detail: Option<Arc<dyn OcrEngine>>,
    classifier: TextTypeClassifier,
    settings: OcrSettings,
    stats: OcrStats,
}

impl OcrCascade {
    pub fn new(
        baseline: Arc<dyn OcrEngine>,
        detail: Option<Arc<dyn OcrEngine>>,
        settings: OcrSettings,
    ) -> Self {
        Self {
            baseline,
            detail,
            classifier: TextTypeClassifier,
            settings,
            stats: OcrStats::default(),
        }
    }

    pub fn settings(&self) -> &OcrSettings {
        &self.settings
    }

    pub fn detail_available(&self) -> bool {
        self.detail.is_some()
    }

    pub fn snapshot(&self) -> OcrStatsSnapshot {
        self.stats
            .snapshot(self.detail_available(), self.settings.enable_legacy_script)
    }

    /// `languages` overrides the baseline language string; `legacy_script`
    /// overrides the configured legacy-script handling.
    pub async fn extract_auto(
        &self,
        image: &DynamicImage,
        languages: Option<&str>,
        legacy_script: Option<bool>,
    ) -> OcrResult {
        OcrStats::bump(&self.stats.total_processed);

        let text_type = self.classifier.classify(image);
        let legacy_script = legacy_script.unwrap_or(self.settings.enable_legacy_script);
        let strategies = plan_strategies(text_type, legacy_script, self.detail_available(), &self.settings);
        if text_type == TextType::Handwriting && legacy_script {
            OcrStats::bump(&self.stats.legacy_script_detected);
            tracing::info!("legacy script handling started");
        }
        let languages = languages.unwrap_or(&self.settings.languages);

        let mut legacy_image: Option<DynamicImage> = None;
        let mut last = None;

        for strategy in strategies {
            let (result, accepted) = match strategy {
                Strategy::DetailEngine {
                    input,
                    min_confidence,
                    legacy_script,
                } => {
                    let Some(detail) = &self.detail else {
                        continue;
                    };
                    let request = OcrRequest::new(
                        self.settings.detail_languages.join("+"),
                        RecognitionPreset::Standard,
                    );
                    let result = match input {
                        AttemptInput::Original => {
                            self.attempt(detail.as_ref(), image, &request, text_type, false, legacy_script)
                                .await
                        }
                        AttemptInput::LegacyPreprocessed => {
                            let prepared = legacy_image
                                .get_or_insert_with(|| self.prepare(image, PreprocessMode::Handwriting));
                            self.attempt(detail.as_ref(), prepared, &request, text_type, true, legacy_script)
                                .await
                        }
                    };
                    let accepted = result.confidence > min_confidence;
                    if !accepted {
                        tracing::debug!(
                            confidence = result.confidence,
                            min_confidence,
                            "detail ocr below threshold; falling back"
                        );
                    }
                    (result, accepted)
                }
                Strategy::LegacyFallback => {
                    let request = OcrRequest::new(
                        self.settings.legacy_languages.clone(),
                        RecognitionPreset::Handwriting,
                    );
                    let prepared =
                        legacy_image.get_or_insert_with(|| self.prepare(image, PreprocessMode::Handwriting));
                    let result = self
                        .attempt(self.baseline.as_ref(), prepared, &request, text_type, true, true)
                        .await;
                    (result, true)
                }
                Strategy::BaselineEngine { mode } => {
                    let request = OcrRequest::new(languages, RecognitionPreset::Standard);
                    let prepared = self.prepare(image, mode);
                    let result = self
                        .attempt(self.baseline.as_ref(), &prepared, &request, text_type, true, false)
                        .await;
                    (result, true)
                }
            };

            if accepted {
                self.record_accepted(&result);
                return result;
            }
            last = Some(result);
        }

        last.unwrap_or_else(|| OcrResult::failed(OcrMethod::Baseline, text_type, "no ocr strategy applied"))
    }

    /// Baseline engine on an explicitly chosen preprocessing mode, skipping classification.
    pub async fn extract_with_mode(
        &self,
        image: &DynamicImage,
        mode: PreprocessMode,
        preset: RecognitionPreset,
        languages: Option<&str>,
    ) -> OcrResult {
        OcrStats::bump(&self.stats.total_processed);
        let text_type = match mode {
            PreprocessMode::Historical => TextType::Historical,
            PreprocessMode::Handwriting => TextType::Handwriting,
            PreprocessMode::Standard | PreprocessMode::LowQuality => TextType::Standard,
        };
        let request = OcrRequest::new(languages.unwrap_or(&self.settings.languages), preset);
        let prepared = self.prepare(image, mode);
        let result = self
            .attempt(self.baseline.as_ref(), &prepared, &request, text_type, true, false)
            .await;
        self.record_accepted(&result);
        result
    }

    fn prepare(&self, image: &DynamicImage, mode: PreprocessMode) -> DynamicImage {
        OcrStats::bump(&self.stats.preprocessing_applied);
        DynamicImage::ImageLuma8(preprocess(image, mode))
    }

    async fn attempt(
        &self,
        engine: &dyn OcrEngine,
        image: &DynamicImage,
        request: &OcrRequest,
        text_type: TextType,
        preprocessed: bool,
        legacy_script: bool,
    ) -> OcrResult {
        match engine.extract(image, request).await {
            Ok(recognition) => {
                if recognition.gpu_used {
                    OcrStats::bump(&self.stats.gpu_processed);
                }
                OcrResult {
                    text: recognition.text,
                    confidence: recognition.confidence,
                    method: engine.method(),
                    text_type,
                    gpu_used: recognition.gpu_used,
                    is_legacy_script: legacy_script,
                    preprocessed,
                    error: None,
                }
            }
            Err(error) => {
                tracing::warn!(method = ?engine.method(), %error, "ocr engine failed");
                let mut result = OcrResult::failed(engine.method(), text_type, error);
                result.preprocessed = preprocessed;
                result.is_legacy_script = legacy_script;
                result
            }
        }
    }

    fn record_accepted(&self, result: &OcrResult) {
        tracing::info!(
            method = ?result.method,
            text_type = ?result.text_type,
            confidence = result.confidence,
            legacy_script = result.is_legacy_script,
            "ocr result accepted"
        );
    }
}
