use super::OcrCascade;
use crate::OcrResult;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Outcome for one image of a batch.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum BatchItem {
    Recognized {
        #[serde(flatten)]
        result: OcrResult,
        file_path: String,
        file_name: String,
    },
    /// The image could not be opened or decoded.
    Failed {
        file_path: String,
        error: String,
        text: String,
        confidence: f32,
    },
}

impl BatchItem {
    pub fn file_path(&self) -> &str {
        match self {
            BatchItem::Recognized { file_path, .. } | BatchItem::Failed { file_path, .. } => file_path,
        }
    }
}

/// Runs the cascade over many images in groups, optionally writing one
/// `<stem>.json` per recognized image.
pub struct BatchOcr<'a> {
    cascade: &'a OcrCascade,
    batch_size: usize,
}

impl<'a> BatchOcr<'a> {
    pub fn new(cascade: &'a OcrCascade) -> Self {
        Self {
            cascade,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn process(&self, paths: &[PathBuf], output_dir: Option<&Path>) -> Vec<BatchItem> {
        let mut items = Vec::with_capacity(paths.len());

        for (number, group) in paths.chunks(self.batch_size).enumerate() {
            info!(batch = number + 1, images = group.len(), "processing ocr batch");

            for path in group {
                let file_path = path.to_string_lossy().to_string();
                let item = match image::open(path) {
                    Ok(picture) => BatchItem::Recognized {
                        result: self.cascade.extract_auto(&picture, None, None).await,
                        file_path,
                        file_name: path
                            .file_name()
                            .map(|name| name.to_string_lossy().to_string())
                            .unwrap_or_default(),
                    },
                    Err(open_error) => {
                        error!(path = %path.display(), error = %open_error, "image could not be opened");
                        BatchItem::Failed {
                            file_path,
                            error: open_error.to_string(),
                            text: String::new(),
                            confidence: 0.0,
                        }
                    }
                };

                if let (Some(dir), BatchItem::Recognized { .. }) = (output_dir, &item) {
                    if let Err(write_error) = write_item(dir, path, &item).await {
                        warn!(path = %path.display(), error = %write_error, "ocr result not saved");
                    }
                }
                items.push(item);
            }
        }

        items
    }
}

async fn write_item(dir: &Path, image: &Path, item: &BatchItem) -> std::io::Result<()> {
    let stem = image
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let json = serde_json::to_string_pretty(item)?;
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(format!("{stem}.json")), json).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ocr::{OcrRequest, Recognition},
        traits::OcrEngine,
        OcrError, OcrMethod, OcrSettings,
    };
    use async_trait::async_trait;
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::Arc;
    use tempfile::tempdir;

    struct FixedEngine;

    #[async_trait]
    impl OcrEngine for FixedEngine {
        fn method(&self) -> OcrMethod {
            OcrMethod::Baseline
        }

        async fn extract(&self, _image: &DynamicImage, _request: &OcrRequest) -> Result<Recognition, OcrError> {
            Ok(Recognition {
                text: "Protokoll der Sitzung".to_string(),
                confidence: 87.5,
                gpu_used: false,
            })
        }
    }

    #[tokio::test]
    async fn batches_write_one_json_per_recognized_image() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let scan = dir.path().join("scan.png");
        GrayImage::from_pixel(40, 40, Luma([230])).save(&scan)?;
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"not an image")?;
        let second = dir.path().join("second.png");
        GrayImage::from_pixel(40, 40, Luma([10])).save(&second)?;

        let cascade = OcrCascade::new(Arc::new(FixedEngine), None, OcrSettings::default());
        let output = dir.path().join("results");
        let items = BatchOcr::new(&cascade)
            .with_batch_size(2)
            .process(&[scan.clone(), broken.clone(), second], Some(&output))
            .await;

        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], BatchItem::Recognized { result, .. } if result.text == "Protokoll der Sitzung"));
        assert!(matches!(&items[1], BatchItem::Failed { text, confidence, .. } if text.is_empty() && *confidence == 0.0));
        assert_eq!(items[1].file_path(), broken.to_string_lossy());
        assert_eq!(cascade.snapshot().total_processed, 2);

        let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(output.join("scan.json"))?)?;
        assert_eq!(saved["file_name"], "scan.png");
        assert_eq!(saved["file_path"], &*scan.to_string_lossy());
        assert_eq!(saved["text"], "Protokoll der Sitzung");
        assert_eq!(saved["confidence"], 87.5);
        assert!(output.join("second.json").exists());
        assert!(!output.join("broken.json").exists());
        Ok(())
    }

    #[test]
    fn failed_items_serialize_without_result_fields() -> Result<(), serde_json::Error> {
        let item = BatchItem::Failed {
            file_path: "/data/x.png".into(),
            error: "format error".into(),
            text: String::new(),
            confidence: 0.0,
        };
        let value = serde_json::to_value(&item)?;
        assert_eq!(
            value,
            serde_json::json!({"file_path": "/data/x.png", "error": "format error", "text": "", "confidence": 0.0})
        );
        Ok(())
    }
}
