use super::{OcrRequest, Recognition};
use crate::{traits::OcrEngine, OcrError, OcrMethod};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::path::PathBuf;
use tokio::process::Command;

/// Baseline engine: runs the `tesseract` binary on a temporary PNG and reads its TSV output.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn method(&self) -> OcrMethod {
        OcrMethod::Baseline
    }

    async fn extract(
        &self,
        image: &DynamicImage,
        request: &OcrRequest,
    ) -> Result<Recognition, OcrError> {
        let input = tempfile::Builder::new()
            .prefix("docfacet-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(input.path(), ImageFormat::Png)?;

        let output = Command::new(&self.binary)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&request.languages)
            .arg("--psm")
            .arg(request.preset.page_segmentation_mode().to_string())
            .arg("--oem")
            .arg("3")
            .arg("tsv")
            .output()
            .await?;

        if !output.status.success() {
            return Err(OcrError::EngineFailed(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Rebuilds text and mean word confidence from tesseract TSV output.
/// Words on one line are joined by spaces; a new paragraph or block starts with a blank line.
pub fn parse_tsv(raw: &str) -> Recognition {
    let mut text = String::new();
    let mut confidences = Vec::new();
    let mut previous: Option<(&str, &str, &str, &str)> = None;

    for line in raw.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 || fields[0] == "level" {
            continue;
        }

        let confidence = fields[10].trim().parse::<f32>().unwrap_or(-1.0);
        if confidence >= 0.0 {
            confidences.push(confidence);
        }

        let word = fields.get(11).map(|value| value.trim()).unwrap_or_default();
        if fields[0] != "5" || word.is_empty() {
            continue;
        }

        let key = (fields[1], fields[2], fields[3], fields[4]);
        match previous {
            Some(last) if last == key => text.push(' '),
            Some((page, block, paragraph, _)) if (page, block, paragraph) == (key.0, key.1, key.2) => {
                text.push('\n')
            }
            Some(_) => text.push_str("\n\n"),
            None => {}
        }
        text.push_str(word);
        previous = Some(key);
    }

    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };

    Recognition {
        text,
        confidence,
        gpu_used: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn tsv_words_are_grouped_by_line_and_paragraph() {
        let raw = [
            HEADER,
            "1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t",
            "5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t90\tSehr",
            "5\t1\t1\t1\t1\t2\t0\t0\t10\t10\t80\tgeehrte",
            "5\t1\t1\t1\t2\t1\t0\t0\t10\t10\t70\tDamen",
            "5\t1\t2\t1\t1\t1\t0\t0\t10\t10\t60\tGruss",
        ]
        .join("\n");

        let recognition = parse_tsv(&raw);
        assert_eq!(recognition.text, "Sehr geehrte\nDamen\n\nGruss");
        assert!((recognition.confidence - 75.0).abs() < f32::EPSILON);
        assert!(!recognition.gpu_used);
    }

    #[test]
    fn empty_output_has_zero_confidence() {
        let recognition = parse_tsv(HEADER);
        assert!(recognition.text.is_empty());
        assert_eq!(recognition.confidence, 0.0);
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let engine = TesseractEngine::new("/nonexistent/docfacet-tesseract");
        let image = DynamicImage::new_luma8(4, 4);
        let request = OcrRequest::new("eng", crate::ocr::RecognitionPreset::Standard);
        let result = engine.extract(&image, &request).await;
        assert!(matches!(result, Err(OcrError::Io(_))));
    }
}
