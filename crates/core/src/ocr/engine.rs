use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Page-layout assumption handed to the baseline engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionPreset {
    Standard,
    SingleColumn,
    SparseText,
    Handwriting,
}

impl RecognitionPreset {
    pub fn page_segmentation_mode(self) -> u8 {
        match self {
            RecognitionPreset::Standard => 3,
            RecognitionPreset::SingleColumn => 6,
            RecognitionPreset::SparseText => 11,
            RecognitionPreset::Handwriting => 13,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OcrRequest {
    /// Engine language string, e.g. `deu+eng`.
    pub languages: String,
    pub preset: RecognitionPreset,
}

impl OcrRequest {
    pub fn new(languages: impl Into<String>, preset: RecognitionPreset) -> Self {
        Self {
            languages: languages.into(),
            preset,
        }
    }
}

/// Raw engine output before the cascade annotates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    pub text: String,
    /// 0-100.
    pub confidence: f32,
    pub gpu_used: bool,
}

/// Page images produced by a rasterizer. The backing directory, when there is
/// one, lives as long as this value.
#[derive(Debug)]
pub struct RasterizedPages {
    pages: Vec<PathBuf>,
    _workdir: Option<TempDir>,
}

impl RasterizedPages {
    pub fn new(pages: Vec<PathBuf>, workdir: Option<TempDir>) -> Self {
        Self {
            pages,
            _workdir: workdir,
        }
    }

    pub fn pages(&self) -> &[PathBuf] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn workdir(&self) -> Option<&Path> {
        self._workdir.as_ref().map(TempDir::path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_map_to_segmentation_modes() {
        assert_eq!(RecognitionPreset::Standard.page_segmentation_mode(), 3);
        assert_eq!(RecognitionPreset::SingleColumn.page_segmentation_mode(), 6);
        assert_eq!(RecognitionPreset::SparseText.page_segmentation_mode(), 11);
        assert_eq!(RecognitionPreset::Handwriting.page_segmentation_mode(), 13);
    }
}
