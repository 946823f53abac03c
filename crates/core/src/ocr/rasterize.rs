use super::RasterizedPages;
use crate::{traits::PageRasterizer, OcrError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Renders PDF pages with poppler's `pdftoppm` into a private temporary directory.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: PathBuf,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, pdf: &Path, dpi: u32) -> Result<RasterizedPages, OcrError> {
        let workdir = tempfile::Builder::new().prefix("docfacet-pages-").tempdir()?;
        let prefix = workdir.path().join("page");

        let output = Command::new(&self.binary)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg(pdf)
            .arg(&prefix)
            .output()
            .await?;

        if !output.status.success() {
            return Err(OcrError::Rasterize(format!(
                "{} failed for {}: {}",
                self.binary.display(),
                pdf.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut pages = Vec::new();
        for entry in std::fs::read_dir(workdir.path())? {
            let path = entry?.path();
            if let Some(number) = page_number(&path) {
                pages.push((number, path));
            }
        }
        pages.sort_by_key(|(number, _)| *number);

        tracing::debug!(pdf = %pdf.display(), pages = pages.len(), dpi, "rasterized pdf");
        Ok(RasterizedPages::new(
            pages.into_iter().map(|(_, path)| path).collect(),
            Some(workdir),
        ))
    }
}

/// Extracts `N` from `page-N.png` (pdftoppm zero-pads N to the page count's width).
fn page_number(path: &Path) -> Option<u32> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("png") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (_, digits) = stem.rsplit_once('-')?;
    digits.parse().ok()
}
