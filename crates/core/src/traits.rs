use crate::{
    ocr::{OcrRequest, RasterizedPages, Recognition},
    DocumentRecord, OcrError, OcrMethod, ParseError, ParsedContent, SearchError, WebPageRecord,
};
use async_trait::async_trait;
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;

/// Destination for finished records. Records are keyed by content hash.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn exists_by_hash(&self, hash: &str) -> Result<bool, SearchError>;

    /// Writes (or replaces) the record whose id is `record.hash`.
    async fn upsert_document(&self, record: &DocumentRecord) -> Result<(), SearchError>;
}

#[async_trait]
impl<T: DocumentIndex + ?Sized> DocumentIndex for Arc<T> {
    async fn exists_by_hash(&self, hash: &str) -> Result<bool, SearchError> {
        (**self).exists_by_hash(hash).await
    }

    async fn upsert_document(&self, record: &DocumentRecord) -> Result<(), SearchError> {
        (**self).upsert_document(record).await
    }
}

/// Destination for crawled pages, keyed by URL hash.
#[async_trait]
pub trait PageIndex: Send + Sync {
    async fn page_exists(&self, url_hash: &str) -> Result<bool, SearchError>;

    async fn upsert_page(&self, page: &WebPageRecord) -> Result<(), SearchError>;
}

#[async_trait]
impl<T: PageIndex + ?Sized> PageIndex for Arc<T> {
    async fn page_exists(&self, url_hash: &str) -> Result<bool, SearchError> {
        (**self).page_exists(url_hash).await
    }

    async fn upsert_page(&self, page: &WebPageRecord) -> Result<(), SearchError> {
        (**self).upsert_page(page).await
    }
}

/// Generic text and metadata extraction for any file type.
#[async_trait]
pub trait ContentParser: Send + Sync {
    async fn parse(&self, path: &Path) -> Result<ParsedContent, ParseError>;
}

#[async_trait]
impl<T: ContentParser + ?Sized> ContentParser for Arc<T> {
    async fn parse(&self, path: &Path) -> Result<ParsedContent, ParseError> {
        (**self).parse(path).await
    }
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn method(&self) -> OcrMethod;

    async fn extract(
        &self,
        image: &DynamicImage,
        request: &OcrRequest,
    ) -> Result<Recognition, OcrError>;
}

/// Renders PDF pages to image files, in page order.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(&self, pdf: &Path, dpi: u32) -> Result<RasterizedPages, OcrError>;
}
