use crate::{
    traits::{DocumentIndex, PageIndex},
    DocumentRecord, SearchError, WebPageRecord,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// In-process index keyed by content hash, used for dry runs.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    documents: RwLock<HashMap<String, DocumentRecord>>,
    pages: RwLock<HashMap<String, WebPageRecord>>,
    writes: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `upsert_document` calls received, including replacements.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|documents| documents.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, hash: &str) -> Option<DocumentRecord> {
        self.documents
            .read()
            .ok()
            .and_then(|documents| documents.get(hash).cloned())
    }

    pub fn page_count(&self) -> usize {
        self.pages.read().map(|pages| pages.len()).unwrap_or(0)
    }

    pub fn page(&self, url_hash: &str) -> Option<WebPageRecord> {
        self.pages.read().ok().and_then(|pages| pages.get(url_hash).cloned())
    }
}

fn poisoned() -> SearchError {
    SearchError::Request("memory index lock poisoned".to_string())
}

#[async_trait]
impl DocumentIndex for MemoryIndex {
    async fn exists_by_hash(&self, hash: &str) -> Result<bool, SearchError> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents.contains_key(hash))
    }

    async fn upsert_document(&self, record: &DocumentRecord) -> Result<(), SearchError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut documents = self.documents.write().map_err(|_| poisoned())?;
        documents.insert(record.hash.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl PageIndex for MemoryIndex {
    async fn page_exists(&self, url_hash: &str) -> Result<bool, SearchError> {
        let pages = self.pages.read().map_err(|_| poisoned())?;
        Ok(pages.contains_key(url_hash))
    }

    async fn upsert_page(&self, page: &WebPageRecord) -> Result<(), SearchError> {
        let mut pages = self.pages.write().map_err(|_| poisoned())?;
        pages.insert(page.url_hash.clone(), page.clone());
        Ok(())
    }
}
