use crate::{
    config::FacetDefinition,
    traits::{DocumentIndex, PageIndex},
    DocumentRecord, FacetSource, SearchError, WebPageRecord,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

const BACKEND: &str = "opensearch";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FacetBucket {
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FacetCounts {
    pub id: String,
    pub label: String,
    pub buckets: Vec<FacetBucket>,
}

pub struct OpenSearchStore {
    client: Arc<Client>,
    endpoint: String,
    index_name: String,
    credentials: Option<(String, String)>,
}

impl OpenSearchStore {
    pub fn new(endpoint: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint, index_name)
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            client: Arc::new(client),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            index_name: index_name.into(),
            credentials: None,
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Rejects endpoints that are not absolute http(s) URLs.
    pub fn parse_endpoint(raw: &str) -> Result<Url, SearchError> {
        let endpoint = Url::parse(raw.trim())?;
        match endpoint.scheme() {
            "http" | "https" => Ok(endpoint),
            other => Err(SearchError::Request(format!("unsupported endpoint scheme: {other}"))),
        }
    }

    /// Clusters with self-signed certificates need `accept_invalid_certs`.
    pub fn http_client(accept_invalid_certs: bool) -> Result<Client, SearchError> {
        Ok(Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?)
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}/{}{}", self.endpoint, self.index_name, path));
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    pub async fn ensure_index(&self) -> Result<(), SearchError> {
        self.ensure_index_with(&index_mapping()).await
    }

    /// Creates the index with the crawled-page mapping when it is missing.
    pub async fn ensure_web_index(&self) -> Result<(), SearchError> {
        self.ensure_index_with(&web_page_mapping()).await
    }

    async fn ensure_index_with(&self, mapping: &Value) -> Result<(), SearchError> {
        let response = self.request(Method::HEAD, "").send().await?;

        if response.status() == StatusCode::OK {
            debug!(index = %self.index_name, "index already exists");
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response.status()));
        }

        let response = self.request(Method::PUT, "").json(mapping).send().await?;

        if !response.status().is_success() {
            return Err(SearchError::Request(format!(
                "open-search index setup failed with {}",
                response.status()
            )));
        }

        info!(index = %self.index_name, "created open-search index");
        Ok(())
    }

    pub async fn facet_counts(&self, facets: &[&FacetDefinition]) -> Result<Vec<FacetCounts>, SearchError> {
        let response = self
            .request(Method::POST, "/_search")
            .json(&facet_query(facets))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let body: Value = response.json().await?;
        Ok(parse_facet_buckets(facets, &body))
    }

    /// Realtime lookup by document id, so a write is visible before the next refresh.
    async fn document_exists(&self, id: &str) -> Result<bool, SearchError> {
        let response = self.request(Method::HEAD, &format!("/_doc/{id}")).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            // Also returned when the index itself is missing.
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(backend_error(status)),
        }
    }

    async fn put_document<T: Serialize + Sync>(&self, id: &str, body: &T) -> Result<(), SearchError> {
        let response = self
            .request(Method::PUT, &format!("/_doc/{id}"))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentIndex for OpenSearchStore {
    async fn exists_by_hash(&self, hash: &str) -> Result<bool, SearchError> {
        self.document_exists(hash).await
    }

    async fn upsert_document(&self, record: &DocumentRecord) -> Result<(), SearchError> {
        self.put_document(&record.hash, record).await
    }
}

#[async_trait]
impl PageIndex for OpenSearchStore {
    async fn page_exists(&self, url_hash: &str) -> Result<bool, SearchError> {
        self.document_exists(url_hash).await
    }

    async fn upsert_page(&self, page: &WebPageRecord) -> Result<(), SearchError> {
        self.put_document(&page.url_hash, page).await
    }
}

fn backend_error(status: StatusCode) -> SearchError {
    SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details: status.to_string(),
    }
}

pub fn index_mapping() -> Value {
    let german_text = json!({"type": "text", "analyzer": "german_analyzer"});
    let keyword = json!({"type": "keyword"});
    let date = json!({"type": "date"});

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1,
            "analysis": {
                "analyzer": {
                    "german_analyzer": {"type": "standard", "stopwords": "_german_"},
                    "english_analyzer": {"type": "standard", "stopwords": "_english_"}
                }
            }
        },
        "mappings": {
            "properties": {
                "title": {
                    "type": "text",
                    "analyzer": "german_analyzer",
                    "fields": {"keyword": keyword}
                },
                "content": german_text,
                "ocr_text": german_text,
                "file_path": keyword,
                "file_name": {"type": "text", "fields": {"keyword": keyword}},
                "file_extension": keyword,
                "mime_type": keyword,
                "file_type_category": keyword,
                "file_size": {"type": "long"},
                "created_date": date,
                "modified_date": date,
                "indexed_date": date,
                "hash": keyword,
                "metadata": {"type": "object", "enabled": true},
                "has_ocr": {"type": "boolean"},
                "language": keyword,
                "page_count": {"type": "integer"},
                "source_directory": keyword,
                "concepts": {
                    "type": "nested",
                    "properties": {
                        "uri": keyword,
                        "label": {"type": "text", "fields": {"keyword": keyword}},
                        "scheme": keyword,
                        "match_type": keyword,
                        "confidence": {"type": "float"}
                    }
                },
                "document_type": keyword,
                "categories": keyword,
                "tags": keyword,
                "processing_errors": {
                    "properties": {
                        "kind": keyword,
                        "message": {"type": "text"}
                    }
                }
            }
        }
    })
}

pub fn web_page_mapping() -> Value {
    let keyword = json!({"type": "keyword"});
    let html_text = json!({"type": "text", "analyzer": "html_analyzer"});
    let date = json!({"type": "date"});

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1,
            "analysis": {
                "analyzer": {
                    "html_analyzer": {"type": "standard", "stopwords": "_german_"}
                }
            }
        },
        "mappings": {
            "properties": {
                "url": keyword,
                "url_hash": keyword,
                "title": {
                    "type": "text",
                    "analyzer": "html_analyzer",
                    "fields": {"keyword": keyword}
                },
                "content": html_text,
                "description": {"type": "text"},
                "keywords": keyword,
                "author": {"type": "text"},
                "links": keyword,
                "domain": keyword,
                "language": keyword,
                "crawled_date": date,
                "last_modified": date
            }
        }
    })
}

fn terms_aggregation(facet: &FacetDefinition) -> Value {
    json!({"terms": {"field": facet.field, "size": facet.size}})
}

/// Nested facets wrap their terms aggregation under `<id>_terms`.
pub fn facet_query(facets: &[&FacetDefinition]) -> Value {
    let mut aggregations = Map::new();
    for facet in facets {
        let aggregation = match (&facet.source, &facet.nested_path) {
            (FacetSource::Nested, Some(path)) => {
                let mut inner = Map::new();
                inner.insert(format!("{}_terms", facet.id), terms_aggregation(facet));
                json!({"nested": {"path": path}, "aggs": inner})
            }
            _ => terms_aggregation(facet),
        };
        aggregations.insert(facet.id.clone(), aggregation);
    }

    json!({
        "size": 0,
        "query": {"match_all": {}},
        "aggs": aggregations
    })
}

pub fn parse_facet_buckets(facets: &[&FacetDefinition], response: &Value) -> Vec<FacetCounts> {
    facets
        .iter()
        .filter_map(|facet| {
            let aggregation = response.get("aggregations")?.get(&facet.id)?;
            let aggregation = match facet.source {
                FacetSource::Nested => aggregation.get(format!("{}_terms", facet.id))?,
                _ => aggregation,
            };
            let buckets = aggregation
                .get("buckets")
                .and_then(Value::as_array)
                .map(|buckets| buckets.iter().filter_map(bucket_entry).collect())
                .unwrap_or_default();

            Some(FacetCounts {
                id: facet.id.clone(),
                label: facet.label.clone(),
                buckets,
            })
        })
        .collect()
}

fn bucket_entry(bucket: &Value) -> Option<FacetBucket> {
    let key = match bucket.get("key_as_string").and_then(Value::as_str) {
        Some(key) => key.to_string(),
        None => match bucket.get("key")? {
            Value::String(key) => key.clone(),
            other => other.to_string(),
        },
    };
    let count = bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0);
    Some(FacetBucket { key, count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FacetConfig;

    #[test]
    fn mapping_declares_nested_concepts() {
        let mapping = index_mapping();
        assert_eq!(
            mapping.pointer("/mappings/properties/concepts/type"),
            Some(&json!("nested"))
        );
        assert_eq!(
            mapping.pointer("/mappings/properties/hash/type"),
            Some(&json!("keyword"))
        );
        assert_eq!(
            mapping.pointer("/mappings/properties/content/analyzer"),
            Some(&json!("german_analyzer"))
        );
    }

    #[test]
    fn facet_query_wraps_nested_facets() {
        let config = FacetConfig::default();
        let facets = config.enabled();
        let query = facet_query(&facets);

        assert_eq!(
            query.pointer("/aggs/document_type/terms/field"),
            Some(&json!("document_type"))
        );
        assert_eq!(
            query.pointer("/aggs/concepts/nested/path"),
            Some(&json!("concepts"))
        );
        assert_eq!(
            query.pointer("/aggs/concepts/aggs/concepts_terms/terms/field"),
            Some(&json!("concepts.label.keyword"))
        );
        assert_eq!(query.pointer("/aggs/concepts/aggs/concepts_terms/terms/size"), Some(&json!(50)));
    }

    #[test]
    fn buckets_are_read_from_flat_and_nested_aggregations() {
        let config = FacetConfig::default();
        let facets = config.enabled();
        let response = json!({
            "aggregations": {
                "document_type": {"buckets": [{"key": "Invoice type", "doc_count": 3}]},
                "concepts": {
                    "doc_count": 9,
                    "concepts_terms": {"buckets": [
                        {"key": "Vertrag", "doc_count": 5},
                        {"key": "Rechnung", "doc_count": 4}
                    ]}
                },
                "language": {"buckets": [{"key": 1, "key_as_string": "true", "doc_count": 2}]}
            }
        });

        let counts = parse_facet_buckets(&facets, &response);
        let ids: Vec<_> = counts.iter().map(|facet| facet.id.as_str()).collect();
        assert_eq!(ids, vec!["document_type", "concepts", "language"]);
        assert_eq!(counts[1].buckets[0], FacetBucket { key: "Vertrag".into(), count: 5 });
        assert_eq!(counts[1].buckets.len(), 2);
        assert_eq!(counts[2].buckets[0].key, "true");
    }

    #[test]
    fn endpoint_trailing_slash_is_dropped() {
        let store = OpenSearchStore::new("https://localhost:9200/", "documents").with_basic_auth("admin", "secret");
        assert_eq!(store.endpoint, "https://localhost:9200");
        assert_eq!(store.index_name(), "documents");
    }

    async fn serve(router: axum::Router) -> Result<String, Box<dyn std::error::Error>> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(format!("http://{address}"))
    }

    #[tokio::test]
    async fn hash_lookup_uses_document_head() -> Result<(), Box<dyn std::error::Error>> {
        use axum::{http::StatusCode as Status, routing::get, Router};

        let router = Router::new()
            .route("/documents/_doc/known", get(|| async { Status::OK }))
            .route("/documents/_doc/broken", get(|| async { Status::INTERNAL_SERVER_ERROR }));
        let store = OpenSearchStore::new(serve(router).await?, "documents");

        assert!(store.exists_by_hash("known").await?);
        assert!(!store.exists_by_hash("unknown").await?);
        assert!(matches!(
            store.exists_by_hash("broken").await,
            Err(SearchError::BackendResponse { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn pages_are_written_under_their_url_hash() -> Result<(), Box<dyn std::error::Error>> {
        use axum::{http::StatusCode as Status, routing::put, Router};
        use chrono::Utc;

        let router = Router::new().route("/web_pages/_doc/abc123", put(|| async { Status::CREATED }));
        let store = OpenSearchStore::new(serve(router).await?, "web_pages");
        let page = WebPageRecord {
            url: "https://example.org/".into(),
            url_hash: "abc123".into(),
            title: "Start".into(),
            content: "Willkommen".into(),
            description: String::new(),
            keywords: Vec::new(),
            author: String::new(),
            links: Vec::new(),
            domain: "example.org".into(),
            crawled_date: Utc::now(),
            last_modified: None,
            language: "unknown".into(),
        };

        store.upsert_page(&page).await?;
        let mut other = page.clone();
        other.url_hash = "elsewhere".into();
        assert!(store.upsert_page(&other).await.is_err());
        Ok(())
    }

    #[test]
    fn web_mapping_keys_pages_by_url_hash() {
        let mapping = web_page_mapping();
        assert_eq!(
            mapping.pointer("/mappings/properties/url_hash/type"),
            Some(&json!("keyword"))
        );
        assert_eq!(
            mapping.pointer("/mappings/properties/content/analyzer"),
            Some(&json!("html_analyzer"))
        );
        assert_eq!(
            mapping.pointer("/settings/analysis/analyzer/html_analyzer/stopwords"),
            Some(&json!("_german_"))
        );
    }

    #[test]
    fn endpoint_must_be_http() {
        assert!(OpenSearchStore::parse_endpoint("https://search.internal:9200").is_ok());
        assert!(matches!(
            OpenSearchStore::parse_endpoint("not a url"),
            Err(SearchError::Url(_))
        ));
        assert!(matches!(
            OpenSearchStore::parse_endpoint("ftp://search.internal"),
            Err(SearchError::Request(_))
        ));
    }
}
