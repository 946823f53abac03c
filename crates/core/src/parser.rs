use crate::{traits::ContentParser, Metadata, ParseError, ParsedContent};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::path::Path;

const CONTENT_KEY: &str = "X-TIKA:content";

/// Apache Tika server client using the recursive metadata endpoint.
#[derive(Clone)]
pub struct TikaParser {
    client: Client,
    endpoint: String,
}

impl TikaParser {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ContentParser for TikaParser {
    async fn parse(&self, path: &Path) -> Result<ParsedContent, ParseError> {
        let bytes = tokio::fs::read(path).await?;

        let mut request = self
            .client
            .put(format!("{}/rmeta/text", self.endpoint))
            .header("Accept", "application/json")
            .body(bytes);
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            request = request.header("Content-Disposition", format!("attachment; filename={name}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(ParseError::Service {
                status: status.as_u16(),
                details,
            });
        }

        let payload: Value = response.json().await?;
        payload_to_content(payload)
    }
}

/// The first object of the `rmeta` array describes the container document;
/// embedded resources that follow are ignored.
pub fn payload_to_content(payload: Value) -> Result<ParsedContent, ParseError> {
    let Value::Array(items) = payload else {
        return Err(ParseError::Payload("expected a JSON array".to_string()));
    };
    let Some(first) = items.into_iter().next() else {
        return Ok(ParsedContent::default());
    };
    let Value::Object(mut fields) = first else {
        return Err(ParseError::Payload("expected a JSON object per document".to_string()));
    };

    let content = match fields.remove(CONTENT_KEY) {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };
    let metadata: Metadata = fields;

    Ok(ParsedContent { content, metadata })
}
