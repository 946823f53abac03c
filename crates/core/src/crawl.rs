//! HTML page crawling into a page index keyed by URL hash.

use crate::{metadata::detect_language, traits::PageIndex, CrawlError, WebPageRecord};
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "docfacet-crawler/0.1";
pub const DEFAULT_MAX_PAGES_PER_SITE: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const EXCLUDED_EXTENSIONS: [&str; 6] = [".pdf", ".jpg", ".png", ".gif", ".zip", ".exe"];
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "nav", "footer"];

/// Lowercase hex SHA-256 of the URL string.
pub fn url_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    pub title: String,
    pub content: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub author: String,
    /// `href` values as written in the page.
    pub links: Vec<String>,
}

/// Title, meta tags, links and the visible text of the main content.
///
/// Text comes from `<main>`, else `<article>`, else `<body>`, skipping
/// scripts, styles, navigation and footers.
pub fn extract_html(html: &str) -> ExtractedPage {
    let document = Html::parse_document(html);
    let mut page = ExtractedPage {
        title: first(&document, "title")
            .map(|title| title.text().collect::<String>().trim().to_string())
            .unwrap_or_default(),
        ..ExtractedPage::default()
    };

    for meta in select_all(&document, "meta[name]") {
        let element = meta.value();
        let content = element.attr("content").unwrap_or_default().trim();
        match element.attr("name").map(str::to_ascii_lowercase).as_deref() {
            Some("description") => page.description = content.to_string(),
            Some("author") => page.author = content.to_string(),
            Some("keywords") => {
                page.keywords = content
                    .split(',')
                    .map(str::trim)
                    .filter(|keyword| !keyword.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }

    let root = first(&document, "main")
        .or_else(|| first(&document, "article"))
        .or_else(|| first(&document, "body"));
    if let Some(root) = root {
        page.content = visible_text(root);
    }

    page.links = select_all(&document, "a[href]")
        .filter_map(|link| link.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
        .collect();

    page
}

fn first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    let found = document.select(&selector).next();
    found
}

fn select_all<'a>(document: &'a Html, css: &str) -> impl Iterator<Item = ElementRef<'a>> {
    let elements: Vec<ElementRef<'a>> = match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    };
    elements.into_iter()
}

fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| SKIPPED_ELEMENTS.contains(&element.name()))
        });
        let trimmed = text.trim();
        if !hidden && !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    parts.join(" ")
}

/// `host[:port]` of the URL.
fn authority(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

/// http(s) links on `base_domain` (when given) that do not point at media files.
pub fn is_crawlable(url: &Url, base_domain: Option<&str>) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    if let Some(domain) = base_domain {
        if authority(url) != domain {
            return false;
        }
    }
    let lowered = url.as_str().to_ascii_lowercase();
    !EXCLUDED_EXTENSIONS.iter().any(|extension| lowered.ends_with(extension))
}

/// One line of a URL list file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlEntry {
    Page(String),
    /// Written as `<base>/*`: crawl the site from `base`.
    Site(String),
}

/// Blank lines and `#` comments are skipped.
pub fn parse_url_list(contents: &str) -> Vec<UrlEntry> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.strip_suffix("/*") {
            Some(base) => UrlEntry::Site(base.to_string()),
            None => UrlEntry::Page(line.to_string()),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Indexed { links: Vec<String> },
    AlreadyVisited,
    AlreadyIndexed,
    NotHtml,
    Failed(String),
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CrawlSummary {
    pub entries: usize,
    pub pages_indexed: usize,
    pub failed: usize,
}

pub struct WebCrawler<I> {
    client: Client,
    index: I,
    user_agent: String,
    visited: HashSet<String>,
}

impl<I: PageIndex> WebCrawler<I> {
    pub fn new(client: Client, index: I) -> Self {
        Self {
            client,
            index,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            visited: HashSet::new(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Fetches one page and indexes it unless its hash is already stored.
    /// A URL is fetched at most once per crawler.
    pub async fn crawl_page(&mut self, url: &str) -> PageOutcome {
        if !self.visited.insert(url.to_string()) {
            return PageOutcome::AlreadyVisited;
        }
        info!(url, "crawling page");

        match self.fetch_and_index(url).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(url, %error, "page crawl failed");
                PageOutcome::Failed(error.to_string())
            }
        }
    }

    async fn fetch_and_index(&self, url: &str) -> Result<PageOutcome, CrawlError> {
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, &self.user_agent)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let headers = response.headers();
        let is_html = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("text/html"));
        if !is_html {
            info!(url, "skipping non-html page");
            return Ok(PageOutcome::NotHtml);
        }
        let last_modified = headers
            .get(header::LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| DateTime::parse_from_rfc2822(raw).ok())
            .map(|date| date.with_timezone(&Utc));

        let hash = url_hash(url);
        if self.index.page_exists(&hash).await? {
            info!(url, "page already indexed");
            return Ok(PageOutcome::AlreadyIndexed);
        }

        let extracted = extract_html(&response.text().await?);
        let domain = Url::parse(url).map(|parsed| authority(&parsed))?;
        let language = detect_language(&format!("{} {}", extracted.title, extracted.content))
            .unwrap_or("unknown")
            .to_string();

        let page = WebPageRecord {
            url: url.to_string(),
            url_hash: hash,
            title: extracted.title,
            content: extracted.content,
            description: extracted.description,
            keywords: extracted.keywords,
            author: extracted.author,
            links: extracted.links.clone(),
            domain,
            crawled_date: Utc::now(),
            last_modified,
            language,
        };
        self.index.upsert_page(&page).await?;

        info!(url, "page indexed");
        Ok(PageOutcome::Indexed {
            links: extracted.links,
        })
    }

    /// Breadth-first crawl from `start_url` until `max_pages` pages were
    /// newly indexed. Only links of newly indexed pages are followed.
    pub async fn crawl_website(
        &mut self,
        start_url: &str,
        max_pages: usize,
        same_domain_only: bool,
    ) -> Result<usize, CrawlError> {
        let start = Url::parse(start_url)?;
        let base_domain = same_domain_only.then(|| authority(&start));
        let mut queue = VecDeque::from([start.to_string()]);
        let mut indexed = 0;

        while indexed < max_pages {
            let Some(next) = queue.pop_front() else {
                break;
            };
            if self.visited.contains(&next) {
                continue;
            }
            let PageOutcome::Indexed { links } = self.crawl_page(&next).await else {
                continue;
            };
            indexed += 1;

            let base = Url::parse(&next)?;
            for href in links {
                let Ok(mut target) = base.join(&href) else {
                    debug!(href, "skipping unparsable link");
                    continue;
                };
                target.set_fragment(None);
                if is_crawlable(&target, base_domain.as_deref()) && !self.visited.contains(target.as_str()) {
                    queue.push_back(target.to_string());
                }
            }
        }

        info!(start_url, indexed, "site crawl finished");
        Ok(indexed)
    }

    /// Crawls every entry of a URL list file; `<base>/*` entries crawl
    /// up to `max_pages_per_site` pages of that site.
    pub async fn index_url_list(
        &mut self,
        path: &Path,
        max_pages_per_site: usize,
    ) -> Result<CrawlSummary, CrawlError> {
        let entries = parse_url_list(&tokio::fs::read_to_string(path).await?);
        info!(file = %path.display(), urls = entries.len(), "url list loaded");

        let mut summary = CrawlSummary {
            entries: entries.len(),
            ..CrawlSummary::default()
        };
        for entry in entries {
            match entry {
                UrlEntry::Page(url) => match self.crawl_page(&url).await {
                    PageOutcome::Indexed { .. } => summary.pages_indexed += 1,
                    PageOutcome::Failed(_) => summary.failed += 1,
                    _ => {}
                },
                UrlEntry::Site(base) => match self.crawl_website(&base, max_pages_per_site, true).await {
                    Ok(indexed) => summary.pages_indexed += indexed,
                    Err(error) => {
                        warn!(url = %base, %error, "site crawl failed");
                        summary.failed += 1;
                    }
                },
            }
        }

        info!(
            entries = summary.entries,
            indexed = summary.pages_indexed,
            failed = summary.failed,
            "url list processed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryIndex;
    use axum::{
        http::{header as http_header, StatusCode},
        response::Html as HtmlBody,
        routing::get,
        Json, Router,
    };
    use std::sync::Arc;
    use tempfile::tempdir;

    const ARTICLE: &str = r#"<!doctype html>
<html>
  <head>
    <title> Satzung des Vereins </title>
    <meta name="description" content="Die aktuelle Satzung">
    <meta name="keywords" content="verein, satzung , ,recht">
    <meta name="author" content="Vorstand">
    <script>var tracking = true;</script>
  </head>
  <body>
    <nav><a href="/">Start</a></nav>
    <main>
      <h1>Satzung</h1>
      <p>Der Verein ist gemeinnützig.</p>
      <style>p { color: red; }</style>
      <a href="/mitglieder#liste">Mitglieder</a>
    </main>
    <footer>Impressum</footer>
  </body>
</html>"#;

    #[test]
    fn html_extraction_reads_meta_and_main_text() {
        let page = extract_html(ARTICLE);
        assert_eq!(page.title, "Satzung des Vereins");
        assert_eq!(page.description, "Die aktuelle Satzung");
        assert_eq!(page.keywords, vec!["verein", "satzung", "recht"]);
        assert_eq!(page.author, "Vorstand");
        assert_eq!(page.content, "Satzung Der Verein ist gemeinnützig. Mitglieder");
        assert_eq!(page.links, vec!["/", "/mitglieder#liste"]);
    }

    #[test]
    fn body_is_used_without_main_or_article() {
        let page = extract_html("<html><body><p>Hallo</p><footer>Fuß</footer><script>x()</script></body></html>");
        assert_eq!(page.content, "Hallo");
        assert!(page.title.is_empty());
        assert!(page.keywords.is_empty());
    }

    #[test]
    fn crawlable_links_stay_on_domain_and_skip_media() -> Result<(), Box<dyn std::error::Error>> {
        let domain = Some("example.org");
        assert!(is_crawlable(&Url::parse("https://example.org/about")?, domain));
        assert!(!is_crawlable(&Url::parse("https://other.org/about")?, domain));
        assert!(is_crawlable(&Url::parse("https://other.org/about")?, None));
        assert!(!is_crawlable(&Url::parse("https://example.org/report.PDF")?, domain));
        assert!(!is_crawlable(&Url::parse("mailto:info@example.org")?, None));
        assert!(!is_crawlable(&Url::parse("https://example.org:8443/")?, domain));
        Ok(())
    }

    #[test]
    fn url_lists_mark_whole_sites_with_a_star_suffix() {
        let entries = parse_url_list("# Quellen\n\nhttps://example.org/page\n  https://docs.example.org/*  \n# https://skip.example.org\n");
        assert_eq!(
            entries,
            vec![
                UrlEntry::Page("https://example.org/page".into()),
                UrlEntry::Site("https://docs.example.org".into()),
            ]
        );
    }

    #[test]
    fn url_hash_is_hex_sha256() {
        let hash = url_hash("https://example.org/");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, url_hash("https://example.org/"));
        assert_ne!(hash, url_hash("https://example.org"));
    }

    const HOME: &str = r#"<html><head><title>Start</title></head><body>
        <a href="/about">About</a>
        <a href="/about#team">Team</a>
        <a href="/report.pdf">Report</a>
        <a href="/data">Data</a>
        <a href="/missing">Missing</a>
        <a href="https://elsewhere.example/">Elsewhere</a>
    </body></html>"#;

    const ABOUT: &str = r#"<html><head><title>About</title></head><body>
        <article>The team is small and friendly.</article>
        <a href="/">Home</a>
    </body></html>"#;

    async fn site() -> Result<String, Box<dyn std::error::Error>> {
        let router = Router::new()
            .route("/", get(|| async { HtmlBody(HOME) }))
            .route(
                "/about",
                get(|| async {
                    (
                        [(http_header::LAST_MODIFIED, "Wed, 21 Oct 2015 07:28:00 GMT")],
                        HtmlBody(ABOUT),
                    )
                }),
            )
            .route("/data", get(|| async { Json(vec![1, 2, 3]) }))
            .route("/report.pdf", get(|| async { StatusCode::OK }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(format!("http://{address}"))
    }

    #[tokio::test]
    async fn site_crawl_follows_same_domain_html_links() -> Result<(), Box<dyn std::error::Error>> {
        let base = site().await?;
        let index = Arc::new(MemoryIndex::new());
        let mut crawler = WebCrawler::new(Client::new(), index.clone());

        let indexed = crawler.crawl_website(&base, 10, true).await?;
        assert_eq!(indexed, 2);
        assert_eq!(index.page_count(), 2);
        // start, about, data, missing; the pdf and the foreign host are never fetched
        assert_eq!(crawler.visited_count(), 4);

        let about_url = format!("{base}/about");
        let about = index.page(&url_hash(&about_url)).ok_or("about page missing")?;
        assert_eq!(about.url, about_url);
        assert_eq!(about.title, "About");
        assert_eq!(about.content, "The team is small and friendly.");
        assert_eq!(about.language, "en");
        assert_eq!(about.domain, base.trim_start_matches("http://"));
        assert_eq!(about.last_modified.map(|date| date.to_rfc3339()), Some("2015-10-21T07:28:00+00:00".into()));
        Ok(())
    }

    #[tokio::test]
    async fn site_crawl_stops_at_max_pages() -> Result<(), Box<dyn std::error::Error>> {
        let base = site().await?;
        let index = Arc::new(MemoryIndex::new());
        let mut crawler = WebCrawler::new(Client::new(), index.clone());

        assert_eq!(crawler.crawl_website(&base, 1, true).await?, 1);
        assert_eq!(index.page_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn pages_are_fetched_once_and_indexed_once() -> Result<(), Box<dyn std::error::Error>> {
        let base = site().await?;
        let index = Arc::new(MemoryIndex::new());
        let about = format!("{base}/about");

        let mut crawler = WebCrawler::new(Client::new(), index.clone());
        assert!(matches!(crawler.crawl_page(&about).await, PageOutcome::Indexed { .. }));
        assert_eq!(crawler.crawl_page(&about).await, PageOutcome::AlreadyVisited);
        assert_eq!(crawler.crawl_page(&format!("{base}/data")).await, PageOutcome::NotHtml);
        assert!(matches!(
            crawler.crawl_page(&format!("{base}/missing")).await,
            PageOutcome::Failed(_)
        ));

        let mut fresh = WebCrawler::new(Client::new(), index.clone());
        assert_eq!(fresh.crawl_page(&about).await, PageOutcome::AlreadyIndexed);
        assert_eq!(index.page_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn url_list_mixes_single_pages_and_sites() -> Result<(), Box<dyn std::error::Error>> {
        let base = site().await?;
        let dir = tempdir()?;
        let list = dir.path().join("urls.txt");
        std::fs::write(
            &list,
            format!("# seeds\n\n{base}/about\n{base}/missing\n{base}/*\nnot a url/*\n"),
        )?;

        let index = Arc::new(MemoryIndex::new());
        let mut crawler = WebCrawler::new(Client::new(), index.clone());
        let summary = crawler.index_url_list(&list, DEFAULT_MAX_PAGES_PER_SITE).await?;

        assert_eq!(
            summary,
            CrawlSummary {
                entries: 4,
                pages_indexed: 2,
                failed: 2,
            }
        );
        assert_eq!(index.page_count(), 2);
        Ok(())
    }
}
