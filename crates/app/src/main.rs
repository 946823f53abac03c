use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use docfacet_core::{
    traits::{DocumentIndex, OcrEngine, PageIndex},
    BatchOcr, BatchRunner, ConceptIndex, DetailEndpointConfig, FacetConfig, IndexingConfig,
    IngestionPipeline, MemoryIndex, OcrCascade, OcrSettings, OpenSearchStore, PdftoppmRasterizer,
    RemoteDetailEngine, TesseractEngine, TikaParser, WatchLoop, WebCrawler,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docfacet", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenSearch base URL
    #[arg(long, env = "OPENSEARCH_URL", default_value = "https://localhost:9200")]
    opensearch_url: String,

    #[arg(long, env = "OPENSEARCH_USER", default_value = "admin")]
    opensearch_user: String,

    #[arg(long, env = "OPENSEARCH_PASSWORD", default_value = "", hide_env_values = true)]
    opensearch_password: String,

    /// OpenSearch index name
    #[arg(long, env = "OPENSEARCH_INDEX", default_value = "documents")]
    opensearch_index: String,

    /// Skip TLS certificate verification for OpenSearch.
    #[arg(long, env = "OPENSEARCH_INSECURE", default_value_t = false)]
    insecure: bool,

    /// OpenSearch index for crawled web pages
    #[arg(long, env = "WEB_INDEX", default_value = "web_pages")]
    web_index: String,

    /// Apache Tika server URL
    #[arg(long, env = "TIKA_URL", default_value = "http://localhost:9998")]
    tika_url: String,

    /// Directory holding *.rdf, *.ttl and *.json ontologies.
    #[arg(long, env = "ONTOLOGY_DIR", default_value = "/ontologies")]
    ontology_dir: PathBuf,

    /// Directory holding indexing.json and facets.json.
    #[arg(long, env = "CONFIG_DIR", default_value = "/config")]
    config_dir: PathBuf,

    #[arg(long, env = "OCR_USE_GPU", default_value_t = true, action = ArgAction::Set)]
    ocr_use_gpu: bool,

    #[arg(long, env = "OCR_ENABLE_LEGACY_SCRIPT", default_value_t = true, action = ArgAction::Set)]
    ocr_enable_legacy_script: bool,

    /// Detail OCR service URL; without it only tesseract is used.
    #[arg(long, env = "DETAIL_OCR_URL")]
    detail_ocr_url: Option<String>,

    #[arg(long, env = "DETAIL_OCR_API_KEY", hide_env_values = true)]
    detail_ocr_api_key: Option<String>,

    #[arg(long, env = "TESSERACT_BIN", default_value = "tesseract")]
    tesseract_bin: PathBuf,

    #[arg(long, env = "PDFTOPPM_BIN", default_value = "pdftoppm")]
    pdftoppm_bin: PathBuf,

    /// Keep records in memory instead of writing to OpenSearch.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Index every enabled directory that is not watched.
    Index,
    /// Ingest a single file.
    File {
        #[arg(long)]
        path: PathBuf,
        /// Source directory id stored on the record.
        #[arg(long, default_value = "manual")]
        source: String,
    },
    /// Index configured directories, then watch the watched ones until Ctrl-C.
    Watch,
    /// Run the OCR cascade on one or more images.
    Ocr {
        #[arg(long, required = true, num_args = 1..)]
        image: Vec<PathBuf>,
        /// Write one <stem>.json per recognized image here.
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long, default_value_t = docfacet_core::ocr::batch::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Crawl the pages listed in a URL file; `<url>/*` lines crawl a whole site.
    Urls {
        #[arg(long, env = "URL_FILE", default_value = "/data/urls.txt")]
        file: PathBuf,
        #[arg(long, env = "MAX_PAGES_PER_SITE", default_value_t = docfacet_core::crawl::DEFAULT_MAX_PAGES_PER_SITE)]
        max_pages_per_site: usize,
    },
    /// Crawl one site breadth-first from a start URL.
    Crawl {
        #[arg(long, env = "CRAWL_URL")]
        url: String,
        #[arg(long, env = "MAX_PAGES", default_value_t = 50)]
        max_pages: usize,
        /// Follow links to other hosts too.
        #[arg(long, default_value_t = false)]
        all_domains: bool,
    },
    /// Print the concepts found in a text.
    Concepts {
        #[arg(long)]
        text: String,
    },
    /// Print a concept uri with its direct broader and narrower concepts.
    Expand {
        #[arg(long)]
        uri: String,
        #[arg(long, default_value_t = false)]
        no_broader: bool,
        #[arg(long, default_value_t = false)]
        no_narrower: bool,
    },
    /// Print aggregation buckets for the enabled facets.
    Facets,
    /// Print one facet per ontology concept scheme.
    OntologyFacets,
    /// Write all loaded concepts and their relations as JSON.
    ExportTaxonomy {
        #[arg(long)]
        out: PathBuf,
    },
}

impl Cli {
    fn ocr_settings(&self) -> OcrSettings {
        OcrSettings {
            use_gpu: self.ocr_use_gpu,
            enable_legacy_script: self.ocr_enable_legacy_script,
            ..OcrSettings::default()
        }
    }

    fn opensearch(&self) -> anyhow::Result<OpenSearchStore> {
        self.opensearch_index(&self.opensearch_index)
    }

    fn opensearch_index(&self, index_name: &str) -> anyhow::Result<OpenSearchStore> {
        let endpoint = OpenSearchStore::parse_endpoint(&self.opensearch_url)?;
        let client = OpenSearchStore::http_client(self.insecure)?;
        let store = OpenSearchStore::with_client(client, endpoint.as_str(), index_name);
        Ok(if self.opensearch_password.is_empty() {
            store
        } else {
            store.with_basic_auth(&self.opensearch_user, &self.opensearch_password)
        })
    }

    async fn index(&self) -> anyhow::Result<Arc<dyn DocumentIndex>> {
        if self.dry_run {
            info!("dry run: records are kept in memory");
            return Ok(Arc::new(MemoryIndex::new()));
        }
        let store = self.opensearch()?;
        store.ensure_index().await?;
        Ok(Arc::new(store))
    }

    async fn page_index(&self) -> anyhow::Result<Arc<dyn PageIndex>> {
        if self.dry_run {
            info!("dry run: crawled pages are kept in memory");
            return Ok(Arc::new(MemoryIndex::new()));
        }
        let store = self.opensearch_index(&self.web_index)?;
        store.ensure_web_index().await?;
        Ok(Arc::new(store))
    }

    async fn cascade(&self, client: &reqwest::Client) -> OcrCascade {
        let settings = self.ocr_settings();
        let baseline: Arc<dyn OcrEngine> = Arc::new(TesseractEngine::new(&self.tesseract_bin));

        let endpoint = self.detail_ocr_url.as_deref().and_then(|url| {
            DetailEndpointConfig::new(url, self.detail_ocr_api_key.clone(), settings.detail_languages.clone())
        });
        let detail = match endpoint {
            Some(config) => RemoteDetailEngine::probe(client.clone(), config, settings.use_gpu)
                .await
                .map(|engine| Arc::new(engine) as Arc<dyn OcrEngine>),
            None => None,
        };

        OcrCascade::new(baseline, detail, settings)
    }

    fn concepts(&self) -> anyhow::Result<Arc<ConceptIndex>> {
        let concepts = ConceptIndex::load_dir(&self.ontology_dir)?;
        info!(
            dir = %self.ontology_dir.display(),
            concepts = concepts.len(),
            "ontologies loaded"
        );
        Ok(Arc::new(concepts))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "docfacet boot"
    );

    let http = reqwest::Client::new();

    match &cli.command {
        Command::Index | Command::Watch | Command::File { .. } => {
            let pipeline = IngestionPipeline::new(
                cli.index().await?,
                TikaParser::new(http.clone(), &cli.tika_url),
                Arc::new(cli.cascade(&http).await),
                Arc::new(PdftoppmRasterizer::new(&cli.pdftoppm_bin)),
                cli.concepts()?,
            );

            match &cli.command {
                Command::File { path, source } => {
                    let report = pipeline.ingest_file(path, source).await?;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                Command::Index => {
                    let config = IndexingConfig::load(&cli.config_dir.join("indexing.json"))?;
                    let summary = BatchRunner::new(&pipeline).index_configured(&config).await;
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                _ => {
                    let config = IndexingConfig::load(&cli.config_dir.join("indexing.json"))?;
                    let summary = BatchRunner::new(&pipeline).index_configured(&config).await;
                    info!(indexed = summary.indexed, "initial indexing complete");

                    let watcher = WatchLoop::new(&pipeline, config.directories.clone());
                    if watcher.directories().is_empty() {
                        info!("no directories configured for watching");
                        return Ok(());
                    }
                    let watched = watcher
                        .run(async {
                            if let Err(error) = tokio::signal::ctrl_c().await {
                                warn!(%error, "ctrl-c handler failed; stopping");
                            }
                        })
                        .await;
                    println!("{}", serde_json::to_string_pretty(&watched)?);
                }
            }
        }
        Command::Ocr {
            image: images,
            output_dir,
            batch_size,
        } => {
            let cascade = cli.cascade(&http).await;
            let items = BatchOcr::new(&cascade)
                .with_batch_size(*batch_size)
                .process(images, output_dir.as_deref())
                .await;
            println!("{}", serde_json::to_string_pretty(&items)?);
            println!("{}", serde_json::to_string_pretty(&cascade.snapshot())?);
        }
        Command::Urls {
            file,
            max_pages_per_site,
        } => {
            let mut crawler = WebCrawler::new(http.clone(), cli.page_index().await?);
            let summary = crawler.index_url_list(file, *max_pages_per_site).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Crawl {
            url,
            max_pages,
            all_domains,
        } => {
            let mut crawler = WebCrawler::new(http.clone(), cli.page_index().await?);
            let indexed = crawler.crawl_website(url, *max_pages, !all_domains).await?;
            info!(url = %url, indexed, "crawl complete");
        }
        Command::Concepts { text } => {
            let matches = cli.concepts()?.find_concepts(text);
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }
        Command::Expand {
            uri,
            no_broader,
            no_narrower,
        } => {
            let concepts = cli.concepts()?;
            let expanded = concepts.expand_query(uri, !no_broader, !no_narrower);
            println!("{}", serde_json::to_string_pretty(&expanded)?);
            println!("{}", serde_json::to_string_pretty(&concepts.hierarchy(uri))?);
        }
        Command::Facets => {
            let facets = FacetConfig::load(&cli.config_dir.join("facets.json"))?;
            if cli.dry_run {
                warn!("facet counts need OpenSearch; nothing to report in a dry run");
                return Ok(());
            }
            let counts = cli.opensearch()?.facet_counts(&facets.enabled()).await?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        Command::OntologyFacets => {
            let facets = cli.concepts()?.facet_config();
            println!("{}", serde_json::to_string_pretty(&facets)?);
        }
        Command::ExportTaxonomy { out } => {
            cli.concepts()?.save_taxonomy_json(out)?;
        }
    }

    Ok(())
}
