use anyhow::{bail, Result};
use clap::Parser;
use crawler::seeds::{load_seeds, parse_seed};
use crawler::{CrawlConfig, Crawler, FetchConfig, HttpFetcher};
use search_core::pagerank::{self, PageRankConfig};
use search_core::{IdCache, Store};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl the web breadth-first into the search index, then compute PageRank")]
struct Cli {
    /// Database directory
    #[arg(long, default_value = "./data/index.db")]
    db: String,
    /// Path to a file with seed URLs (one per line)
    #[arg(long)]
    seeds: Option<String>,
    /// Seed URL; may be repeated
    #[arg(long = "seed")]
    seed: Vec<String>,
    /// Maximum link depth from the seeds
    #[arg(long, default_value_t = 1)]
    max_depth: usize,
    /// Maximum number of pages to claim from the frontier
    #[arg(long)]
    max_pages: Option<usize>,
    /// Concurrency (number of workers)
    #[arg(long, default_value_t = 16)]
    concurrency: usize,
    /// Request timeout seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    /// User-Agent string to use for crawling
    #[arg(long, default_value = "search-engine-rs-bot/0.1 (+https://example.com/bot)")]
    user_agent: String,
    /// Do not run PageRank after the crawl
    #[arg(long, default_value_t = false)]
    skip_pagerank: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let mut seeds = match &args.seeds {
        Some(path) => load_seeds(path)?,
        None => Vec::new(),
    };
    seeds.extend(args.seed.iter().filter_map(|s| parse_seed(s)));
    if seeds.is_empty() {
        bail!("no valid seeds");
    }

    let store = Arc::new(Store::open(&args.db)?);
    let ids = Arc::new(IdCache::new(store.clone()));
    let fetcher = HttpFetcher::new(&FetchConfig {
        timeout: Duration::from_secs(args.timeout_secs),
        user_agent: args.user_agent.clone(),
        ..FetchConfig::default()
    })?;
    let config = CrawlConfig {
        max_depth: args.max_depth,
        max_pages: args.max_pages,
        concurrency: args.concurrency,
        ..CrawlConfig::default()
    };
    let crawler = Crawler::new(ids, Arc::new(fetcher), config);

    let cancel = crawler.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight pages");
            cancel.cancel();
        }
    });

    let report = crawler.crawl(seeds).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !args.skip_pagerank && !report.cancelled {
        let outcome = pagerank::run(&store, &PageRankConfig::default())?;
        tracing::info!(documents = outcome.scores.len(), iterations = outcome.iterations, "pagerank stored");
    }
    store.flush()?;
    Ok(())
}
