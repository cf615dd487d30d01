use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use search_core::pagerank::{self, PageRankConfig};
use search_core::query::{search, Page};
use search_core::Store;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Maintain and inspect a crawled search index", long_about = None)]
struct Cli {
    /// Database directory
    #[arg(long, global = true, default_value = "./data/index.db")]
    db: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute PageRank over the stored link graph and replace all scores
    Pagerank {
        #[arg(long, default_value_t = 0.85)]
        damping: f64,
        /// Stop when the L1 change of the score vector falls below this
        #[arg(long, default_value_t = 1e-6)]
        tolerance: f64,
        #[arg(long, default_value_t = 100)]
        max_iterations: usize,
    },
    /// Dump the resolved inverted index (word -> urls) as JSON
    Resolve {
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<String>,
    },
    /// Print relation sizes
    Stats,
    /// Rank documents for a query by summed PageRank
    Search {
        #[arg(long)]
        q: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        per_page: usize,
    },
}

#[derive(Serialize)]
struct PageRankSummary {
    documents: usize,
    iterations: usize,
    converged: bool,
    delta: f64,
    computed_at: String,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let store = Store::open(&cli.db)?;

    match cli.command {
        Commands::Pagerank { damping, tolerance, max_iterations } => {
            if !(0.0..1.0).contains(&damping) {
                bail!("damping must be in [0, 1), got {damping}");
            }
            let config = PageRankConfig { damping, tolerance, max_iterations };
            let outcome = pagerank::run(&store, &config)?;
            let summary = PageRankSummary {
                documents: outcome.scores.len(),
                iterations: outcome.iterations,
                converged: outcome.converged,
                delta: outcome.delta,
                computed_at: time::OffsetDateTime::now_utc()
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_else(|_| "".into()),
            };
            print_json(&summary)?;
        }
        Commands::Resolve { output } => {
            let resolved = store.resolve_inverted_index()?;
            tracing::info!(words = resolved.len(), "resolved inverted index");
            match output {
                Some(path) => {
                    let mut out = BufWriter::new(File::create(&path)?);
                    serde_json::to_writer_pretty(&mut out, &resolved)?;
                    out.write_all(b"\n")?;
                    out.flush()?;
                    tracing::info!(output = %path, "wrote resolved index");
                }
                None => print_json(&resolved)?,
            }
        }
        Commands::Stats => print_json(&store.stats())?,
        Commands::Search { q, page, per_page } => {
            let results = search(&store, &q, Page { number: page, size: per_page })?;
            print_json(&results)?;
        }
    }
    store.flush()?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}
