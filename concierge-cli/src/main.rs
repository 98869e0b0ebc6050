mod conversation;
mod ui;

use clap::Parser;
use concierge_chat::{AppContext, ChatConfig};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Customer-service assistant that answers from a local knowledge base.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Knowledge base text file (overrides the configuration)
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Keep the vector index in this SQLite file instead of in memory
    #[arg(long)]
    index: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = ChatConfig::load(args.config.as_deref())?;
    if let Some(corpus) = args.corpus {
        config = config.with_corpus_path(corpus);
    }
    if let Some(index) = args.index {
        config = config.with_index_path(index);
    }

    eprintln!("Loading knowledge base from {}...", config.corpus_path.display());
    let context = AppContext::initialize(config).await?;

    let report = context.index_report();
    eprintln!(
        "Ready: {} chunks{}\n",
        report.chunks,
        if report.reused { " (reused index)" } else { "" }
    );

    ui::run(&context).await
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
