use anyhow::Context;
use clap::{Parser, Subcommand};
use concierge_embed::{EmbedConfig, GeminiEmbeddingProvider};
use concierge_retriever::{
    retrieval::{
        corpus_index::CorpusIndex,
        indexer::{Indexer, IndexerConfig},
        loader::load_document,
        retriever::{DEFAULT_TOP_K, Retriever, VectorRetriever},
    },
    storage::{ChunkFilter, ChunkStore, sqlite_store::SqliteStore},
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// A CLI tool to build and query a concierge corpus index.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the SQLite index file
    #[arg(short, long, default_value = "concierge-index.db")]
    db: PathBuf,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk, embed and store a corpus file
    Index {
        /// Corpus file to index
        #[arg(default_value = "data.txt")]
        corpus: PathBuf,
        /// Maximum chunk length in characters
        #[arg(long, default_value_t = concierge_context::text::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Characters shared by consecutive chunks
        #[arg(long, default_value_t = concierge_context::text::DEFAULT_CHUNK_OVERLAP)]
        chunk_overlap: usize,
        #[command(flatten)]
        embedding: EmbeddingArgs,
    },
    /// Retrieve the chunks most similar to a question
    Search {
        /// Question to search for
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_TOP_K)]
        limit: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
        #[command(flatten)]
        embedding: EmbeddingArgs,
    },
    /// List chunks in the index
    List {
        /// Filter by document hash (hex encoded)
        #[arg(long)]
        document_hash: Option<String>,
        /// Limit number of results
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show index statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(clap::Args, Debug)]
struct EmbeddingArgs {
    /// API key for the embedding service
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: String,
    /// Embedding model name
    #[arg(long, default_value = concierge_embed::config::DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,
}

impl EmbeddingArgs {
    fn provider(&self) -> anyhow::Result<Arc<GeminiEmbeddingProvider>> {
        let config = EmbedConfig::new(self.api_key.clone()).with_model(self.embedding_model.clone());
        Ok(Arc::new(GeminiEmbeddingProvider::new(config)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct SearchHit {
    id: i64,
    sequence: usize,
    span_start: usize,
    span_end: usize,
    content: String,
    similarity: f32,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let store = SqliteStore::new(CorpusIndex::open(&args.db).await?);

    match args.command {
        Commands::Index {
            corpus,
            chunk_size,
            chunk_overlap,
            embedding,
        } => {
            let provider = embedding.provider()?;
            let document = load_document(&corpus).await?;
            let config = IndexerConfig::default()
                .with_chunk_size(chunk_size)
                .with_chunk_overlap(chunk_overlap)
                .with_embedding_model(embedding.embedding_model.clone());

            let report = Indexer::new(store, provider, config)
                .build(&document)
                .await?;

            if report.reused {
                println!(
                    "{} unchanged; kept {} indexed chunks",
                    report.source, report.chunks
                );
            } else {
                println!(
                    "Indexed {} chunks from {} into {}",
                    report.chunks,
                    report.source,
                    args.db.display()
                );
            }
            Ok(())
        }
        Commands::Search {
            query,
            limit,
            format,
            embedding,
        } => {
            if query.trim().is_empty() {
                return Err(anyhow::anyhow!("Query cannot be empty"));
            }

            let retriever = VectorRetriever::new(store, embedding.provider()?).with_top_k(limit);
            let results = retriever.retrieve(&query).await?;

            match format {
                OutputFormat::Json => {
                    let hits: Vec<SearchHit> = results
                        .into_iter()
                        .map(|hit| SearchHit {
                            id: hit.chunk.id.unwrap_or(0),
                            sequence: hit.chunk.sequence,
                            span_start: hit.chunk.span_start,
                            span_end: hit.chunk.span_end,
                            content: hit.chunk.content,
                            similarity: hit.score,
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&hits)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} similar chunks:", results.len());
                    for hit in results {
                        println!(
                            "  Similarity: {:.3} | ID: {} | Chunk #{} | Preview: {}",
                            hit.score,
                            hit.chunk.id.unwrap_or(0),
                            hit.chunk.sequence,
                            preview(&hit.chunk.content)
                        );
                    }
                }
                OutputFormat::Full => {
                    for hit in results {
                        println!("Similarity: {:.3}", hit.score);
                        println!("Chunk ID: {}", hit.chunk.id.unwrap_or(0));
                        println!("Source: {}", hit.chunk.source);
                        println!("Bytes: {}-{}", hit.chunk.span_start, hit.chunk.span_end);
                        println!("Content:\n{}", hit.chunk.content);
                        println!("---");
                    }
                }
            }
            Ok(())
        }
        Commands::List {
            document_hash,
            limit,
            format,
        } => {
            let filter = match document_hash {
                Some(hash_str) => {
                    let hash_bytes = hex::decode(&hash_str)
                        .with_context(|| format!("Invalid hex hash: {hash_str}"))?;
                    let hash: [u8; 32] = hash_bytes.try_into().map_err(|_| {
                        anyhow::anyhow!("Hash must be 32 bytes (64 hex characters)")
                    })?;
                    ChunkFilter {
                        document_hash: Some(hash),
                        ..Default::default()
                    }
                }
                None => ChunkFilter::default(),
            };

            let mut chunk_metadata = store.list_chunks(filter).await?;
            chunk_metadata.truncate(limit);

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&chunk_metadata)?);
                }
                OutputFormat::Summary => {
                    println!("Found {} chunks:", chunk_metadata.len());
                    for metadata in chunk_metadata {
                        println!(
                            "  ID: {} | Source: {} | Chunk #{} | Bytes: {}-{} | Embedding: {}",
                            metadata.id,
                            metadata.source,
                            metadata.sequence,
                            metadata.span_start,
                            metadata.span_end,
                            if metadata.has_embedding { "yes" } else { "no" }
                        );
                    }
                }
                OutputFormat::Full => {
                    for metadata in chunk_metadata {
                        if let Some(chunk) = store.get_chunk(metadata.id).await? {
                            println!("Chunk ID: {}", metadata.id);
                            println!("Source: {}", chunk.source);
                            println!("Bytes: {}-{}", chunk.span_start, chunk.span_end);
                            println!("Document Hash: {}", hex::encode(chunk.document_hash));
                            println!(
                                "Has Embedding: {}",
                                if chunk.embedding.is_some() { "Yes" } else { "No" }
                            );
                            println!("Content:\n{}", chunk.content);
                            println!("---");
                        }
                    }
                }
            }
            Ok(())
        }
        Commands::Stats { format } => {
            let stats = store.index().get_stats().await?;
            let documents = store.index().list_documents().await?;

            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }

            println!("Index Statistics:");
            println!("  Documents: {}", stats.documents);
            println!("  Total chunks: {}", stats.chunks);
            println!("  Chunks with embeddings: {}", stats.chunks_with_embeddings);
            for document in documents {
                println!(
                    "  {} ({} bytes, hash {}, indexed {}, {})",
                    document.source,
                    document.size,
                    &hex::encode(document.hash)[..12],
                    document.indexed_at.format("%Y-%m-%d %H:%M:%S"),
                    document.settings
                );
            }
            Ok(())
        }
    }
}

fn preview(content: &str) -> String {
    let flat = content.replace('\n', " ");
    if flat.chars().count() > 80 {
        format!("{}...", flat.chars().take(80).collect::<String>())
    } else {
        flat
    }
}
