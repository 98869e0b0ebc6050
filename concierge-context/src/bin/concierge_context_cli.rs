use clap::Parser;
use concierge_context::text::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, TextContextBuilder, get_delimiters_for_path,
};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process;

/// A CLI tool to chunk a corpus file into JSON output using concierge-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Source label attached to every chunk. Defaults to the input path.
    #[arg(short, long)]
    source: Option<String>,

    /// Maximum length of each chunk, in characters.
    #[arg(short = 'n', long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[arg(short = 'o', long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Comma-separated list of regex patterns for delimiters.
    /// Defaults to delimiters chosen from the input file extension.
    #[arg(short, long, value_delimiter = ',')]
    delimiters: Option<Vec<String>>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let file_content = if let Some(input_path) = &args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let source = args
        .source
        .or_else(|| args.input.clone())
        .unwrap_or_else(|| "stdin".to_string());

    let delimiter_patterns_owned: Vec<String> = match args.delimiters {
        Some(d) => d,
        None => get_delimiters_for_path(Path::new(&source))
            .iter()
            .map(|&s| s.to_string())
            .collect(),
    };

    let delimiter_patterns_refs: Vec<&str> = delimiter_patterns_owned
        .iter()
        .map(|s| s.as_str())
        .collect();

    let builder = TextContextBuilder::new(
        source,
        &delimiter_patterns_refs,
        args.chunk_size,
        args.chunk_overlap,
    )?;

    let chunks = builder.get_chunks(&file_content);

    println!("{}", serde_json::to_string_pretty(&chunks)?);

    Ok(())
}
