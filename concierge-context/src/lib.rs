pub mod text;

// Re-export the chunking entry points for external use
pub use text::{
    ChunkError, TextChunk, TextContextBuilder, create_builder_for_path, get_delimiters_for_path,
};
