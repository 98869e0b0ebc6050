//! Loading the corpus document from disk.

use super::corpus_index::{DocumentHash, DocumentRef};
use anyhow::{Context, Result};
use std::path::Path;

/// A corpus file read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path the document was read from, as given
    pub source: String,
    pub content: String,
    /// Blake3 hash of `content`
    pub hash: DocumentHash,
}

impl Document {
    /// Builds a document from text already in memory.
    pub fn from_text(source: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let hash = *blake3::hash(content.as_bytes()).as_bytes();
        Self {
            source: source.into(),
            content,
            hash,
        }
    }

    /// Hex form of the content hash, for display.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn to_document_ref(&self) -> DocumentRef {
        DocumentRef {
            source: self.source.clone(),
            hash: self.hash,
            size: self.content.len(),
        }
    }
}

/// Reads one UTF-8 text file into a [`Document`].
pub async fn load_document(path: &Path) -> Result<Document> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading corpus file {}", path.display()))?;

    let document = Document::from_text(path.to_string_lossy(), content);
    tracing::info!(
        "Loaded {} ({} bytes, hash {})",
        document.source,
        document.content.len(),
        &document.hash_hex()[..12]
    );
    Ok(document)
}
