//! Utilities for cutting a knowledge corpus into overlapping passages that fit
//! the input limits of an embedding model.
//!
//! The chunker works in two passes:
//!
//! 1. **Segmentation**: the text is split recursively on a list of delimiter
//!    patterns, most significant first (paragraph breaks, then line breaks,
//!    then spaces). Delimiters are kept as their own segments so that every
//!    segment is a contiguous byte range of the original text. When all
//!    delimiters are exhausted and a piece is still too long, it is cut into
//!    fixed character windows.
//! 2. **Merging**: contiguous segments are packed greedily into windows of at
//!    most `chunk_size` characters. Each new window starts with the tail of
//!    the previous one (at most `chunk_overlap` characters), so a sentence cut
//!    at a boundary still appears whole in one of the two neighbours.
//!
//! Lengths are counted in characters, never bytes, and no split ever lands
//! inside a UTF-8 code point.
//!
//! # Usage
//!
//! ```
//! use concierge_context::text::TextContextBuilder;
//!
//! let builder = TextContextBuilder::new(
//!     "data.txt".to_string(),
//!     &[r"\n\n", r"\n", r" "],
//!     60,
//!     15,
//! )
//! .unwrap();
//!
//! let corpus = "Business hours: 9am-5pm Mon-Fri.\n\nRefunds are available within 30 days of purchase.";
//! let chunks = builder.get_chunks(corpus);
//!
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].chunk_text, "Business hours: 9am-5pm Mon-Fri.");
//! for chunk in &chunks {
//!     // Every chunk is an exact slice of the corpus.
//!     assert_eq!(&corpus[chunk.span.clone()], chunk.chunk_text);
//!     assert!(chunk.chunk_text.chars().count() <= 60);
//! }
//! ```
use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::ops::Range;
use std::path::Path;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Delimiters for plain prose: paragraphs, then lines, then words.
pub const DEFAULT_TEXT_DELIMITERS: &[&str] = &[r"\n\n", r"\n", r" "];

/// Regular expression patterns for splitting Markdown content into logical segments.
///
/// Ordered from most significant to least significant:
///
/// - `(?m)^#{1,6}\s+.*$`: headings (`# Heading`, `## Subheading`).
/// - ```` ``` ````: code block fences.
/// - `\n\n`: paragraph breaks.
/// - `(?m)^[ \t]*[-*+][ \t]+`: unordered list markers.
/// - `(?m)^[ \t]*\d+\.[ \t]+`: ordered list markers.
/// - `\n`: line breaks.
/// - ` `: spaces, the most granular delimiter.
pub const DEFAULT_MARKDOWN_DELIMITERS: &[&str] = &[
    r"(?m)^#{1,6}\s+.*$",
    r"```",
    r"\n\n",
    r"(?m)^[ \t]*[-*+][ \t]+",
    r"(?m)^[ \t]*\d+\.[ \t]+",
    r"\n",
    r" ",
];

/// Errors raised while configuring a [`TextContextBuilder`].
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// A delimiter pattern is not a valid regular expression
    #[error("Invalid delimiter pattern {pattern:?}: {source}")]
    InvalidDelimiter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The window parameters cannot produce progress
    #[error("Invalid chunk window: size {chunk_size}, overlap {chunk_overlap}")]
    InvalidWindow {
        chunk_size: usize,
        chunk_overlap: usize,
    },
}

/// Get text delimiters appropriate for the corpus file type.
///
/// Markdown files are split on headings, fences and list markers before
/// falling back to paragraphs; everything else is treated as plain prose.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use concierge_context::get_delimiters_for_path;
/// use concierge_context::text::{DEFAULT_MARKDOWN_DELIMITERS, DEFAULT_TEXT_DELIMITERS};
///
/// assert_eq!(get_delimiters_for_path(Path::new("faq.md")), DEFAULT_MARKDOWN_DELIMITERS);
/// assert_eq!(get_delimiters_for_path(Path::new("data.txt")), DEFAULT_TEXT_DELIMITERS);
/// ```
pub fn get_delimiters_for_path(path: &Path) -> &'static [&'static str] {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("md") | Some("markdown") => DEFAULT_MARKDOWN_DELIMITERS,
        _ => DEFAULT_TEXT_DELIMITERS,
    }
}

/// Create a TextContextBuilder pre-configured for the given corpus path.
///
/// Selects delimiters with [`get_delimiters_for_path`] and uses the path itself
/// as the chunk source label.
pub fn create_builder_for_path(
    file_path: &Path,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<TextContextBuilder, ChunkError> {
    TextContextBuilder::new(
        file_path.to_string_lossy().to_string(),
        get_delimiters_for_path(file_path),
        chunk_size,
        chunk_overlap,
    )
}

/// Splits a corpus into overlapping, size-bounded chunks.
///
/// Holds the source label attached to every chunk, the compiled delimiters and
/// the window parameters. A builder is immutable, so chunking the same text
/// twice always yields the same boundaries.
#[derive(Debug, Clone)]
pub struct TextContextBuilder {
    source: String,
    delimiters: Vec<Regex>,
    chunk_size: usize,
    chunk_overlap: usize,
}

/// A single window of corpus text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Label of the corpus the chunk came from (usually its path).
    pub source: String,
    /// Position of this chunk in the corpus (0-indexed).
    pub sequence: usize,
    /// Byte range of `chunk_text` within the corpus.
    pub span: Range<usize>,
    /// The text of this chunk.
    pub chunk_text: String,
}

impl Serialize for TextChunk {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("TextChunk", 5)?;
        state.serialize_field("source", &self.source)?;
        state.serialize_field("sequence", &self.sequence)?;
        state.serialize_field("span_start", &self.span.start)?;
        state.serialize_field("span_end", &self.span.end)?;
        state.serialize_field("chunk_text", &self.chunk_text)?;
        state.end()
    }
}

impl TextContextBuilder {
    /// Creates a new `TextContextBuilder`.
    ///
    /// Delimiters are applied in the order given, from most significant
    /// (e.g. double newline) to least significant (e.g. space).
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::InvalidDelimiter`] for a pattern that does not
    /// compile, and [`ChunkError::InvalidWindow`] when `chunk_size` is zero or
    /// `chunk_overlap` is not smaller than `chunk_size`.
    pub fn new(
        source: String,
        delimiter_patterns: &[&str],
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, ChunkError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(ChunkError::InvalidWindow {
                chunk_size,
                chunk_overlap,
            });
        }

        let delimiters = delimiter_patterns
            .iter()
            .map(|&pattern| {
                Regex::new(pattern).map_err(|source| ChunkError::InvalidDelimiter {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TextContextBuilder {
            source,
            delimiters,
            chunk_size,
            chunk_overlap,
        })
    }

    /// Builder with prose delimiters, 1000-character chunks and 100 characters of overlap.
    pub fn with_defaults(source: String) -> Self {
        TextContextBuilder {
            source,
            delimiters: DEFAULT_TEXT_DELIMITERS
                .iter()
                .filter_map(|pattern| Regex::new(pattern).ok())
                .collect(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits `content` into a vector of overlapping [`TextChunk`]s.
    ///
    /// Every chunk holds at most `chunk_size` characters, is trimmed of
    /// surrounding whitespace, and is an exact slice of `content` (see
    /// [`TextChunk::span`]). Consecutive chunks share up to `chunk_overlap`
    /// characters of trailing context. Whitespace-only windows are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use concierge_context::text::TextContextBuilder;
    ///
    /// let builder = TextContextBuilder::new("faq.txt".to_string(), &[r"\n\n", r"\n", r" "], 100, 30).unwrap();
    /// let long_content = (0..40).map(|_| "A very long sentence part. ").collect::<String>();
    /// let chunks = builder.get_chunks(&long_content);
    ///
    /// assert!(chunks.len() > 1);
    /// for pair in chunks.windows(2) {
    ///     // Neighbouring chunks overlap.
    ///     assert!(pair[1].span.start < pair[0].span.end);
    /// }
    /// ```
    pub fn get_chunks(&self, content: &str) -> Vec<TextChunk> {
        let segments = self.split_recursively_into_segments(content, 0, 0);

        let mut chunks: Vec<TextChunk> = Vec::new();
        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut window_len = 0;

        for segment in segments {
            let segment_len = char_len(&content[segment.clone()]);

            // Adding this segment would overflow the window: emit what we have,
            // then keep only the tail that fits into the overlap budget.
            if window_len + segment_len > self.chunk_size && !window.is_empty() {
                self.push_window(content, &window, &mut chunks);

                while window_len > self.chunk_overlap
                    || (window_len + segment_len > self.chunk_size && window_len > 0)
                {
                    match window.pop_front() {
                        Some((_, len)) => window_len -= len,
                        None => break,
                    }
                }
            }

            window_len += segment_len;
            window.push_back((segment, segment_len));
        }

        if !window.is_empty() {
            self.push_window(content, &window, &mut chunks);
        }

        chunks
    }

    fn push_window(
        &self,
        content: &str,
        window: &VecDeque<(Range<usize>, usize)>,
        chunks: &mut Vec<TextChunk>,
    ) {
        let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) else {
            return;
        };

        let raw = &content[first.start..last.end];
        let trimmed_start = raw.trim_start();
        let leading = raw.len() - trimmed_start.len();
        let text = trimmed_start.trim_end();
        if text.is_empty() {
            return;
        }

        let start = first.start + leading;
        chunks.push(TextChunk {
            source: self.source.clone(),
            sequence: chunks.len(),
            span: start..start + text.len(),
            chunk_text: text.to_string(),
        });
    }

    // Recursively splits `text` into contiguous byte ranges of the original
    // corpus. Each returned range is either no longer than `chunk_size`
    // characters or a delimiter match that could not be split further.
    fn split_recursively_into_segments(
        &self,
        text: &str,
        delimiter_idx: usize,
        current_offset: usize,
    ) -> Vec<Range<usize>> {
        let mut result_segments: Vec<Range<usize>> = Vec::new();

        if text.is_empty() {
            return result_segments;
        }

        // Base case 1: the text is already small enough.
        if char_len(text) <= self.chunk_size {
            result_segments.push(current_offset..current_offset + text.len());
            return result_segments;
        }

        // Base case 2: delimiters exhausted, fall back to character windows.
        if delimiter_idx >= self.delimiters.len() {
            let mut local_start = 0;
            let mut count = 0;
            for (idx, _) in text.char_indices() {
                if count == self.chunk_size {
                    result_segments.push(current_offset + local_start..current_offset + idx);
                    local_start = idx;
                    count = 0;
                }
                count += 1;
            }
            result_segments.push(current_offset + local_start..current_offset + text.len());
            return result_segments;
        }

        let current_delimiter = &self.delimiters[delimiter_idx];
        let mut local_byte_start = 0;

        for mat in current_delimiter.find_iter(text) {
            if mat.start() > local_byte_start {
                result_segments.extend(self.split_recursively_into_segments(
                    &text[local_byte_start..mat.start()],
                    delimiter_idx + 1,
                    current_offset + local_byte_start,
                ));
            }
            if !mat.is_empty() {
                // A long delimiter match (e.g. a heading line) is itself split further.
                result_segments.extend(self.split_recursively_into_segments(
                    mat.as_str(),
                    delimiter_idx + 1,
                    current_offset + mat.start(),
                ));
            }
            local_byte_start = mat.end();
        }

        if local_byte_start < text.len() {
            result_segments.extend(self.split_recursively_into_segments(
                &text[local_byte_start..],
                delimiter_idx + 1,
                current_offset + local_byte_start,
            ));
        }

        result_segments
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
