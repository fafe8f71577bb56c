#[cfg(test)]
mod tests;

use anyhow::Result;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use text_splitter::{Characters, ChunkConfig, MarkdownSplitter};
use tracing::debug;

use crate::VecDbError;

/// A chunk of markdown ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk text
    pub text: String,
    /// Heading path ("Parent > Child") in effect where the chunk starts
    pub heading: Option<String>,
    /// Byte offset of the chunk within the source document
    pub offset: usize,
}

/// Configuration for markdown chunking, in characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 256,
            chunk_overlap: 30,
        }
    }
}

/// Splits markdown into overlapping chunks and tags each with its heading path
pub struct MarkdownChunker {
    splitter: MarkdownSplitter<Characters>,
}

impl MarkdownChunker {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        let chunk_config = ChunkConfig::new(config.chunk_size)
            .with_overlap(config.chunk_overlap)
            .map_err(|e| VecDbError::Chunking(e.to_string()))?;

        Ok(Self {
            splitter: MarkdownSplitter::new(chunk_config),
        })
    }

    /// Split a markdown document. Deterministic for a given configuration.
    #[inline]
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let headings = heading_index(text);

        let chunks: Vec<TextChunk> = self
            .splitter
            .chunk_indices(text)
            .map(|(offset, chunk)| TextChunk {
                text: chunk.to_string(),
                heading: heading_at(&headings, offset),
                offset,
            })
            .collect();

        debug!(
            "Chunked {} bytes of markdown into {} chunks",
            text.len(),
            chunks.len()
        );

        chunks
    }
}

/// A heading occurrence: byte offset and full heading path
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeadingMark {
    pub offset: usize,
    pub path: String,
}

/// Collect every heading in document order together with its nesting path.
pub(crate) fn heading_index(text: &str) -> Vec<HeadingMark> {
    let mut marks = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut current: Option<(usize, usize, String)> = None;

    for (event, range) in Parser::new(text).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((level as usize, range.start, String::new()));
            }
            Event::Text(fragment) | Event::Code(fragment) => {
                if let Some((_, _, title)) = current.as_mut() {
                    title.push_str(&fragment);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, offset, title)) = current.take() {
                    while stack.last().is_some_and(|(l, _)| *l >= level) {
                        stack.pop();
                    }
                    stack.push((level, title.trim().to_string()));

                    let path = stack
                        .iter()
                        .map(|(_, t)| t.as_str())
                        .filter(|t| !t.is_empty())
                        .collect::<Vec<_>>()
                        .join(" > ");
                    marks.push(HeadingMark { offset, path });
                }
            }
            _ => {}
        }
    }

    marks
}

/// Heading path of the last heading starting at or before `offset`
pub(crate) fn heading_at(marks: &[HeadingMark], offset: usize) -> Option<String> {
    let idx = marks.partition_point(|mark| mark.offset <= offset);
    idx.checked_sub(1)
        .and_then(|i| marks.get(i))
        .map(|mark| mark.path.clone())
        .filter(|path| !path.is_empty())
}
