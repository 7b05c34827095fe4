//! Text chunking for embedding.
//!
//! Recursive character splitter: tries coarse separators first
//! (paragraph, line, sentence, word) and falls back to finer ones for
//! pieces that are still too large, then merges adjacent pieces back up
//! to the chunk size with a bounded overlap carried between neighbors.
//! All cuts land on UTF-8 character boundaries.

use crate::models::{DocumentChunk, RawDocument};

const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Split a raw document into chunks, cloning its metadata onto each.
    /// Empty and whitespace-only documents yield no chunks.
    pub fn split(&self, doc: &RawDocument) -> Vec<DocumentChunk> {
        self.split_text(&doc.text)
            .into_iter()
            .map(|text| DocumentChunk {
                text,
                metadata: doc.metadata.clone(),
            })
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let pieces = self.split_recursive(text, SEPARATORS);
        self.merge(pieces)
    }

    /// Break `text` into pieces no longer than `chunk_size` characters,
    /// preferring the earliest separator in the list that occurs.
    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        if text.chars().count() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let (sep, rest) = match separators.split_first() {
            Some((sep, rest)) if text.contains(sep) => (*sep, rest),
            Some((_, rest)) if !rest.is_empty() => return self.split_recursive(text, rest),
            _ => return self.hard_cut(text),
        };

        let mut pieces = Vec::new();
        for part in text.split(sep) {
            if part.is_empty() {
                continue;
            }
            if part.chars().count() <= self.chunk_size {
                pieces.push(part.to_string());
            } else {
                pieces.extend(self.split_recursive(part, rest));
            }
        }
        pieces
    }

    /// Last resort for a run with no separators at all: cut every
    /// `chunk_size` characters.
    fn hard_cut(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.chunk_size)
            .map(|c| c.iter().collect())
            .collect()
    }

    /// Merge pieces into chunks of at most `chunk_size` characters,
    /// seeding each new chunk with up to `chunk_overlap` trailing
    /// characters of the previous one.
    fn merge(&self, pieces: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for piece in pieces {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let piece_len = piece.chars().count();
            // +1 for the joining space.
            let joined = if current.is_empty() { 0 } else { 1 };

            if current_len + joined + piece_len > self.chunk_size && !current.is_empty() {
                chunks.push(current.clone());
                let tail = overlap_tail(&current, self.chunk_overlap);
                let tail_len = tail.chars().count();
                // Keep the overlap seed only when the next piece still fits
                // beside it; otherwise the chunk would exceed the limit.
                if tail_len + 1 + piece_len <= self.chunk_size {
                    current = tail;
                    current_len = tail_len;
                } else {
                    current.clear();
                    current_len = 0;
                }
            }
            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(piece);
            current_len += piece_len;
        }

        if !current.trim().is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

/// The last `overlap` characters of `text`, on a char boundary.
fn overlap_tail(text: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let total = text.chars().count();
    if total <= overlap {
        return text.to_string();
    }
    text.chars().skip(total - overlap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn chunker() -> Chunker {
        Chunker::new(1000, 200)
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunker().split_text("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunker().split_text("").is_empty());
        assert!(chunker().split_text("   \n\n  ").is_empty());
    }

    #[test]
    fn chunks_respect_the_size_limit() {
        let text = "word ".repeat(2000);
        for chunk in chunker().split_text(&text) {
            assert!(chunk.chars().count() <= 1000, "chunk too long");
        }
    }

    #[test]
    fn adjacent_chunks_share_an_overlap() {
        let text = "sentence one. ".repeat(300);
        let chunks = chunker().split_text(&text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = overlap_tail(&pair[0], 200);
            assert!(
                pair[1].starts_with(tail.trim_end()),
                "next chunk does not start with the previous tail"
            );
        }
    }

    #[test]
    fn paragraph_breaks_are_preferred_cut_points() {
        let para = "a".repeat(600);
        let text = format!("{}\n\n{}", para, para);
        let chunks = Chunker::new(700, 0).split_text(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], para);
    }

    #[test]
    fn unbroken_run_is_hard_cut_on_char_boundaries() {
        let text = "é".repeat(2500);
        let chunks = chunker().split_text(&text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert!(total >= 2500);
    }

    #[test]
    fn split_clones_metadata_onto_every_chunk() {
        let doc = RawDocument {
            text: "line\n".repeat(500),
            metadata: ChunkMetadata {
                source: "notes.txt".to_string(),
                ..Default::default()
            },
        };
        let chunks = chunker().split(&doc);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.metadata.source == "notes.txt"));
    }
}
