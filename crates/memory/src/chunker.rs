//! Line-oriented markdown chunker.
//!
//! Sizes are approximated as `chars / 4` tokens. Chunk boundaries always fall on
//! whole source lines, except for lines longer than the chunk budget which are cut
//! into fixed-size segments that all keep the same source line number.

use sha2::{Digest, Sha256};

/// A slice of a document ready to be embedded and indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-indexed, inclusive.
    pub start_line: usize,
    /// 1-indexed, inclusive.
    pub end_line: usize,
    pub text: String,
    /// SHA-256 of `text`; also the embedding-cache key.
    pub hash: String,
}

/// Split `content` into overlapping chunks of roughly `tokens` tokens, carrying
/// about `overlap` tokens of trailing lines into the next chunk.
pub fn chunk_markdown(content: &str, tokens: usize, overlap: usize) -> Vec<Chunk> {
    if content.is_empty() {
        return Vec::new();
    }

    let max_chars = (tokens * 4).max(32);
    let overlap_chars = overlap * 4;

    let mut chunks = Vec::new();
    // (segment, line number, segment length in chars)
    let mut current: Vec<(String, usize, usize)> = Vec::new();
    let mut current_chars = 0usize;

    for (idx, line) in content.split('\n').enumerate() {
        let line_no = idx + 1;
        for segment in split_segments(line, max_chars) {
            let seg_chars = segment.chars().count();
            let size = seg_chars + 1;
            if current_chars + size > max_chars && !current.is_empty() {
                chunks.push(flush(&current));
                current = carry_overlap(&current, overlap_chars);
                current_chars = current.iter().map(|(_, _, len)| len + 1).sum();
            }
            current.push((segment, line_no, seg_chars));
            current_chars += size;
        }
    }

    if !current.is_empty() {
        chunks.push(flush(&current));
    }
    chunks
}

/// Cut a line into segments of at most `max_chars` characters. An empty line is a
/// single empty segment so blank lines still count toward chunk size.
fn split_segments(line: &str, max_chars: usize) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(max_chars)
        .map(|part| part.iter().collect())
        .collect()
}

fn flush(current: &[(String, usize, usize)]) -> Chunk {
    let text = current
        .iter()
        .map(|(segment, ..)| segment.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let start_line = current.first().map(|(_, line, _)| *line).unwrap_or(1);
    let end_line = current.last().map(|(_, line, _)| *line).unwrap_or(start_line);
    let hash = hash_text(&text);
    Chunk {
        start_line,
        end_line,
        text,
        hash,
    }
}

/// Walk backwards over the flushed buffer until at least `overlap_chars`
/// characters have been collected; those lines seed the next chunk.
fn carry_overlap(
    flushed: &[(String, usize, usize)],
    overlap_chars: usize,
) -> Vec<(String, usize, usize)> {
    if overlap_chars == 0 {
        return Vec::new();
    }
    let mut acc = 0usize;
    let mut kept = Vec::new();
    for entry in flushed.iter().rev() {
        acc += entry.2 + 1;
        kept.push(entry.clone());
        if acc >= overlap_chars {
            break;
        }
    }
    kept.reverse();
    kept
}

/// Hex SHA-256 of a string.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
