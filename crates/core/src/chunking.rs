use crate::error::IngestError;
use crate::models::{Chunk, TextSegment};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_CHUNK_MAX_CHARS: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP_CHARS: usize = 200;

/// Window sizes, counted in `char`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_CHUNK_MAX_CHARS,
            overlap_chars: DEFAULT_CHUNK_OVERLAP_CHARS,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap_chars {} must be smaller than max_chars {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Splits every segment into overlapping windows, keeping provenance.
///
/// Fails with [`IngestError::NoChunks`] when nothing survives, since no index
/// can be built from zero chunks.
pub fn split_segments(
    segments: &[TextSegment],
    config: ChunkingConfig,
) -> Result<Vec<Chunk>, IngestError> {
    config.validate()?;

    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    for segment in segments {
        for text in split_text(&segment.text, config) {
            chunks.push(Chunk {
                chunk_id: make_chunk_id(&segment.source, segment.page, cursor, &text),
                source: segment.source.clone(),
                page: segment.page,
                chunk_index: cursor,
                text,
            });
            cursor = cursor.saturating_add(1);
        }
    }

    if chunks.is_empty() {
        return Err(IngestError::NoChunks);
    }

    Ok(chunks)
}

/// Each window after the first starts with the last `overlap_chars` of its
/// predecessor. Callers must pass a validated config.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.iter().all(|c| c.is_whitespace()) {
        return Vec::new();
    }

    let mut pieces: Vec<String> = Vec::new();
    let mut start = 0;

    loop {
        if chars.len() - start <= config.max_chars {
            pieces.push(chars[start..].iter().collect());
            break;
        }

        let hard_end = start + config.max_chars;
        let earliest = (start + config.overlap_chars + 1).max(hard_end - config.max_chars / 5);
        let end = find_break_point(&chars, earliest, hard_end);

        pieces.push(chars[start..end].iter().collect());
        start = end - config.overlap_chars;
    }

    pieces
}

/// Latest exclusive end in `earliest..=latest` that falls after a paragraph,
/// line, sentence or word boundary, in that order of preference.
fn find_break_point(chars: &[char], earliest: usize, latest: usize) -> usize {
    if earliest > latest {
        return latest;
    }

    let ends_paragraph = |end: usize| end >= 2 && chars[end - 2] == '\n' && chars[end - 1] == '\n';
    let ends_line = |end: usize| chars[end - 1] == '\n';
    let ends_sentence = |end: usize| {
        matches!(chars[end - 1], '.' | '!' | '?')
            && chars.get(end).is_some_and(|next| next.is_whitespace())
    };
    let ends_word = |end: usize| chars[end - 1].is_whitespace();

    let rules: [&dyn Fn(usize) -> bool; 4] = [&ends_paragraph, &ends_line, &ends_sentence, &ends_word];
    for rule in rules {
        if let Some(end) = (earliest..=latest).rev().find(|&end| rule(end)) {
            return end;
        }
    }

    latest
}

fn make_chunk_id(source: &str, page: Option<u32>, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(page.unwrap_or(0).to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str) -> TextSegment {
        TextSegment {
            text: text.to_string(),
            source: "guide.pdf".to_string(),
            page: Some(1),
        }
    }

    fn prose(len: usize) -> String {
        let sentence = "The login form rejects expired passwords. ";
        sentence.chars().cycle().take(len).collect()
    }

    #[test]
    fn unbroken_text_is_hard_cut_with_overlap() {
        let text = "x".repeat(2_500);
        let pieces = split_text(&text, ChunkingConfig::default());
        let lengths: Vec<usize> = pieces.iter().map(|piece| piece.chars().count()).collect();
        assert_eq!(lengths, vec![1_000, 1_000, 900]);
    }

    #[test]
    fn consecutive_chunks_share_the_overlap() {
        let config = ChunkingConfig::default();
        let pieces = split_text(&prose(2_500), config);
        assert!(pieces.len() >= 3);

        for pair in pieces.windows(2) {
            let first: Vec<char> = pair[0].chars().collect();
            let second: Vec<char> = pair[1].chars().collect();
            assert!(first.len() <= config.max_chars);
            let suffix = &first[first.len() - config.overlap_chars..];
            let prefix = &second[..config.overlap_chars];
            assert_eq!(suffix, prefix);
        }
    }

    #[test]
    fn boundaries_prefer_sentence_ends() {
        let config = ChunkingConfig {
            max_chars: 100,
            overlap_chars: 20,
        };
        let pieces = split_text(&prose(300), config);
        assert!(pieces[0].ends_with('.'));
        assert!(pieces[0].chars().count() <= 100);
    }

    #[test]
    fn paragraph_break_wins_over_later_word_break() {
        let config = ChunkingConfig {
            max_chars: 50,
            overlap_chars: 5,
        };
        let text = format!("{}\n\n{}", "a".repeat(44), "b c ".repeat(20));
        let pieces = split_text(&text, config);
        assert_eq!(pieces[0], format!("{}\n\n", "a".repeat(44)));
    }

    #[test]
    fn short_segment_is_one_chunk() {
        let chunks = split_segments(&[segment("Short note.")], ChunkingConfig::default())
            .expect("chunking should succeed");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short note.");
        assert_eq!(chunks[0].page, Some(1));
    }

    #[test]
    fn chunking_is_idempotent() {
        let segments = vec![segment(&prose(3_100)), segment(&prose(450))];
        let first = split_segments(&segments, ChunkingConfig::default()).expect("first run");
        let second = split_segments(&segments, ChunkingConfig::default()).expect("second run");
        assert_eq!(first, second);
    }

    #[test]
    fn chunk_indexes_are_global() {
        let segments = vec![segment(&prose(1_500)), segment("tail")];
        let chunks = split_segments(&segments, ChunkingConfig::default()).expect("chunks");
        let indexes: Vec<u64> = chunks.iter().map(|chunk| chunk.chunk_index).collect();
        assert_eq!(indexes, (0..chunks.len() as u64).collect::<Vec<_>>());
    }

    #[test]
    fn empty_input_is_an_error() {
        let result = split_segments(&[], ChunkingConfig::default());
        assert!(matches!(result, Err(IngestError::NoChunks)));

        let result = split_segments(&[segment("   \n")], ChunkingConfig::default());
        assert!(matches!(result, Err(IngestError::NoChunks)));
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        let config = ChunkingConfig {
            max_chars: 100,
            overlap_chars: 100,
        };
        let result = split_segments(&[segment("text")], config);
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
    }
}
