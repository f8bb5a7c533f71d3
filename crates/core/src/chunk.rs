use crate::error::IngestError;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, IngestError> {
        if max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if overlap_chars >= max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {overlap_chars} must be smaller than chunk size {max_chars}"
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }
}

/// Splits `text` into chunks of at most `max_chars` characters where adjacent
/// chunks share exactly `overlap_chars` characters.
///
/// Each cut prefers the sentence boundary nearest below the size limit and
/// falls back to a hard cut when none exists past the overlap region, so the
/// chunks are contiguous slices of the input: concatenating them with the
/// overlap prefix removed reproduces the input exactly.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        if chars.len() - start <= config.max_chars {
            chunks.push(chars[start..].iter().collect());
            break;
        }

        let hard_end = start + config.max_chars;
        // Any boundary at or below start + overlap would make the next window
        // start at or before the current one.
        let floor = start + config.overlap_chars + 1;
        let end = sentence_boundary(&chars, floor, hard_end).unwrap_or(hard_end);

        chunks.push(chars[start..end].iter().collect());
        start = end - config.overlap_chars;
    }

    chunks
}

/// Finds the end of the last sentence in `chars[floor..limit]`, scanning
/// backwards from `limit`. A sentence ends at `.`, `!` or `?` followed by
/// whitespace.
fn sentence_boundary(chars: &[char], floor: usize, limit: usize) -> Option<usize> {
    let mut end = limit;
    while end > floor {
        let terminal = matches!(chars[end - 1], '.' | '!' | '?');
        if terminal && chars.get(end).map_or(true, |next| next.is_whitespace()) {
            return Some(end);
        }
        end -= 1;
    }
    None
}
