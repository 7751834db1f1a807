//! Text chunking with configurable window size and overlap.

use docchat_core::{AppError, AppResult};

/// Split text into overlapping fixed-size character windows.
///
/// Starting at offset 0, a window of `chunk_size` characters is taken,
/// trimmed, and kept if non-empty; the start offset then advances by
/// `chunk_size - overlap`. The last chunk may be shorter than the nominal
/// size. Identical inputs always produce an identical sequence.
///
/// # Errors
/// `AppError::Config` when `chunk_size == 0` or `overlap >= chunk_size`:
/// the window would never advance.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<String>> {
    if chunk_size == 0 {
        return Err(AppError::Config(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(AppError::Config(format!(
            "overlap ({}) must be smaller than chunk_size ({}): the window would never advance",
            overlap, chunk_size
        )));
    }

    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Windows are measured in characters, not bytes, so multi-byte text
    // never splits inside a code point.
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();

        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        start += step;
    }

    tracing::debug!(
        "Chunked {} chars into {} chunks (size: {}, overlap: {})",
        chars.len(),
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}
