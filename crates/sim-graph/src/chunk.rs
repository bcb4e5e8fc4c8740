//! Text chunking for graph ingestion.

/// Sentence-boundary separators tried in order, longest/most specific first.
const SEPARATORS: &[&str] = &[
    "。", "！", "？", ".\n", "!\n", "?\n", "\n\n", ". ", "! ", "? ",
];

/// Splits `text` into `<= chunk_size`-character windows with `overlap` characters
/// carried into the next window. Prefers to end a window at a sentence boundary when
/// one exists past 30% of `chunk_size` into the window.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let min_boundary = (chunk_size as f64 * 0.3) as usize;

    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());

        if end < chars.len() {
            let window: String = chars[start..end].iter().collect();
            for sep in SEPARATORS {
                if let Some(byte_pos) = window.rfind(sep) {
                    let char_pos = window[..byte_pos].chars().count();
                    if char_pos > min_boundary {
                        end = start + char_pos + sep.chars().count();
                        break;
                    }
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect::<String>().trim().to_string();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }

        start = if end < chars.len() {
            end.saturating_sub(overlap).max(start + 1)
        } else {
            chars.len()
        };
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_returns_a_single_chunk() {
        let chunks = split_text("hello world", 1000, 100);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn blank_text_returns_no_chunks() {
        let chunks = split_text("   \n  ", 1000, 100);
        assert!(chunks.is_empty());
    }

    #[test]
    fn long_text_splits_into_bounded_windows() {
        let text = "a".repeat(2500);
        let chunks = split_text(&text, 1000, 100);
        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1000);
        }
    }

    #[test]
    fn prefers_sentence_boundary_past_the_30_percent_mark() {
        let mut text = "x".repeat(400);
        text.push_str(". ");
        text.push_str(&"y".repeat(550));
        let chunks = split_text(&text, 1000, 50);
        assert!(chunks[0].ends_with('.'));
    }

    #[test]
    fn progress_always_advances_even_without_a_boundary() {
        let text = "z".repeat(3000);
        let chunks = split_text(&text, 1000, 999);
        assert!(chunks.len() > 1);
    }
}
