/// Split `text` into windows of `chunk_size` characters, each starting
/// `chunk_size - chunk_overlap` characters after the previous one.
///
/// Windows are trimmed; blank windows are dropped. Callers guarantee
/// `chunk_overlap < chunk_size` (enforced by config validation).
pub(crate) fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_overlap() {
        assert_eq!(split_text("abcdefghij", 4, 1), vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_text("  hello  ", 100, 10), vec!["hello"]);
        assert!(split_text("", 100, 10).is_empty());
        assert!(split_text("   \n  ", 3, 1).is_empty());
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunks = split_text("çğıöşü", 3, 0);
        assert_eq!(chunks, vec!["çğı", "öşü"]);
    }
}
