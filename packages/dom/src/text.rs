//! Character-offset helpers. Caret offsets are counted in `char`s.

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the `offset`-th char, clamped to the end of the string
pub fn byte_index(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

pub fn split_at_char(text: &str, offset: usize) -> (&str, &str) {
    text.split_at(byte_index(text, offset))
}

/// Leading whitespace of `text`, as a slice
pub fn leading_whitespace(text: &str) -> &str {
    &text[..text.len() - text.trim_start().len()]
}

/// Trailing whitespace of `text`, as a slice
pub fn trailing_whitespace(text: &str) -> &str {
    &text[text.trim_end().len()..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_count_chars_not_bytes() {
        let text = "héllo";
        assert_eq!(char_len(text), 5);
        assert_eq!(byte_index(text, 2), 3);
        assert_eq!(split_at_char(text, 2), ("hé", "llo"));
        assert_eq!(byte_index(text, 99), text.len());
    }

    #[test]
    fn test_boundary_whitespace() {
        assert_eq!(leading_whitespace("  a b "), "  ");
        assert_eq!(trailing_whitespace("  a b "), " ");
        assert_eq!(leading_whitespace("   "), "   ");
        assert_eq!(trailing_whitespace("x"), "");
    }
}
