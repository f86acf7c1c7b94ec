//! Character-boundary-safe text truncation shared by the digest, tiering and
//! context modules.

/// Marker appended to text that was cut short.
pub const TRUNCATION_MARKER: &str = "…";

/// Number of `char`s in `text`.
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The longest prefix of `text` holding at most `max_chars` characters.
///
/// Never splits a multi-byte character.
#[must_use]
pub fn prefix_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Cut `text` to `max_chars` characters, appending [`TRUNCATION_MARKER`]
/// when anything was removed. The marker is counted against the limit, so
/// the result never exceeds `max_chars` characters.
#[must_use]
pub fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_owned();
    }
    let marker_len = char_len(TRUNCATION_MARKER);
    if max_chars < marker_len {
        return prefix_chars(text, max_chars).to_owned();
    }
    let mut out = prefix_chars(text, max_chars - marker_len).to_owned();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_with_marker("Pallet", 10), "Pallet");
    }

    #[test]
    fn long_text_gets_marker_within_limit() {
        let cut = truncate_with_marker("abcdefghij", 5);
        assert_eq!(cut, "abcd…");
        assert_eq!(char_len(&cut), 5);
    }

    #[test]
    fn multibyte_boundaries_are_respected() {
        let text = "ポケモンの世界へようこそ";
        let cut = prefix_chars(text, 4);
        assert_eq!(cut, "ポケモン");
        let marked = truncate_with_marker(text, 4);
        assert_eq!(marked, "ポケモ…");
    }

    #[test]
    fn zero_limit_yields_empty() {
        assert_eq!(truncate_with_marker("abc", 0), "");
    }
}
