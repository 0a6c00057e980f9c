//! File name helpers.

/// Replace characters that are unsafe in file names.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        "chapter".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Cut `s` to at most `max` bytes without splitting a character.
pub fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// File stem for an e-book: spaces become `_`, slashes become `:`, and
/// anything else that is not alphanumeric or `_-:` is dropped.
pub fn book_file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' => ':',
            c => c,
        })
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ':'))
        .collect();
    if stem.is_empty() {
        "book".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("1. A/B: c?"), "1. A_B_ c_");
        assert_eq!(sanitize_filename("   "), "chapter");
    }

    #[test]
    fn test_truncate_bytes_respects_char_boundary() {
        // each Cyrillic letter is two bytes
        assert_eq!(truncate_bytes("Глава", 3), "Г");
        assert_eq!(truncate_bytes("abc", 10), "abc");
    }

    #[test]
    fn test_book_file_stem() {
        assert_eq!(book_file_stem("Мой дом/Том 1!"), "Мой_дом:Том_1");
        assert_eq!(book_file_stem("???"), "book");
    }
}
