use std::sync::LazyLock;

use regex::Regex;

pub const MAX_NAME_LENGTH: usize = 200;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 _-]+$").expect("name pattern is valid"));

/// Portfolio names are 1-200 characters of ASCII letters, digits, space,
/// hyphen and underscore.
pub fn is_valid_format(name: &str) -> bool {
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return false;
    }
    NAME_PATTERN.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_allowed_characters() {
        assert!(is_valid_format("Tech Growth"));
        assert!(is_valid_format("retirement_2045"));
        assert!(is_valid_format("high-yield"));
        assert!(is_valid_format("A"));
        assert!(is_valid_format(" padded "));
    }

    #[test]
    fn test_rejects_empty_and_overlong_names() {
        assert!(!is_valid_format(""));
        assert!(is_valid_format(&"x".repeat(200)));
        assert!(!is_valid_format(&"x".repeat(201)));
    }

    #[test]
    fn test_rejects_punctuation_and_unicode() {
        assert!(!is_valid_format("Tech & Growth"));
        assert!(!is_valid_format("Portfolio!"));
        assert!(!is_valid_format("Rocket 🚀"));
        assert!(!is_valid_format("Brand™"));
        assert!(!is_valid_format("Café"));
        assert!(!is_valid_format("tab\tseparated"));
    }
}
