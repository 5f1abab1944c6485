//! Utility functions and helpers.

use std::sync::OnceLock;

use regex::Regex;
use scraper::Selector;
use url::Url;

use crate::error::{AppError, Result};

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Parse a CSS selector, mapping failures to [`AppError::Selector`].
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn forbidden_path_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"[\\/:*?"<>|]+"#).expect("static pattern"))
}

/// Make `input` usable as a single path component.
///
/// Runs of characters that are invalid in file names become `_`. Input that
/// is blank or only dots falls back to `fallback` (sanitized the same way),
/// then to `file`.
pub fn sanitize_path_part(input: &str, fallback: &str) -> String {
    [input, fallback]
        .into_iter()
        .map(|part| forbidden_path_chars().replace_all(part.trim(), "_"))
        .find(|part| !part.chars().all(|c| c == '.'))
        .map(|part| part.into_owned())
        .unwrap_or_else(|| "file".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/root.html"),
            "https://example.com/root.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_parse_selector() {
        assert!(parse_selector("div.class").is_ok());
        assert!(parse_selector("li[id=\"block::1\"] > span > a").is_ok());
        assert!(parse_selector("[[invalid").is_err());
    }

    #[test]
    fn test_sanitize_path_part() {
        assert_eq!(sanitize_path_part(" CS101: Intro ", "course"), "CS101_ Intro");
        assert_eq!(sanitize_path_part("a/\\b", "x"), "a_b");
        assert_eq!(sanitize_path_part("   ", "course"), "course");
        assert_eq!(sanitize_path_part("", " "), "file");
    }

    #[test]
    fn test_sanitize_path_part_rejects_dot_names() {
        assert_eq!(sanitize_path_part("..", "course"), "course");
        assert_eq!(sanitize_path_part(" . ", "course"), "course");
        assert_eq!(sanitize_path_part("...", ".."), "file");
        assert_eq!(sanitize_path_part("../x", "course"), ".._x");
        assert_eq!(sanitize_path_part("v1.2", "course"), "v1.2");
    }
}
