//! Extraction of media URLs from note content.

use once_cell::sync::Lazy;
use regex::Regex;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

/// Return every `http(s)://` URL in `content`, in order of appearance.
pub fn extract_urls(content: &str) -> Vec<String> {
    URL_RE
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_urls_in_order() {
        let content = "look\nhttps://img.example/a.png and http://img.example/b.jpg\tdone";
        assert_eq!(
            extract_urls(content),
            vec!["https://img.example/a.png", "http://img.example/b.jpg"]
        );
    }

    #[test]
    fn url_runs_until_whitespace() {
        assert_eq!(
            extract_urls("猫 https://img.example/猫.png?x=1#f　end"),
            vec!["https://img.example/猫.png?x=1#f"]
        );
    }

    #[test]
    fn no_urls_is_empty() {
        assert!(extract_urls("just text, ftp://nope").is_empty());
        assert!(extract_urls("").is_empty());
    }
}
