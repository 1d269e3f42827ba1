use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::info;

use super::dom::WordsDom;

static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d[\d,]*)").unwrap());

/// Pull the first integer token out of a heading like "1,234 words",
/// ignoring thousands separators.
pub fn parse_expected(text: &str) -> Option<u64> {
    let m = COUNT_RE.find(text)?;
    m.as_str().replace(',', "").parse().ok()
}

/// Scan page headings for the source-reported total, e.g. "427 words".
/// `None` means the stop policy falls back to stagnation only. Read once
/// per run; the page sometimes shows a stale or rounded total, so it is
/// never re-read.
pub async fn read_expected_total(dom: &dyn WordsDom) -> Result<Option<u64>> {
    for text in dom.heading_texts().await? {
        if !text.to_lowercase().contains("word") {
            continue;
        }
        if let Some(n) = parse_expected(&text) {
            info!("Expected total from heading: {}", n);
            return Ok(Some(n));
        }
    }
    info!("No usable word-count heading; stopping on stagnation only");
    Ok(None)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_count() {
        assert_eq!(parse_expected("427 words"), Some(427));
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(parse_expected("1,234 words"), Some(1234));
    }

    #[test]
    fn no_digits_is_unknown() {
        assert_eq!(parse_expected("Words"), None);
        assert_eq!(parse_expected(""), None);
    }

    #[test]
    fn first_token_wins() {
        assert_eq!(parse_expected("Showing 50 of 427 words"), Some(50));
    }
}
