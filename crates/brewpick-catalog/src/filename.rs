//! Deterministic local filenames for archived product images.

use std::sync::LazyLock;

use brewpick_core::ProductId;
use regex::Regex;

const TITLE_MAX_CHARS: usize = 40;
const DEFAULT_EXTENSION: &str = ".jpg";
const KNOWN_EXTENSIONS: &[&str] = &[".png", ".webp", ".jpeg", ".jpg"];

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static UNSAFE_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_\-]").expect("valid filename regex"));

/// Filesystem-safe stem for a product: sanitized title plus `_<id>`.
///
/// Whitespace runs become `_`, anything outside `[A-Za-z0-9_-]` is dropped,
/// and the result is cut to 40 characters. Non-ASCII titles may sanitize to
/// nothing, in which case `product` is used.
#[must_use]
pub fn sanitize_filename(title: &str, id: Option<&ProductId>) -> String {
    let underscored = WHITESPACE_RE.replace_all(title, "_");
    let safe = UNSAFE_CHARS_RE.replace_all(&underscored, "");
    let mut stem: String = safe.chars().take(TITLE_MAX_CHARS).collect();
    if stem.is_empty() {
        stem.push_str("product");
    }
    match id {
        Some(id) => format!("{stem}_{id}"),
        None => format!("{stem}_unknown"),
    }
}

/// Image extension (with dot) inferred from the URL path, `.jpg` otherwise.
#[must_use]
pub fn infer_extension(image_url: &str) -> &'static str {
    let Ok(url) = reqwest::Url::parse(image_url) else {
        return DEFAULT_EXTENSION;
    };
    let path = url.path().to_ascii_lowercase();
    KNOWN_EXTENSIONS
        .iter()
        .find(|ext| path.ends_with(*ext))
        .copied()
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Full archived filename: `sanitize_filename` plus `infer_extension`.
#[must_use]
pub fn archive_filename(title: &str, id: Option<&ProductId>, image_url: &str) -> String {
    format!(
        "{}{}",
        sanitize_filename(title, id),
        infer_extension(image_url)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_script_title_keeps_ascii_part() {
        let id = ProductId::Int(42);
        assert_eq!(
            archive_filename("IPA 小麦啤", Some(&id), "https://x/y.PNG"),
            "IPA__42.png"
        );
    }

    #[test]
    fn whitespace_runs_collapse_to_single_underscore() {
        let id = ProductId::Int(1);
        assert_eq!(
            sanitize_filename("Hazy   Double\tIPA", Some(&id)),
            "Hazy_Double_IPA_1"
        );
    }

    #[test]
    fn title_is_cut_to_forty_chars_before_id() {
        let id = ProductId::Text("g-9".to_string());
        let name = sanitize_filename(&"a".repeat(60), Some(&id));
        assert_eq!(name, format!("{}_g-9", "a".repeat(40)));
    }

    #[test]
    fn empty_or_fully_stripped_title_uses_product_stem() {
        assert_eq!(sanitize_filename("精酿", None), "product_unknown");
        assert_eq!(sanitize_filename("", Some(&ProductId::Int(7))), "product_7");
    }

    #[test]
    fn infer_extension_matches_known_suffixes() {
        assert_eq!(infer_extension("https://img/a.webp?x=1"), ".webp");
        assert_eq!(infer_extension("https://img/a.JPEG"), ".jpeg");
        assert_eq!(infer_extension("https://img/a.jpg"), ".jpg");
        assert_eq!(infer_extension("https://img/a.gif"), ".jpg");
        assert_eq!(infer_extension("https://img/noext"), ".jpg");
    }

    #[test]
    fn infer_extension_defaults_for_unparseable_url() {
        assert_eq!(infer_extension("not a url.png"), ".jpg");
    }
}
