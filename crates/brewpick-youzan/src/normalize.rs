//! Normalization from raw Youzan list items to [`brewpick_core::Product`].
//!
//! Youzan endpoints disagree on field names (`id` vs `item_id` vs
//! `goods_id`, `image` vs `thumb_url`, ...). Each canonical attribute is
//! resolved by walking an ordered list of candidate keys and taking the first
//! present value.

use std::sync::LazyLock;

use brewpick_core::{Product, ProductId, PLACEHOLDER_TITLE};
use regex::Regex;
use serde_json::Value;

const ID_KEYS: &[&str] = &["id", "item_id", "goods_id"];
const TITLE_KEYS: &[&str] = &["title", "name", "alias"];
const DESC_KEYS: &[&str] = &["desc", "description"];
const PRODUCT_URL_KEYS: &[&str] = &["productUrl", "url", "detail_url"];
const IMAGE_URL_KEYS: &[&str] = &["imageUrl", "image", "image_url", "thumb_url"];
const PRICE_KEYS: &[&str] = &["price", "price_display"];
const ALIAS_KEYS: &[&str] = &["alias"];

static ALIAS_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"alias=([a-zA-Z0-9]+)").expect("valid alias regex"));

/// Returns the first non-null value among `keys` on `obj`.
///
/// Non-object values never match.
#[must_use]
pub fn pick<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let map = obj.as_object()?;
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|v| !v.is_null())
}

/// Like [`pick`] but renders scalar values as strings and skips values
/// that render empty, so `{"title": "", "name": "IPA"}` yields `"IPA"`.
#[must_use]
pub fn pick_string(obj: &Value, keys: &[&str]) -> Option<String> {
    let map = obj.as_object()?;
    keys.iter()
        .filter_map(|key| map.get(*key))
        .filter_map(scalar_to_string)
        .find(|s| !s.trim().is_empty())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn pick_id(obj: &Value) -> Option<ProductId> {
    let map = obj.as_object()?;
    ID_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => Some(
                n.as_i64()
                    .map_or_else(|| ProductId::Text(n.to_string()), ProductId::Int),
            ),
            Value::String(s) if !s.trim().is_empty() => Some(ProductId::Text(s.trim().to_string())),
            _ => None,
        })
}

/// Extracts the `alias` query parameter from a product detail URL.
///
/// Falls back to a plain pattern match when the URL does not parse (Youzan
/// occasionally returns scheme-less detail links).
#[must_use]
pub fn alias_from_product_url(product_url: &str) -> Option<String> {
    if let Ok(url) = reqwest::Url::parse(product_url) {
        return url
            .query_pairs()
            .find(|(k, _)| k == "alias")
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty());
    }
    ALIAS_PARAM_RE
        .captures(product_url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Normalizes one raw list item into a [`Product`].
///
/// Never fails: every attribute has a default. `title` falls back to
/// [`PLACEHOLDER_TITLE`] and `alias` falls back to the `alias` parameter of the
/// product URL.
#[must_use]
pub fn normalize_product(raw: &Value) -> Product {
    let product_url = pick_string(raw, PRODUCT_URL_KEYS);
    let alias = pick_string(raw, ALIAS_KEYS)
        .or_else(|| product_url.as_deref().and_then(alias_from_product_url));

    Product {
        id: pick_id(raw),
        title: pick_string(raw, TITLE_KEYS).unwrap_or_else(|| PLACEHOLDER_TITLE.to_string()),
        desc: pick_string(raw, DESC_KEYS).unwrap_or_default(),
        product_url,
        image_url: pick_string(raw, IMAGE_URL_KEYS),
        price: pick_string(raw, PRICE_KEYS),
        alias,
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
