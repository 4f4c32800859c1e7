//! Best-effort mini-program deep-link resolution.
//!
//! A product alias is turned into an in-app page path, then into a shareable
//! link by walking an ordered list of [`LinkStrategy`] values. Each strategy
//! yields an optional [`LinkAttempt`]; the first attempt flagged as a success
//! wins. Every upstream failure along the way is logged and treated as "no
//! link from this step", so [`LinkResolver::resolve_link`] never fails.

use std::sync::Arc;

use brewpick_core::{LinkEndpoints, PLACEHOLDER_TITLE};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Url};
use serde_json::{json, Value};

use crate::auth::{with_access_token, TokenProvider};
use crate::normalize::pick_string;

/// Link-type discriminator value reported by the short-link endpoint when it
/// produced the requested kind of link.
pub const SHORT_LINK_SUCCESS_TYPE: &str = "short_link";

/// Upstream limit on the page title sent with link requests, in characters.
const PAGE_TITLE_MAX_CHARS: usize = 20;

/// Characters left unescaped by JavaScript's `encodeURIComponent`, which the
/// in-app router expects.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const PAGE_PATH_KEYS: &[&str] = &["page_url", "path", "url"];
const SHORT_LINK_KEYS: &[&str] = &["short_link", "link", "url_link"];
const CHANNEL_LINK_KEYS: &[&str] = &["mini_program_url"];

/// One step of the resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStrategy {
    /// Short link via the short-link endpoint, temporary or permanent.
    ShortLink { permanent: bool },
    /// Generic channel link; tries temporary then permanent and prefers the
    /// permanent result.
    ChannelLink,
}

/// Default chain: temporary short link, permanent short link, channel link.
pub const DEFAULT_STRATEGIES: [LinkStrategy; 3] = [
    LinkStrategy::ShortLink { permanent: false },
    LinkStrategy::ShortLink { permanent: true },
    LinkStrategy::ChannelLink,
];

/// Outcome of one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAttempt {
    pub url: String,
    /// Whether the link is of the desired kind. Non-success attempts do not
    /// stop the chain.
    pub success: bool,
}

/// Resolves shareable mini-program links for product aliases.
pub struct LinkResolver {
    http: Client,
    tokens: Arc<TokenProvider>,
    endpoints: LinkEndpoints,
    strategies: Vec<LinkStrategy>,
}

impl LinkResolver {
    #[must_use]
    pub fn new(http: Client, tokens: Arc<TokenProvider>, endpoints: LinkEndpoints) -> Self {
        Self {
            http,
            tokens,
            endpoints,
            strategies: DEFAULT_STRATEGIES.to_vec(),
        }
    }

    /// Replaces the strategy chain.
    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<LinkStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Resolves a deep link for `alias`, returning an empty string if no
    /// strategy succeeds.
    pub async fn resolve_link(&self, alias: &str, title: &str) -> String {
        let alias = alias.trim();
        if alias.is_empty() {
            return String::new();
        }

        let token = match self.tokens.get_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(alias, error = %e, "no token for link resolution");
                return String::new();
            }
        };

        let page_url = self.page_path(&token, alias).await;
        let page_title = page_title(title);

        for strategy in &self.strategies {
            match self.attempt(*strategy, &token, &page_url, &page_title).await {
                Some(attempt) if attempt.success => {
                    tracing::debug!(alias, ?strategy, url = %attempt.url, "resolved mini-program link");
                    return attempt.url;
                }
                Some(attempt) => {
                    tracing::debug!(alias, ?strategy, url = %attempt.url, "degraded link; trying next strategy");
                }
                None => tracing::debug!(alias, ?strategy, "no link from strategy"),
            }
        }

        tracing::info!(alias, "no mini-program link resolved");
        String::new()
    }

    /// Runs a single strategy.
    pub async fn attempt(
        &self,
        strategy: LinkStrategy,
        token: &str,
        page_url: &str,
        page_title: &str,
    ) -> Option<LinkAttempt> {
        match strategy {
            LinkStrategy::ShortLink { permanent } => {
                self.short_link(token, page_url, page_title, permanent).await
            }
            LinkStrategy::ChannelLink => self.channel_link(token, page_url, page_title).await,
        }
    }

    /// Canonical in-app page path for `alias`, from the page-URL endpoint
    /// when configured, else hand-built.
    pub async fn page_path(&self, token: &str, alias: &str) -> String {
        if let Some(endpoint) = &self.endpoints.page_url {
            let created = self
                .post_json(endpoint, token, &json!({ "alias": alias }))
                .await
                .and_then(|body| data_string(&body, PAGE_PATH_KEYS));
            if let Some(path) = created {
                return path;
            }
            tracing::debug!(alias, "page-url endpoint gave no path; using built path");
        }
        fallback_page_path(alias)
    }

    async fn short_link(
        &self,
        token: &str,
        page_url: &str,
        page_title: &str,
        permanent: bool,
    ) -> Option<LinkAttempt> {
        let endpoint = self.endpoints.short_link.as_deref()?;
        let body = self
            .post_json(endpoint, token, &link_request(page_url, page_title, permanent))
            .await?;
        let url = data_string(&body, SHORT_LINK_KEYS).unwrap_or_default();
        let success = !url.is_empty() && is_short_link_success(&body);
        Some(LinkAttempt { url, success })
    }

    async fn channel_link(
        &self,
        token: &str,
        page_url: &str,
        page_title: &str,
    ) -> Option<LinkAttempt> {
        let endpoint = self.endpoints.channel_link.as_str();
        let temporary = self
            .channel_call(endpoint, token, page_url, page_title, false)
            .await;
        let permanent = self
            .channel_call(endpoint, token, page_url, page_title, true)
            .await;

        let url = permanent.or(temporary)?;
        Some(LinkAttempt { url, success: true })
    }

    async fn channel_call(
        &self,
        endpoint: &str,
        token: &str,
        page_url: &str,
        page_title: &str,
        permanent: bool,
    ) -> Option<String> {
        let body = self
            .post_json(endpoint, token, &link_request(page_url, page_title, permanent))
            .await?;
        let ok = body.get("success").and_then(Value::as_bool).unwrap_or(false);
        let url_type = body
            .get("data")
            .and_then(|d| d.get("url_type"))
            .and_then(Value::as_str)
            .unwrap_or("n/a");
        tracing::debug!(permanent, url_type, ok, "channel link response");
        data_string(&body, CHANNEL_LINK_KEYS)
    }

    /// POSTs `payload` with query-parameter auth. Every failure maps to `None`.
    async fn post_json(&self, endpoint: &str, token: &str, payload: &Value) -> Option<Value> {
        let url = match Url::parse(endpoint) {
            Ok(url) => with_access_token(&url, token),
            Err(e) => {
                tracing::warn!(endpoint, error = %e, "invalid link endpoint");
                return None;
            }
        };

        let response = match self.http.post(url).json(payload).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(endpoint, error = %e, "link request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(endpoint, http = status.as_u16(), "link request returned non-success status");
            return None;
        }

        match response.json::<Value>().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(endpoint, error = %e, "link response is not JSON");
                None
            }
        }
    }
}

fn link_request(page_url: &str, page_title: &str, permanent: bool) -> Value {
    json!({
        "page_url": page_url,
        "page_title": page_title,
        "is_permanent": permanent,
    })
}

/// Reads the first non-empty string among `keys` under `data`.
fn data_string(body: &Value, keys: &[&str]) -> Option<String> {
    let data = body.get("data")?;
    if let Value::String(s) = data {
        return Some(s.clone()).filter(|s| !s.trim().is_empty());
    }
    pick_string(data, keys)
}

/// Whether the short-link response's `data.url_type` reports success.
fn is_short_link_success(body: &Value) -> bool {
    match body.get("data").and_then(|d| d.get("url_type")) {
        Some(Value::String(kind)) => kind.trim().eq_ignore_ascii_case(SHORT_LINK_SUCCESS_TYPE),
        _ => false,
    }
}

/// Hand-built goods detail page path for `alias`.
#[must_use]
pub fn fallback_page_path(alias: &str) -> String {
    format!(
        "packages/goods/detail/index?alias={}",
        utf8_percent_encode(alias, URI_COMPONENT)
    )
}

/// Product title trimmed to the upstream page-title limit.
#[must_use]
pub fn page_title(title: &str) -> String {
    let title = title.trim();
    let title = if title.is_empty() { PLACEHOLDER_TITLE } else { title };
    title.chars().take(PAGE_TITLE_MAX_CHARS).collect()
}
