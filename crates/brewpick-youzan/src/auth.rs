//! Access-token exchange and in-process caching.
//!
//! The cache lives for the lifetime of the process only; nothing is written
//! to disk. A cached token is served until 60 seconds before its declared
//! expiry, after which the next caller refreshes it.

use std::time::Duration;

use brewpick_core::YouzanSettings;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::YouzanError;

/// Tokens are treated as expired this long before the upstream-declared expiry.
pub const EXPIRY_SAFETY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    authorize_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    grant_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<TokenData>,
}

/// Youzan has shipped both `expires_in` and `expire_in` over time, as
/// numbers or numeric strings.
#[derive(Debug, Deserialize)]
struct TokenData {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    expire_in: Option<Value>,
}

/// A freshly exchanged token with its declared lifetime, if any.
#[derive(Debug)]
struct IssuedToken {
    token: String,
    expires_in_secs: Option<u64>,
}

#[derive(Debug, Default)]
struct TokenCache {
    token: Option<String>,
    obtained_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    hits: u64,
    refreshes: u64,
}

impl TokenCache {
    fn fresh_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let expires_at = self.expires_at?;
        let margin = chrono::Duration::from_std(EXPIRY_SAFETY_MARGIN).unwrap_or_default();
        if now < expires_at - margin {
            self.token.as_deref()
        } else {
            None
        }
    }

    /// Stores `token` valid for `ttl`, or for `fallback_ttl` when `ttl` does
    /// not fit in a timestamp.
    fn store(
        &mut self,
        token: String,
        now: DateTime<Utc>,
        ttl: Duration,
        fallback_ttl: Duration,
    ) {
        let expires_at = expiry(now, ttl)
            .or_else(|| expiry(now, fallback_ttl))
            .unwrap_or(now);
        self.token = Some(token);
        self.obtained_at = Some(now);
        self.expires_at = Some(expires_at);
        self.refreshes += 1;
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl).ok()?;
    now.checked_add_signed(ttl)
}

/// Reads a positive lifetime in whole seconds from a number or numeric
/// string. Zero, negative and non-numeric values count as absent.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn ttl_secs(value: Option<&Value>) -> Option<u64> {
    let secs = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if secs.is_finite() && secs >= 1.0 {
        Some(secs.min(u64::MAX as f64) as u64)
    } else {
        None
    }
}

/// Observability snapshot of the token cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStats {
    pub hits: u64,
    pub refreshes: u64,
    pub obtained_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Obtains and caches the bearer token for the Youzan open platform.
///
/// Refreshes are single-flight: the cache lock is held for the duration of
/// the token exchange, so concurrent callers that find an expired token wait
/// for one refresh instead of each issuing their own.
pub struct TokenProvider {
    http: Client,
    auth_url: String,
    authorize_type: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    grant_id: Option<String>,
    default_ttl: Duration,
    cache: Mutex<TokenCache>,
}

impl TokenProvider {
    #[must_use]
    pub fn new(http: Client, settings: &YouzanSettings) -> Self {
        Self {
            http,
            auth_url: settings.auth_url.clone(),
            authorize_type: settings.authorize_type.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            grant_id: settings.grant_id.clone(),
            default_ttl: Duration::from_secs(settings.token_ttl_secs),
            cache: Mutex::new(TokenCache::default()),
        }
    }

    /// Returns a valid access token, exchanging credentials if the cached
    /// one is missing or inside the expiry safety margin.
    ///
    /// # Errors
    ///
    /// - [`YouzanError::Configuration`] if a credential is not configured.
    /// - [`YouzanError::UpstreamAuth`] on a non-success status or a response
    ///   without `success: true` and an access token.
    /// - [`YouzanError::Http`] on network failure.
    pub async fn get_token(&self) -> Result<String, YouzanError> {
        let mut cache = self.cache.lock().await;
        let now = Utc::now();

        if let Some(token) = cache.fresh_token(now).map(str::to_owned) {
            cache.hits += 1;
            let left_secs = cache
                .expires_at
                .map_or(0, |at| (at - now).num_seconds().max(0));
            tracing::debug!(
                left_secs,
                hits = cache.hits,
                refreshes = cache.refreshes,
                "youzan token cache hit"
            );
            return Ok(token);
        }

        let issued = self.request_token().await?;
        let ttl = issued
            .expires_in_secs
            .map_or(self.default_ttl, Duration::from_secs);
        cache.store(issued.token.clone(), now, ttl, self.default_ttl);
        tracing::info!(
            token = %mask_token(&issued.token),
            ttl_secs = ttl.as_secs(),
            hits = cache.hits,
            refreshes = cache.refreshes,
            "youzan token refreshed"
        );
        Ok(issued.token)
    }

    /// Snapshot of the cache counters and timestamps.
    pub async fn stats(&self) -> TokenStats {
        let cache = self.cache.lock().await;
        TokenStats {
            hits: cache.hits,
            refreshes: cache.refreshes,
            obtained_at: cache.obtained_at,
            expires_at: cache.expires_at,
        }
    }

    fn credentials(&self) -> Result<(&str, &str, &str), YouzanError> {
        fn require<'a>(value: Option<&'a str>, var: &str) -> Result<&'a str, YouzanError> {
            value.ok_or_else(|| YouzanError::Configuration(var.to_string()))
        }

        Ok((
            require(self.client_id.as_deref(), "YOUZAN_CLIENT_ID")?,
            require(self.client_secret.as_deref(), "YOUZAN_CLIENT_SECRET")?,
            require(self.grant_id.as_deref(), "YOUZAN_GRANT_ID")?,
        ))
    }

    async fn request_token(&self) -> Result<IssuedToken, YouzanError> {
        let (client_id, client_secret, grant_id) = self.credentials()?;
        tracing::info!(
            authorize_type = %self.authorize_type,
            client_id_len = client_id.len(),
            grant_id,
            "requesting youzan token"
        );

        let response = self
            .http
            .post(&self.auth_url)
            .json(&TokenRequest {
                authorize_type: &self.authorize_type,
                client_id,
                client_secret,
                grant_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(YouzanError::UpstreamAuth {
                status: Some(status.as_u16()),
                reason: "token endpoint returned a non-success status".to_string(),
            });
        }

        let body = response.text().await?;
        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| YouzanError::UpstreamAuth {
                status: Some(status.as_u16()),
                reason: format!("malformed token response: {e}"),
            })?;

        let TokenResponse {
            success,
            message,
            data,
        } = parsed;
        let Some(data) = data.filter(|_| success) else {
            return Err(YouzanError::UpstreamAuth {
                status: Some(status.as_u16()),
                reason: message.unwrap_or_else(|| "unknown".to_string()),
            });
        };
        let Some(token) = data.access_token.filter(|t| !t.is_empty()) else {
            return Err(YouzanError::UpstreamAuth {
                status: Some(status.as_u16()),
                reason: message.unwrap_or_else(|| "response carried no access_token".to_string()),
            });
        };

        let expires_in_secs =
            ttl_secs(data.expires_in.as_ref()).or_else(|| ttl_secs(data.expire_in.as_ref()));

        Ok(IssuedToken {
            token,
            expires_in_secs,
        })
    }
}

/// Masks a token for logging: first and last four characters plus length.
#[must_use]
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return "n/a".to_string();
    }
    let chars: Vec<char> = token.chars().collect();
    let head: String = chars.iter().take(4).collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{head}****{tail}(len={})", chars.len())
}

/// Returns `url` with its `access_token` query parameter set to `token`,
/// replacing any existing value.
pub(crate) fn with_access_token(url: &Url, token: &str) -> Url {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "access_token")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut out = url.clone();
    {
        let mut pairs = out.query_pairs_mut();
        pairs.clear();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("access_token", token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_respects_safety_margin() {
        let now = Utc::now();
        let mut cache = TokenCache::default();
        cache.store("tok".to_string(), now, Duration::from_secs(120), Duration::from_secs(1800));

        assert_eq!(cache.fresh_token(now), Some("tok"));
        assert_eq!(
            cache.fresh_token(now + chrono::Duration::seconds(59)),
            Some("tok")
        );
        assert_eq!(cache.fresh_token(now + chrono::Duration::seconds(60)), None);
    }

    #[test]
    fn fresh_token_is_none_when_ttl_shorter_than_margin() {
        let now = Utc::now();
        let mut cache = TokenCache::default();
        cache.store("tok".to_string(), now, Duration::from_secs(30), Duration::from_secs(1800));
        assert_eq!(cache.fresh_token(now), None);
    }

    #[test]
    fn store_counts_refreshes() {
        let now = Utc::now();
        let mut cache = TokenCache::default();
        cache.store("a".to_string(), now, Duration::from_secs(10), Duration::from_secs(1800));
        cache.store("b".to_string(), now, Duration::from_secs(10), Duration::from_secs(1800));
        assert_eq!(cache.refreshes, 2);
        assert_eq!(cache.token.as_deref(), Some("b"));
    }

    #[test]
    fn store_falls_back_when_ttl_overflows_timestamp() {
        let now = Utc::now();
        let mut cache = TokenCache::default();
        cache.store(
            "tok".to_string(),
            now,
            Duration::from_secs(1_000_000_000_000_000),
            Duration::from_secs(1800),
        );
        assert_eq!(cache.expires_at, Some(now + chrono::Duration::seconds(1800)));
        assert_eq!(cache.fresh_token(now), Some("tok"));
    }

    #[test]
    fn ttl_secs_accepts_numbers_and_numeric_strings() {
        assert_eq!(ttl_secs(Some(&Value::from(7200))), Some(7200));
        assert_eq!(ttl_secs(Some(&Value::from("7200"))), Some(7200));
        assert_eq!(ttl_secs(Some(&Value::from(7200.9))), Some(7200));
    }

    #[test]
    fn ttl_secs_treats_non_positive_and_non_numeric_as_absent() {
        assert_eq!(ttl_secs(Some(&Value::from(0))), None);
        assert_eq!(ttl_secs(Some(&Value::from(-5))), None);
        assert_eq!(ttl_secs(Some(&Value::from("soon"))), None);
        assert_eq!(ttl_secs(Some(&Value::Bool(true))), None);
        assert_eq!(ttl_secs(None), None);
    }

    #[test]
    fn mask_token_keeps_head_and_tail() {
        assert_eq!(mask_token("abcdefghijkl"), "abcd****ijkl(len=12)");
        assert_eq!(mask_token(""), "n/a");
    }

    #[test]
    fn with_access_token_replaces_existing_parameter() {
        let url = Url::parse("https://open.youzanyun.com/api/x?access_token=old&a=1").unwrap();
        let out = with_access_token(&url, "new");
        assert_eq!(
            out.as_str(),
            "https://open.youzanyun.com/api/x?a=1&access_token=new"
        );
    }
}
