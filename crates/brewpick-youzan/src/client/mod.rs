//! HTTP client for the Youzan product-listing endpoint.

mod envelope;
mod fetch_all;

use std::sync::Arc;

use brewpick_core::{AuthStyle, YouzanSettings};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::{Map, Value};

use crate::auth::{with_access_token, TokenProvider};
use crate::error::YouzanError;
use crate::normalize::pick;
use crate::preview_text;

pub(crate) use envelope::{extract_page, has_err_code, Page};

/// Maximum number of listing pages fetched in one run, first page included.
pub const MAX_PAGES: usize = 100;

/// Upstream error code signalling that the endpoint rejected header auth.
const AUTH_STYLE_ERR_CODE: i64 = 4201;

const OFFICIAL_HOST: &str = "open.youzanyun.com";

const DEFAULT_PAGE_SIZE: u64 = 20;

/// JSON body template for paginated (non-GET) listing calls.
#[derive(Debug, Clone)]
struct PagePayload {
    template: Map<String, Value>,
    first_page: u64,
    page_size: u64,
}

impl PagePayload {
    fn parse(raw: &str) -> Result<Self, YouzanError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| YouzanError::Deserialize {
            context: "YOUZAN_PRODUCTS_PAYLOAD_JSON".to_string(),
            source: e,
        })?;
        let first_page = positive_u64(pick(&value, &["page_no", "pageNo"])).unwrap_or(1);
        let page_size =
            positive_u64(pick(&value, &["page_size", "pageSize"])).unwrap_or(DEFAULT_PAGE_SIZE);
        let template = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(Self {
            template,
            first_page,
            page_size,
        })
    }

    fn body_for(&self, page_no: u64) -> Value {
        let mut body = self.template.clone();
        body.insert("page_no".to_string(), Value::from(page_no));
        body.insert("page_size".to_string(), Value::from(self.page_size));
        Value::Object(body)
    }
}

fn positive_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .filter(|n| *n > 0)
}

/// Fully resolved listing-call configuration.
#[derive(Debug, Clone)]
struct ListingRequest {
    endpoint: Url,
    method: Method,
    auth_style: AuthStyle,
    /// Only set for non-GET methods with a configured payload template.
    payload: Option<PagePayload>,
}

/// Raw listing response before JSON handling.
struct RawPage {
    status: StatusCode,
    body: String,
}

/// Client for the configured Youzan product-listing endpoint.
///
/// The access token is obtained from the shared [`TokenProvider`] once per
/// [`YouzanClient::fetch_all`] call.
pub struct YouzanClient {
    http: Client,
    tokens: Arc<TokenProvider>,
    listing: Option<ListingRequest>,
}

impl YouzanClient {
    /// Builds a client from settings. A missing listing endpoint is not an
    /// error here; it surfaces as [`YouzanError::Configuration`] from
    /// [`YouzanClient::fetch_all`].
    ///
    /// # Errors
    ///
    /// - [`YouzanError::InvalidUrl`] if the listing endpoint does not parse or
    ///   the HTTP method is not a valid token.
    /// - [`YouzanError::Deserialize`] if the payload template is not JSON.
    pub fn new(
        http: Client,
        tokens: Arc<TokenProvider>,
        settings: &YouzanSettings,
    ) -> Result<Self, YouzanError> {
        let listing = settings
            .products_endpoint
            .as_deref()
            .map(|endpoint| Self::listing_request(endpoint, settings))
            .transpose()?;
        Ok(Self {
            http,
            tokens,
            listing,
        })
    }

    /// Whether a listing endpoint is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.listing.is_some()
    }

    fn listing_request(
        endpoint: &str,
        settings: &YouzanSettings,
    ) -> Result<ListingRequest, YouzanError> {
        let url = Url::parse(endpoint).map_err(|e| YouzanError::InvalidUrl {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "https" {
            tracing::warn!(endpoint, "listing endpoint is not https; continuing");
        }
        if url.host_str() != Some(OFFICIAL_HOST) {
            tracing::warn!(
                endpoint,
                "listing endpoint is not on {OFFICIAL_HOST}; ignore if this is a proxy"
            );
        }

        let method = Method::from_bytes(settings.http_method.to_ascii_uppercase().as_bytes())
            .map_err(|e| YouzanError::InvalidUrl {
                url: endpoint.to_string(),
                reason: format!("invalid HTTP method \"{}\": {e}", settings.http_method),
            })?;

        let payload = if method == Method::GET {
            None
        } else {
            settings
                .products_payload_json
                .as_deref()
                .map(PagePayload::parse)
                .transpose()?
        };

        Ok(ListingRequest {
            endpoint: url,
            method,
            auth_style: settings.auth_style,
            payload,
        })
    }

    /// Issues one listing request with the given auth style.
    async fn send_listing(
        &self,
        listing: &ListingRequest,
        token: &str,
        style: AuthStyle,
        page_no: u64,
    ) -> Result<RawPage, YouzanError> {
        let url = match style {
            AuthStyle::Header => listing.endpoint.clone(),
            AuthStyle::Query => with_access_token(&listing.endpoint, token),
        };

        let mut request = self.http.request(listing.method.clone(), url);
        if style == AuthStyle::Header {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = &listing.payload {
            request = request.json(&payload.body_for(page_no));
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("n/a")
            .to_owned();
        let body = response.text().await?;

        tracing::debug!(
            http = status.as_u16(),
            content_type = %content_type,
            auth = %style,
            page_no,
            body_preview = %preview_text(&body, 400),
            "youzan listing response"
        );

        Ok(RawPage { status, body })
    }

    /// Interprets one raw page, failing on non-success status and tolerating
    /// unparseable bodies as empty pages.
    fn parse_page(listing: &ListingRequest, raw: &RawPage) -> Result<Page, YouzanError> {
        if !raw.status.is_success() {
            return Err(YouzanError::UpstreamFetch {
                status: raw.status.as_u16(),
                url: listing.endpoint.to_string(),
            });
        }

        match serde_json::from_str::<Value>(&raw.body) {
            Ok(body) => Ok(extract_page(&body)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    body_preview = %preview_text(&raw.body, 400),
                    "listing response is not JSON; treating as empty page"
                );
                Ok(Page::default())
            }
        }
    }

    /// Whether a 200 response reports that header auth was rejected.
    fn rejected_header_auth(raw: &RawPage) -> bool {
        raw.status == StatusCode::OK
            && serde_json::from_str::<Value>(&raw.body)
                .is_ok_and(|body| has_err_code(&body, AUTH_STYLE_ERR_CODE))
    }
}
