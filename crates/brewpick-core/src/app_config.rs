use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ConfigError;

/// Default token exchange endpoint of the Youzan open platform.
pub const DEFAULT_AUTH_URL: &str = "https://open.youzanyun.com/auth/token";

/// Default channel-link endpoint used as the last step of deep-link resolution.
pub const DEFAULT_CHANNEL_LINK_ENDPOINT: &str =
    "https://open.youzanyun.com/api/youzan.users.channel.app.link.get/1.0.0";

pub const DEFAULT_ARK_API_BASE: &str =
    "https://ark.cn-beijing.volces.com/api/v3/chat/completions";

pub const DEFAULT_ARK_MODEL: &str = "doubao-pro-128k";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// How the access token is attached to product-listing requests.
///
/// Youzan endpoints differ in which style they accept, so this is
/// configurable and the fetcher can fall back from one to the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <token>` header.
    Header,
    /// `access_token=<token>` query parameter.
    Query,
}

impl FromStr for AuthStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "header" => Ok(Self::Header),
            "query" => Ok(Self::Query),
            other => Err(ConfigError::InvalidEnvVar {
                var: "YOUZAN_AUTH_STYLE".to_string(),
                reason: format!("expected \"header\" or \"query\", got \"{other}\""),
            }),
        }
    }
}

impl std::fmt::Display for AuthStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthStyle::Header => write!(f, "header"),
            AuthStyle::Query => write!(f, "query"),
        }
    }
}

/// Upstream deep-link endpoints. Page-URL creation and short links are
/// optional; the channel link always has a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEndpoints {
    pub page_url: Option<String>,
    pub short_link: Option<String>,
    pub channel_link: String,
}

impl Default for LinkEndpoints {
    fn default() -> Self {
        Self {
            page_url: None,
            short_link: None,
            channel_link: DEFAULT_CHANNEL_LINK_ENDPOINT.to_string(),
        }
    }
}

/// Youzan credentials and endpoint configuration.
///
/// Credentials are optional at load time: their absence only fails the
/// operations that need a token, never process startup.
#[derive(Clone)]
pub struct YouzanSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub grant_id: Option<String>,
    pub authorize_type: String,
    pub auth_url: String,
    pub token_ttl_secs: u64,
    pub products_endpoint: Option<String>,
    pub http_method: String,
    pub auth_style: AuthStyle,
    pub products_payload_json: Option<String>,
    pub links: LinkEndpoints,
}

impl Default for YouzanSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            grant_id: None,
            authorize_type: "silent".to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_ttl_secs: 1800,
            products_endpoint: None,
            http_method: "GET".to_string(),
            auth_style: AuthStyle::Header,
            products_payload_json: None,
            links: LinkEndpoints::default(),
        }
    }
}

impl std::fmt::Debug for YouzanSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouzanSettings")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("grant_id", &self.grant_id)
            .field("authorize_type", &self.authorize_type)
            .field("auth_url", &self.auth_url)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("products_endpoint", &self.products_endpoint)
            .field("http_method", &self.http_method)
            .field("auth_style", &self.auth_style)
            .field("products_payload_json", &self.products_payload_json)
            .field("links", &self.links)
            .finish()
    }
}

/// Scheduling and retry policy for background catalog syncs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub interval_minutes: u64,
    pub startup_delay_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub resolve_links: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            startup_delay_ms: 1000,
            max_retries: 2,
            backoff_base_ms: 500,
            resolve_links: true,
        }
    }
}

/// Chat-completion passthrough used by the product intro endpoints.
#[derive(Clone)]
pub struct AiSettings {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_ARK_API_BASE.to_string(),
            model: DEFAULT_ARK_MODEL.to_string(),
        }
    }
}

impl std::fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub catalog_path: PathBuf,
    pub images_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub sync: SyncSettings,
    pub youzan: YouzanSettings,
    pub ai: AiSettings,
}

impl AppConfig {
    /// Background syncs only make sense once a listing endpoint is configured.
    #[must_use]
    pub fn sync_enabled(&self) -> bool {
        self.youzan.products_endpoint.is_some()
    }
}
