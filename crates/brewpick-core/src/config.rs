use std::net::SocketAddr;
use std::path::PathBuf;

use crate::app_config::{
    AiSettings, AppConfig, AuthStyle, Environment, LinkEndpoints, SyncSettings, YouzanSettings,
    DEFAULT_ARK_API_BASE, DEFAULT_ARK_MODEL, DEFAULT_AUTH_URL, DEFAULT_CHANNEL_LINK_ENDPOINT,
};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can use a `HashMap` lookup.
/// Blank values are treated the same as unset ones.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let or_default =
        |var: &str, default: &str| -> String { optional(var).unwrap_or_else(|| default.to_string()) };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("BREWPICK_ENV", "development"));

    let bind_addr = or_default("BREWPICK_BIND_ADDR", "0.0.0.0:3001")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("BREWPICK_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("BREWPICK_LOG_LEVEL", "info");
    let catalog_path = PathBuf::from(or_default(
        "BREWPICK_CATALOG_PATH",
        "./public/data/youzan_local.json",
    ));
    let images_dir = PathBuf::from(or_default("BREWPICK_IMAGES_DIR", "./public/images"));
    let http_timeout_secs = parse_u64("BREWPICK_HTTP_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("BREWPICK_USER_AGENT", "brewpick/0.1 (catalog-sync)");

    let sync = SyncSettings {
        // Intervals below one minute are clamped rather than rejected.
        interval_minutes: parse_u64("BREWPICK_SYNC_INTERVAL_MINUTES", "30")?.max(1),
        startup_delay_ms: parse_u64("BREWPICK_SYNC_STARTUP_DELAY_MS", "1000")?,
        max_retries: parse_u32("BREWPICK_SYNC_MAX_RETRIES", "2")?,
        backoff_base_ms: parse_u64("BREWPICK_SYNC_BACKOFF_BASE_MS", "500")?,
        resolve_links: parse_bool("BREWPICK_RESOLVE_LINKS", &or_default("BREWPICK_RESOLVE_LINKS", "true"))?,
    };

    let http_method = or_default("YOUZAN_HTTP_METHOD", "GET").to_ascii_uppercase();
    if !http_method.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid(
            "YOUZAN_HTTP_METHOD",
            format!("\"{http_method}\" is not an HTTP method"),
        ));
    }

    let products_payload_json = optional("YOUZAN_PRODUCTS_PAYLOAD_JSON");
    if let Some(raw) = &products_payload_json {
        let parsed: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| invalid("YOUZAN_PRODUCTS_PAYLOAD_JSON", e.to_string()))?;
        if !parsed.is_object() {
            return Err(invalid(
                "YOUZAN_PRODUCTS_PAYLOAD_JSON",
                "payload template must be a JSON object".to_string(),
            ));
        }
    }

    let youzan = YouzanSettings {
        client_id: optional("YOUZAN_CLIENT_ID"),
        client_secret: optional("YOUZAN_CLIENT_SECRET"),
        grant_id: optional("YOUZAN_GRANT_ID"),
        authorize_type: or_default("YOUZAN_AUTHORIZE_TYPE", "silent"),
        auth_url: or_default("YOUZAN_AUTH_URL", DEFAULT_AUTH_URL),
        token_ttl_secs: parse_u64("YOUZAN_TOKEN_TTL_SECONDS", "1800")?,
        products_endpoint: optional("YOUZAN_PRODUCTS_ENDPOINT"),
        http_method,
        auth_style: or_default("YOUZAN_AUTH_STYLE", "header").parse::<AuthStyle>()?,
        products_payload_json,
        links: LinkEndpoints {
            page_url: optional("YOUZAN_PAGE_URL_ENDPOINT"),
            short_link: optional("YOUZAN_SHORT_LINK_ENDPOINT"),
            channel_link: or_default("YOUZAN_CHANNEL_LINK_ENDPOINT", DEFAULT_CHANNEL_LINK_ENDPOINT),
        },
    };

    let ai = AiSettings {
        api_key: optional("ARK_API_KEY"),
        api_base: or_default("ARK_API_BASE", DEFAULT_ARK_API_BASE),
        model: or_default("ARK_MODEL", DEFAULT_ARK_MODEL),
    };

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        catalog_path,
        images_dir,
        http_timeout_secs,
        user_agent,
        sync,
        youzan,
        ai,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
