use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn parse_environment_production() {
    assert_eq!(parse_environment("production"), Environment::Production);
}

#[test]
fn parse_environment_unknown_defaults_to_development() {
    assert_eq!(parse_environment("staging"), Environment::Development);
}

#[test]
fn build_app_config_applies_defaults_with_empty_env() {
    let map: HashMap<&str, &str> = HashMap::new();
    let config = build_app_config(lookup_from_map(&map)).expect("defaults are valid");

    assert_eq!(config.env, Environment::Development);
    assert_eq!(config.bind_addr.port(), 3001);
    assert_eq!(config.log_level, "info");
    assert_eq!(
        config.catalog_path,
        PathBuf::from("./public/data/youzan_local.json")
    );
    assert_eq!(config.sync.interval_minutes, 30);
    assert_eq!(config.sync.max_retries, 2);
    assert_eq!(config.sync.backoff_base_ms, 500);
    assert!(config.sync.resolve_links);
    assert_eq!(config.youzan.token_ttl_secs, 1800);
    assert_eq!(config.youzan.http_method, "GET");
    assert_eq!(config.youzan.auth_style, AuthStyle::Header);
    assert_eq!(config.youzan.auth_url, DEFAULT_AUTH_URL);
    assert_eq!(
        config.youzan.links.channel_link,
        DEFAULT_CHANNEL_LINK_ENDPOINT
    );
    assert!(config.youzan.client_id.is_none());
    assert!(!config.sync_enabled());
}

#[test]
fn build_app_config_reads_youzan_settings() {
    let mut map = HashMap::new();
    map.insert("YOUZAN_CLIENT_ID", "cid");
    map.insert("YOUZAN_CLIENT_SECRET", "secret");
    map.insert("YOUZAN_GRANT_ID", "12345");
    map.insert("YOUZAN_PRODUCTS_ENDPOINT", "https://open.youzanyun.com/api/items");
    map.insert("YOUZAN_HTTP_METHOD", "post");
    map.insert("YOUZAN_AUTH_STYLE", "Query");
    map.insert("YOUZAN_PRODUCTS_PAYLOAD_JSON", r#"{"page_no":1,"page_size":50}"#);

    let config = build_app_config(lookup_from_map(&map)).unwrap();

    assert_eq!(config.youzan.client_id.as_deref(), Some("cid"));
    assert_eq!(config.youzan.grant_id.as_deref(), Some("12345"));
    assert_eq!(config.youzan.http_method, "POST");
    assert_eq!(config.youzan.auth_style, AuthStyle::Query);
    assert!(config.sync_enabled());
}

#[test]
fn build_app_config_treats_blank_values_as_unset() {
    let mut map = HashMap::new();
    map.insert("YOUZAN_PRODUCTS_ENDPOINT", "   ");
    map.insert("YOUZAN_CLIENT_ID", "");

    let config = build_app_config(lookup_from_map(&map)).unwrap();
    assert!(config.youzan.products_endpoint.is_none());
    assert!(config.youzan.client_id.is_none());
}

#[test]
fn build_app_config_clamps_sync_interval_to_one_minute() {
    let mut map = HashMap::new();
    map.insert("BREWPICK_SYNC_INTERVAL_MINUTES", "0");

    let config = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(config.sync.interval_minutes, 1);
}

#[test]
fn build_app_config_rejects_unknown_auth_style() {
    let mut map = HashMap::new();
    map.insert("YOUZAN_AUTH_STYLE", "cookie");

    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "YOUZAN_AUTH_STYLE"),
        "expected InvalidEnvVar(YOUZAN_AUTH_STYLE), got: {result:?}"
    );
}

#[test]
fn build_app_config_rejects_non_object_payload_template() {
    let mut map = HashMap::new();
    map.insert("YOUZAN_PRODUCTS_PAYLOAD_JSON", "[1, 2]");

    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "YOUZAN_PRODUCTS_PAYLOAD_JSON"),
        "expected InvalidEnvVar(YOUZAN_PRODUCTS_PAYLOAD_JSON), got: {result:?}"
    );
}

#[test]
fn build_app_config_rejects_invalid_bind_addr() {
    let mut map = HashMap::new();
    map.insert("BREWPICK_BIND_ADDR", "not-an-addr");

    let result = build_app_config(lookup_from_map(&map));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "BREWPICK_BIND_ADDR"
    ));
}

#[test]
fn build_app_config_parses_resolve_links_flag() {
    let mut map = HashMap::new();
    map.insert("BREWPICK_RESOLVE_LINKS", "off");

    let config = build_app_config(lookup_from_map(&map)).unwrap();
    assert!(!config.sync.resolve_links);
}

#[test]
fn app_config_debug_redacts_secrets() {
    let mut map = HashMap::new();
    map.insert("YOUZAN_CLIENT_SECRET", "super-secret-value");
    map.insert("ARK_API_KEY", "ark-key-value");

    let config = build_app_config(lookup_from_map(&map)).unwrap();
    let debug = format!("{config:?}");
    assert!(!debug.contains("super-secret-value"));
    assert!(!debug.contains("ark-key-value"));
    assert!(debug.contains("[redacted]"));
}
