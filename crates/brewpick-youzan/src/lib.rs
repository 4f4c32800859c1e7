pub mod auth;
pub mod client;
pub mod error;
pub mod links;
pub mod normalize;

pub use auth::{TokenProvider, TokenStats};
pub use client::YouzanClient;
pub use error::YouzanError;
pub use links::{LinkAttempt, LinkResolver, LinkStrategy};
pub use normalize::normalize_product;

use std::time::Duration;

/// Builds the shared `reqwest::Client` used for every Youzan call.
///
/// # Errors
///
/// Returns [`YouzanError::Http`] if the client cannot be constructed.
pub fn build_http_client(timeout_secs: u64, user_agent: &str) -> Result<reqwest::Client, YouzanError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

/// Collapses whitespace and truncates an upstream body for log lines.
#[must_use]
pub fn preview_text(s: &str, limit: usize) -> String {
    let one_line = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() > limit {
        let head: String = one_line.chars().take(limit).collect();
        format!("{head}…(truncated)")
    } else {
        one_line
    }
}
