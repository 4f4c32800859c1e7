use thiserror::Error;

#[derive(Debug, Error)]
pub enum YouzanError {
    /// A required credential or endpoint is not configured. Names the variable.
    #[error("missing configuration: {0}")]
    Configuration(String),

    #[error("token request failed{}: {reason}", status_suffix(.status))]
    UpstreamAuth { status: Option<u16>, reason: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UpstreamFetch { status: u16, url: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl YouzanError {
    /// Returns `true` for upstream failures that may succeed on a later attempt.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            YouzanError::UpstreamAuth { .. } | YouzanError::UpstreamFetch { .. } | YouzanError::Http(_)
        )
    }
}
