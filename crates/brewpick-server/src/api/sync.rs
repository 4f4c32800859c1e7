use std::convert::Infallible;
use std::time::{Duration, UNIX_EPOCH};

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use brewpick_sync::{SyncOutcome, SyncStatus};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::middleware::RequestId;

use super::{ApiError, AppState};

const ALREADY_RUNNING_REASON: &str = "sync already in progress";

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(super) struct SyncResult {
    ok: bool,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl From<SyncOutcome> for SyncResult {
    fn from(outcome: SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Written { count } => Self {
                ok: true,
                count,
                reason: None,
            },
            SyncOutcome::Skipped { reason } => Self {
                ok: false,
                count: 0,
                reason: Some(reason),
            },
            SyncOutcome::AlreadyRunning => Self {
                ok: false,
                count: 0,
                reason: Some(ALREADY_RUNNING_REASON.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenSummary {
    hits: u64,
    refreshes: u64,
    expires_at: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SyncStatusResponse {
    synced: bool,
    updated_at: Option<u64>,
    #[serde(flatten)]
    status: SyncStatus,
    token: TokenSummary,
}

/// Runs one sync immediately, without fetch retries.
pub(super) async fn trigger_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<SyncResult>, ApiError> {
    match state.sync.run(0).await {
        Ok(outcome) => Ok(Json(outcome.into())),
        Err(e) => Err(ApiError::new(req_id.0, "sync_failed", e.to_string())),
    }
}

pub(super) async fn sync_status(State(state): State<AppState>) -> Json<SyncStatusResponse> {
    let updated_at = state
        .sync
        .store()
        .last_modified()
        .await
        .and_then(|mtime| mtime.duration_since(UNIX_EPOCH).ok())
        .and_then(|since| u64::try_from(since.as_millis()).ok());
    let stats = state.sync.token_stats().await;

    Json(SyncStatusResponse {
        synced: updated_at.is_some(),
        updated_at,
        status: state.sync.status(),
        token: TokenSummary {
            hits: stats.hits,
            refreshes: stats.refreshes,
            expires_at: stats.expires_at.map(|at| at.timestamp_millis()),
        },
    })
}

/// Server-sent event stream of sync completions and failures.
pub(super) async fn sync_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.sync.subscribe();
    let opening = stream::once(async { Ok(Event::default().comment("ok")) });
    Sse::new(opening.chain(event_stream(receiver)))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn event_stream(
    receiver: broadcast::Receiver<brewpick_sync::SyncEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let frame = match Event::default().event(event.name()).json_data(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to encode sync event");
                            continue;
                        }
                    };
                    return Some((Ok(frame), receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "sync event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
