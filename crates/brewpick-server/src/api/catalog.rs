use axum::{extract::State, Json};
use brewpick_core::CatalogDocument;

use super::AppState;

/// Serves the persisted catalog, falling back to the bundled sample and then
/// to an empty document. Never fails.
pub(super) async fn get_products(State(state): State<AppState>) -> Json<CatalogDocument> {
    let (document, source) = state.sync.store().load_served_catalog().await;
    tracing::debug!(?source, count = document.products.len(), "serving catalog");
    Json(document)
}
