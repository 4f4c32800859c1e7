//! Multi-page product fetch loop for `YouzanClient`.

use brewpick_core::{AuthStyle, Product};

use crate::error::YouzanError;
use crate::normalize::normalize_product;

use super::{YouzanClient, MAX_PAGES};

impl YouzanClient {
    /// Fetches every product from the configured listing endpoint.
    ///
    /// When the first response is a 200 carrying upstream error code 4201
    /// under header auth, the request is repeated once with query-parameter
    /// auth; later pages keep whichever style produced the first page.
    ///
    /// Pagination only applies to non-GET methods with a payload template:
    /// the page number is incremented until the accumulated item count reaches
    /// the declared total or a page comes back empty, bounded by
    /// [`MAX_PAGES`] fetches.
    ///
    /// A non-success status on any page discards earlier pages and returns
    /// the error.
    ///
    /// # Errors
    ///
    /// - [`YouzanError::Configuration`] if no listing endpoint is configured
    ///   or credentials are missing.
    /// - [`YouzanError::UpstreamAuth`] if the token exchange fails.
    /// - [`YouzanError::UpstreamFetch`] on a non-success listing status.
    /// - [`YouzanError::Http`] on network failure.
    pub async fn fetch_all(&self) -> Result<Vec<Product>, YouzanError> {
        let listing = self
            .listing
            .as_ref()
            .ok_or_else(|| YouzanError::Configuration("YOUZAN_PRODUCTS_ENDPOINT".to_string()))?;
        let token = self.tokens.get_token().await?;

        let first_page_no = listing.payload.as_ref().map_or(1, |p| p.first_page);
        let mut style = listing.auth_style;

        tracing::info!(
            url = %listing.endpoint,
            method = %listing.method,
            auth = %style,
            paginated = listing.payload.is_some(),
            "fetching youzan products"
        );

        let mut raw = self
            .send_listing(listing, &token, style, first_page_no)
            .await?;

        if style == AuthStyle::Header && Self::rejected_header_auth(&raw) {
            tracing::warn!("listing rejected header auth (err_code=4201); retrying with query auth");
            match self
                .send_listing(listing, &token, AuthStyle::Query, first_page_no)
                .await
            {
                Ok(retried) => {
                    raw = retried;
                    style = AuthStyle::Query;
                }
                Err(e) => tracing::warn!(error = %e, "query-auth retry failed"),
            }
        }

        let first = Self::parse_page(listing, &raw)?;
        let total = first.total.unwrap_or(first.items.len());
        let mut items = first.items;
        let mut pages_fetched = 1usize;

        if listing.payload.is_some() {
            let mut page_no = first_page_no;
            while items.len() < total {
                if pages_fetched >= MAX_PAGES {
                    tracing::warn!(
                        max_pages = MAX_PAGES,
                        fetched = items.len(),
                        total,
                        "pagination limit reached; returning accumulated products"
                    );
                    break;
                }
                page_no += 1;
                let raw = self.send_listing(listing, &token, style, page_no).await?;
                pages_fetched += 1;
                let page = Self::parse_page(listing, &raw)?;
                if page.items.is_empty() {
                    break;
                }
                items.extend(page.items);
            }
        }

        tracing::info!(count = items.len(), pages = pages_fetched, "mapped youzan product list");
        Ok(items.iter().map(normalize_product).collect())
    }
}
