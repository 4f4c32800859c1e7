//! Local archive of product images.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{header::LOCATION, Client, Url};

use crate::error::CatalogError;

/// What [`ImageArchiver::archive`] did for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Downloaded { bytes: usize },
    AlreadyPresent,
}

/// Downloads product images into a single directory.
///
/// Uses its own client with automatic redirects disabled; at most one hop is
/// followed by hand.
pub struct ImageArchiver {
    http: Client,
    dir: PathBuf,
}

impl ImageArchiver {
    /// # Errors
    ///
    /// Returns [`CatalogError::Http`] if the HTTP client cannot be built.
    pub fn new(
        dir: impl Into<PathBuf>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, CatalogError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            dir: dir.into(),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ensures `image_url` is archived as `filename` in the image directory.
    ///
    /// An existing file is trusted as-is and no request is made.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Download`] on a non-success final status, including
    ///   a second redirect.
    /// - [`CatalogError::InvalidUrl`] if the URL or a `Location` header does
    ///   not parse.
    /// - [`CatalogError::Http`] on network failure.
    /// - [`CatalogError::Io`] if the file cannot be written.
    pub async fn archive(
        &self,
        image_url: &str,
        filename: &str,
    ) -> Result<ArchiveOutcome, CatalogError> {
        let dest = self.dir.join(filename);
        if tokio::fs::try_exists(&dest)
            .await
            .map_err(|e| CatalogError::io(&dest, e))?
        {
            tracing::debug!(file = %dest.display(), "image already archived");
            return Ok(ArchiveOutcome::AlreadyPresent);
        }

        let bytes = self.download(image_url).await?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CatalogError::io(&self.dir, e))?;
        write_atomic(&dest, &bytes).await?;

        tracing::info!(file = %dest.display(), bytes = bytes.len(), "image archived");
        Ok(ArchiveOutcome::Downloaded { bytes: bytes.len() })
    }

    async fn download(&self, image_url: &str) -> Result<Vec<u8>, CatalogError> {
        let url = Url::parse(image_url).map_err(|e| CatalogError::InvalidUrl {
            url: image_url.to_string(),
            reason: e.to_string(),
        })?;

        let mut response = self.http.get(url.clone()).send().await?;
        if response.status().is_redirection() {
            let next = redirect_target(&url, &response)?;
            tracing::debug!(from = %url, to = %next, "following image redirect");
            response = self.http.get(next).send().await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Download {
                url: image_url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Resolves the `Location` header of a redirect relative to `base`.
fn redirect_target(base: &Url, response: &reqwest::Response) -> Result<Url, CatalogError> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| CatalogError::Download {
            url: base.to_string(),
            status: response.status().as_u16(),
        })?;
    base.join(location).map_err(|e| CatalogError::InvalidUrl {
        url: location.to_string(),
        reason: e.to_string(),
    })
}

/// Writes `bytes` to a sibling temp file and renames it over `dest`.
pub(crate) async fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), CatalogError> {
    let file_name = dest
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("catalog");
    let tmp = dest.with_file_name(format!(".{file_name}.{}.part", uuid::Uuid::new_v4()));

    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        return Err(CatalogError::io(&tmp, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, dest).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(CatalogError::io(dest, e));
    }
    Ok(())
}
