//! Descriptor retrieval

use reqwest::Client;
use std::time::Duration;

use super::DecodeError;
use crate::coordinator::UpdateInfo;

/// Upper bound for a single descriptor download
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for descriptor downloads, bounded by `timeout`
pub fn http_client(timeout: Duration) -> Result<Client, DecodeError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(DecodeError::HttpClient)
}

/// Return the structured descriptor for an update
///
/// Inline package content wins; otherwise the document is downloaded from
/// the update's descriptor URL.
pub async fn fetch_descriptor(http: &Client, update: &UpdateInfo) -> Result<String, DecodeError> {
    if let Some(content) = update.package.content.as_deref() {
        tracing::debug!("Using inline update config of package {}", update.package.name);
        return Ok(content.to_string());
    }

    let url = update.descriptor_url();
    tracing::debug!("Fetching update config from {}", url);

    let fetch_error = |source| DecodeError::Fetch {
        url: url.clone(),
        source,
    };

    let response = http.get(&url).send().await.map_err(fetch_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(DecodeError::FetchStatus {
            url: url.clone(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(fetch_error)
}
