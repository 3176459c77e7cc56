//! Streaming artifact download.

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Default download timeout. Provider-hosted clips can be large.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Download a URL to a local file, streaming chunks to disk.
///
/// The destination's parent directories are created as needed. A non-success
/// HTTP status or a mid-stream failure leaves no partial file claims behind;
/// the caller owns cleanup of the destination path.
pub async fn download_to(url: &str, dest: impl AsRef<Path>) -> MediaResult<u64> {
    let dest = dest.as_ref();
    debug!("Downloading {} to {}", url, dest.display());

    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| MediaError::download(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| MediaError::download(e.to_string()))?;

    if !response.status().is_success() {
        return Err(MediaError::download(format!(
            "HTTP {} fetching {}",
            response.status(),
            url
        )));
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response;
    let mut written: u64 = 0;

    while let Some(chunk) = stream
        .chunk()
        .await
        .map_err(|e| MediaError::download(e.to_string()))?
    {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    debug!("Downloaded {} bytes from {}", written, url);
    Ok(written)
}
