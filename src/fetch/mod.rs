//! Dataset loading from local files or HTTP.
//!
//! Sources ending in `.gz` are decompressed after loading.

mod client;

pub use client::{BasicClient, HttpClient};

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::{debug, info};

/// Downloads `url` and returns the response body.
///
/// Non-success statuses are errors.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        bail!("GET {} returned status {}", url, status);
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Decompresses gzip data.
pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).context("Failed to decompress gzip data")?;
    Ok(out)
}

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Loads a dataset from a local path or an `http(s)` URL.
#[tracing::instrument(skip(client))]
pub async fn load_source<C: HttpClient>(client: &C, source: &str) -> Result<Vec<u8>> {
    let bytes = if is_remote(source) {
        fetch_bytes(client, source).await?
    } else {
        tokio::fs::read(source)
            .await
            .with_context(|| format!("Failed to read {}", source))?
    };
    debug!(bytes = bytes.len(), "Source loaded");

    if source.ends_with(".gz") {
        let inflated = gunzip(&bytes)?;
        info!(compressed = bytes.len(), inflated = inflated.len(), "Source decompressed");
        return Ok(inflated);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn test_gunzip_round_trip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"GEO,VALUE\n").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(gunzip(&compressed).unwrap(), b"GEO,VALUE\n");
    }

    #[test]
    fn test_gunzip_rejects_plain_text() {
        assert!(gunzip(b"GEO,VALUE\n").is_err());
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://www150.statcan.gc.ca/t1/tbl1/en/dtl!downloadDbLoadingData.action"));
        assert!(!is_remote("data/rent.csv"));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let client = BasicClient::new().unwrap();
        let err = load_source(&client, "/no/such/rent.csv").await.unwrap_err();
        assert!(err.to_string().contains("/no/such/rent.csv"));
    }

    #[tokio::test]
    async fn test_load_local_gz() {
        let path = format!("{}/rental_trends_load.csv.gz", std::env::temp_dir().display());
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"REF_DATE,VALUE\n2001,1\n").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let client = BasicClient::new().unwrap();
        let bytes = load_source(&client, &path).await.unwrap();
        assert_eq!(bytes, b"REF_DATE,VALUE\n2001,1\n");

        std::fs::remove_file(&path).unwrap();
    }
}
