use crate::error::{BatchError, Result};
use reqwest::blocking::Client;
use std::{io::Write, path::Path, time::Duration};
use tempfile::NamedTempFile;

/// Single blocking GET returning the full body.
pub trait Fetcher: Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub fn http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60 * 60))
        .build()
        .map_err(|e| BatchError::Config(format!("http client build failed: {e}")))
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let fail = |reason: String| BatchError::Fetch {
            url: url.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| fail(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }

        let body = resp.bytes().map_err(|e| fail(e.to_string()))?;
        Ok(body.to_vec())
    }
}

/// Writes `bytes` to a temp file next to `dest` and renames it into place,
/// so `dest` only ever appears fully written.
pub fn write_bytes_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(BatchError::fs(dir))?;
    tmp.write_all(bytes).map_err(BatchError::fs(tmp.path()))?;
    tmp.flush().map_err(BatchError::fs(tmp.path()))?;

    tmp.persist(dest)
        .map_err(|e| BatchError::fs(dest)(e.error))?;
    Ok(())
}
