//! Read-only HTTP object store.
//!
//! Serves source VCFs published over plain HTTP(S). Range reads map to
//! `Range: bytes=start-end` requests; a server that answers `200 OK` instead
//! of `206 Partial Content` would silently hand back the whole object, so
//! that case is rejected rather than worked around.

use crate::errors::{Result, VarsumError};
use crate::store::{ObjectMeta, ObjectStore};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::time::Duration;

/// Object store backed by an HTTP(S) base URL; keys are appended as paths.
pub struct HttpStore {
    client: Client,
    base_url: String,
}

impl HttpStore {
    /// Create a store for objects under `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client =
            Client::builder().timeout(Duration::from_secs(300)).build().map_err(|e| {
                VarsumError::Store {
                    key: String::new(),
                    reason: format!("failed to build HTTP client: {e}"),
                    retryable: false,
                }
            })?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }

    fn request_error(key: &str, e: &reqwest::Error) -> VarsumError {
        VarsumError::Store {
            key: key.to_string(),
            reason: e.to_string(),
            retryable: e.is_timeout() || e.is_connect(),
        }
    }

    fn status_error(key: &str, status: StatusCode) -> VarsumError {
        VarsumError::Store {
            key: key.to_string(),
            reason: format!("HTTP status {status}"),
            retryable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn read_only(key: &str, operation: &str) -> VarsumError {
        VarsumError::Store {
            key: key.to_string(),
            reason: format!("{operation} is not supported by the read-only HTTP store"),
            retryable: false,
        }
    }
}

impl ObjectStore for HttpStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url_for(key))
            .send()
            .map_err(|e| Self::request_error(key, &e))?;
        if !response.status().is_success() {
            return Err(Self::status_error(key, response.status()));
        }
        Ok(response.bytes().map_err(|e| Self::request_error(key, &e))?.to_vec())
    }

    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url_for(key))
            .header(reqwest::header::RANGE, format!("bytes={start}-{end}"))
            .send()
            .map_err(|e| Self::request_error(key, &e))?;
        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                Ok(response.bytes().map_err(|e| Self::request_error(key, &e))?.to_vec())
            }
            StatusCode::OK => Err(VarsumError::Store {
                key: key.to_string(),
                reason: "server ignored the range request".to_string(),
                retryable: false,
            }),
            StatusCode::RANGE_NOT_SATISFIABLE => Err(VarsumError::Store {
                key: key.to_string(),
                reason: format!("byte range {start}-{end} is not satisfiable"),
                retryable: false,
            }),
            status => Err(Self::status_error(key, status)),
        }
    }

    fn put(&self, key: &str, _data: &[u8]) -> Result<()> {
        Err(Self::read_only(key, "put"))
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        Err(Self::read_only(prefix, "list"))
    }

    fn delete(&self, key: &str) -> Result<()> {
        Err(Self::read_only(key, "delete"))
    }

    fn size(&self, key: &str) -> Result<u64> {
        let response = self
            .client
            .head(self.url_for(key))
            .send()
            .map_err(|e| Self::request_error(key, &e))?;
        if !response.status().is_success() {
            return Err(Self::status_error(key, response.status()));
        }
        response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| VarsumError::Store {
                key: key.to_string(),
                reason: "response is missing a numeric Content-Length".to_string(),
                retryable: false,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining_normalizes_slashes() {
        let store = HttpStore::new("https://example.org/data/").unwrap();
        assert_eq!(store.url_for("a/b.vcf.gz"), "https://example.org/data/a/b.vcf.gz");
        assert_eq!(store.url_for("/a/b.vcf.gz"), "https://example.org/data/a/b.vcf.gz");
    }

    #[test]
    fn test_write_operations_rejected() {
        let store = HttpStore::new("https://example.org").unwrap();
        assert!(store.put("k", b"x").unwrap_err().to_string().contains("read-only"));
        assert!(store.delete("k").unwrap_err().to_string().contains("read-only"));
        assert!(store.list("p/").unwrap_err().to_string().contains("read-only"));
    }

    #[test]
    fn test_status_retryability() {
        let throttled = HttpStore::status_error("k", StatusCode::SERVICE_UNAVAILABLE);
        assert!(throttled.is_retryable());
        let throttled = HttpStore::status_error("k", StatusCode::TOO_MANY_REQUESTS);
        assert!(throttled.is_retryable());
        let missing = HttpStore::status_error("k", StatusCode::NOT_FOUND);
        assert!(!missing.is_retryable());
    }
}
