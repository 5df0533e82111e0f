//! HTTP transport seam.
//!
//! The fetcher only needs "GET this URL, give me the body". Keeping that behind a
//! trait lets tests drive the worker pool with scripted responses instead of a
//! live provider.

use super::provider::DataError;
use std::time::Duration;

/// Performs a single blocking GET and returns an owned copy of the body.
///
/// Implementations report connection problems as [`DataError::NetworkUnreachable`]
/// and non-success statuses as [`DataError::HttpStatus`]. They never retry.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>, DataError>;
}

/// Production transport backed by a blocking `reqwest` client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, DataError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
            });
        }

        // Copy out of the response buffer; nothing downstream borrows from it.
        let body = resp
            .bytes()
            .map_err(|e| DataError::NetworkUnreachable(format!("reading body: {e}")))?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_client_with_timeout() {
        assert!(HttpTransport::new(Duration::from_secs(5), "intraday-test").is_ok());
    }

    #[test]
    fn unreachable_host_maps_to_network_error() {
        let transport = HttpTransport::new(Duration::from_millis(500), "intraday-test").unwrap();
        // Port 9 on localhost (discard) is closed on test machines.
        let err = transport.get("http://127.0.0.1:9/query").unwrap_err();
        assert!(matches!(err, DataError::NetworkUnreachable(_)), "got {err:?}");
    }
}
