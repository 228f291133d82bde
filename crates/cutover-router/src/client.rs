//! HTTP client side of the status pull model.

use std::time::Duration;

use cutover_state::SharedState;
use url::Url;

use crate::RouterError;

#[derive(Debug)]
pub struct StatusClient {
    client: reqwest::Client,
    status_url: Url,
}

impl StatusClient {
    pub fn new(primary_base: &str, timeout: Duration) -> Result<Self, RouterError> {
        let base = Url::parse(primary_base)
            .map_err(|e| RouterError::Config(format!("primary url '{primary_base}': {e}")))?;
        let status_url = base
            .join("/api/status")
            .map_err(|e| RouterError::Config(format!("primary status url: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RouterError::Config(format!("http client: {e}")))?;
        Ok(Self { client, status_url })
    }

    /// Fetch the aggregated state. Any transport, status, or decode
    /// failure degrades to `None`; the policy then fails open to
    /// Primary.
    pub async fn fetch(&self) -> Option<SharedState> {
        let response = match self.client.get(self.status_url.clone()).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "status fetch failed");
                return None;
            }
        };
        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "status endpoint returned an error");
                return None;
            }
        };
        match response.json::<SharedState>().await {
            Ok(state) => Some(state),
            Err(err) => {
                tracing::warn!(error = %err, "status payload did not parse");
                None
            }
        }
    }

    /// Quick reachability check of a backend's status endpoint.
    pub async fn probe(&self, base: &str, timeout: Duration) -> bool {
        let url = match Url::parse(base).and_then(|u| u.join("/api/status")) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(%base, error = %err, "probe target is not a valid url");
                return false;
            }
        };
        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn dead_base() -> String {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn fetch_from_dead_endpoint_degrades_to_none() {
        let base = dead_base().await;
        let client = StatusClient::new(&base, Duration::from_millis(200)).expect("client");
        assert!(client.fetch().await.is_none());
        assert!(!client.probe(&base, Duration::from_millis(200)).await);
    }

    #[test]
    fn bad_base_url_is_a_config_error() {
        let err = StatusClient::new("not a url", Duration::from_secs(1)).expect_err("invalid");
        assert!(matches!(err, RouterError::Config(_)));
    }
}
