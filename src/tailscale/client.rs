//! Tailscale API client implementation.
//!
//! Read-only access to the device and service inventory of one tailnet.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::error::{ApiError, Result, Service as ApiService};

use super::types::{Device, DevicesBody, Service, ServicesBody};

/// Tailscale API base URL.
pub const TAILSCALE_API_URL: &str = "https://api.tailscale.com/api/v2";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Tailscale API client bound to one tailnet.
#[derive(Clone)]
pub struct TailscaleClient {
    client: Client,
    api_key: String,
    tailnet: String,
    base_url: String,
}

impl TailscaleClient {
    /// Creates a new Tailscale API client. Use `-` for the key's default
    /// tailnet.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: &str, tailnet: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                ApiError::network(ApiService::Tailscale, format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            tailnet: tailnet.to_string(),
            base_url: TAILSCALE_API_URL.to_string(),
        })
    }

    /// Points the client at a different API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Lists the devices of the tailnet.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let body: DevicesBody = self.get("devices").await?;
        info!("Found {} Tailscale devices", body.devices.len());
        Ok(body.devices)
    }

    /// Lists the services of the tailnet.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_services(&self) -> Result<Vec<Service>> {
        let body: ServicesBody = self.get("services").await?;
        info!("Found {} Tailscale services", body.services.len());
        Ok(body.services)
    }

    async fn get<T: DeserializeOwned + Default>(&self, resource: &str) -> Result<T> {
        let url = format!("{}/tailnet/{}/{resource}", self.base_url, self.tailnet);
        debug!("Tailscale GET {url}");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ApiError::network(ApiService::Tailscale, format!("Request failed: {e}")))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::rate_limited(ApiService::Tailscale, response.headers()).into());
        }

        let text = response.text().await.map_err(|e| {
            ApiError::network(ApiService::Tailscale, format!("Failed to read response: {e}"))
        })?;
        trace!("Tailscale response {status}: {text}");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::AuthenticationFailed {
                service: ApiService::Tailscale,
                message: text,
            }
            .into());
        }

        if !status.is_success() {
            return Err(ApiError::request_failed(ApiService::Tailscale, status.as_u16(), text).into());
        }

        if text.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&text).map_err(|e| {
            ApiError::invalid_response(ApiService::Tailscale, format!("Failed to parse {resource}: {e}"))
                .into()
        })
    }
}

impl std::fmt::Debug for TailscaleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailscaleClient")
            .field("api_key", &"<REDACTED>")
            .field("tailnet", &self.tailnet)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_list_devices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tailnet/-/devices"))
            .and(header("authorization", "Bearer tskey-api-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "devices": [
                    { "name": "server1.tail1234.ts.net", "addresses": ["100.64.0.1", "fd7a:115c:a1e0::1"], "os": "linux" },
                    { "name": "laptop.tail1234.ts.net" }
                ]
            })))
            .mount(&server)
            .await;

        let client = TailscaleClient::new("tskey-api-abc", "-")
            .unwrap()
            .with_base_url(server.uri());
        let devices = client.list_devices().await.unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].addresses[0], "100.64.0.1");
        assert!(devices[1].addresses.is_empty());
    }

    #[tokio::test]
    async fn test_list_services() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tailnet/example.com/services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": [ { "name": "svc:web", "addrs": ["100.100.0.7"] } ]
            })))
            .mount(&server)
            .await;

        let client = TailscaleClient::new("k", "example.com")
            .unwrap()
            .with_base_url(server.uri());
        let services = client.list_services().await.unwrap();

        assert_eq!(services[0].name, "svc:web");
        assert_eq!(services[0].ip, None);
        assert_eq!(services[0].addrs, vec!["100.100.0.7"]);
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let client = TailscaleClient::new("bad", "-")
            .unwrap()
            .with_base_url(server.uri());
        let err = client.list_devices().await.unwrap_err();
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;

        let client = TailscaleClient::new("tskey-api-k", "-")
            .unwrap()
            .with_base_url(server.uri());
        let err = client.list_services().await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Api(ApiError::RateLimited {
                service: ApiService::Tailscale,
                retry_after_secs: 12,
            })
        ));
    }

    #[tokio::test]
    async fn test_rate_limited_without_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = TailscaleClient::new("tskey-api-k", "-")
            .unwrap()
            .with_base_url(server.uri());
        let err = client.list_devices().await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Api(ApiError::RateLimited { retry_after_secs: 60, .. })
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = TailscaleClient::new("tskey-api-secret", "-").unwrap();
        assert!(!format!("{client:?}").contains("tskey-api-secret"));
    }
}
