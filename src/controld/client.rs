//! ControlD API client implementation.
//!
//! Thin REST transport over the profile folder and rule endpoints. Every
//! call is a single attempt; failures are returned to the caller, which
//! decides whether they are fatal.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{ApiError, Result, Service};
use crate::planner::DesiredRecord;

use super::types::{
    ACTION_SPOOF, Envelope, FolderBody, FolderId, FoldersBody, RuleId, RuleRequest, RulesBody,
    STATUS_ENABLED, id_from_value,
};

/// ControlD API base URL.
pub const CONTROLD_API_URL: &str = "https://api.controld.com";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// ControlD API client bound to one profile.
#[derive(Clone)]
pub struct ControlDClient {
    /// HTTP client.
    client: Client,
    /// API token.
    api_token: String,
    /// Profile holding the managed rules.
    profile_id: String,
    /// API base URL.
    base_url: String,
}

impl ControlDClient {
    /// Creates a new ControlD API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_token: &str, profile_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                ApiError::network(Service::ControlD, format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_token: api_token.to_string(),
            profile_id: profile_id.to_string(),
            base_url: CONTROLD_API_URL.to_string(),
        })
    }

    /// Points the client at a different API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the profile this client is bound to.
    #[must_use]
    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}/profiles/{}{path}", self.base_url, self.profile_id)
    }

    /// Sends a request and unwraps the response envelope.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| ApiError::network(Service::ControlD, format!("Request failed: {e}")))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::rate_limited(Service::ControlD, response.headers()).into());
        }

        let text = response.text().await.map_err(|e| {
            ApiError::network(Service::ControlD, format!("Failed to read response: {e}"))
        })?;
        trace!("ControlD response {status}: {text}");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::AuthenticationFailed {
                service: Service::ControlD,
                message: error_message(&text).unwrap_or_else(|| status.to_string()),
            }
            .into());
        }

        if !status.is_success() {
            return Err(ApiError::request_failed(
                Service::ControlD,
                status.as_u16(),
                error_message(&text).unwrap_or(text),
            )
            .into());
        }

        if text.trim().is_empty() {
            return Ok(None);
        }

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            ApiError::invalid_response(Service::ControlD, format!("Failed to parse response: {e}"))
        })?;

        if envelope.success == Some(false) {
            let message = envelope
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| String::from("request was not successful"));
            return Err(ApiError::request_failed(Service::ControlD, status.as_u16(), message).into());
        }

        Ok(envelope.body)
    }

    /// Looks up a folder by exact name.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn find_folder(&self, name: &str) -> Result<Option<FolderId>> {
        let url = self.url("/folders");
        debug!("ControlD GET {url}");

        let body: Option<FoldersBody> = self.execute(self.client.get(&url)).await?;
        let folders = body.map(|b| b.folders).unwrap_or_default();

        Ok(folders
            .iter()
            .find(|f| f.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|f| f.get("PK"))
            .and_then(id_from_value)
            .map(FolderId::new))
    }

    /// Creates a folder and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails or returns no identifier.
    pub async fn create_folder(&self, name: &str) -> Result<FolderId> {
        let url = self.url("/folders");
        debug!("ControlD POST {url}");

        let request = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "name": name }));
        let body: Option<FolderBody> = self.execute(request).await?;

        body.and_then(|b| b.folder)
            .as_ref()
            .and_then(|f| f.get("PK"))
            .and_then(id_from_value)
            .map(FolderId::new)
            .ok_or_else(|| {
                ApiError::invalid_response(Service::ControlD, "Folder creation returned no identifier")
                    .into()
            })
    }

    /// Lists every rule in a folder, verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_rules(&self, folder: &FolderId) -> Result<Vec<Value>> {
        let url = self.url(&format!("/rules/{folder}"));
        debug!("ControlD GET {url}");

        let body: Option<RulesBody> = self.execute(self.client.get(&url)).await?;
        Ok(body.map(|b| b.rules).unwrap_or_default())
    }

    /// Creates a spoof rule for a record.
    ///
    /// Returns the new rule's identifier when the API reports one.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_rule(&self, folder: &FolderId, record: &DesiredRecord) -> Result<Option<RuleId>> {
        let url = self.url("/rules");
        debug!("ControlD POST {url} ({})", record.hostname);

        let request = self
            .client
            .post(&url)
            .json(&rule_request(folder, record));
        let body: Option<RulesBody> = self.execute(request).await?;

        Ok(body
            .and_then(|b| b.rules.into_iter().next())
            .as_ref()
            .and_then(|r| r.get("PK"))
            .and_then(id_from_value)
            .map(RuleId::new))
    }

    /// Rewrites an existing rule to match a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn update_rule(
        &self,
        folder: &FolderId,
        rule_id: &RuleId,
        record: &DesiredRecord,
    ) -> Result<()> {
        let url = self.url(&format!("/rules/{rule_id}"));
        debug!("ControlD PUT {url} ({})", record.hostname);

        let request = self.client.put(&url).json(&rule_request(folder, record));
        self.execute::<Value>(request).await?;
        Ok(())
    }

    /// Deletes a rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn delete_rule(&self, rule_id: &RuleId) -> Result<()> {
        let url = self.url(&format!("/rules/{rule_id}"));
        debug!("ControlD DELETE {url}");

        self.execute::<Value>(self.client.delete(&url)).await?;
        Ok(())
    }
}

fn rule_request<'a>(folder: &'a FolderId, record: &'a DesiredRecord) -> RuleRequest<'a> {
    RuleRequest {
        group: folder.as_str(),
        status: STATUS_ENABLED,
        action: ACTION_SPOOF,
        via: record.target.to_string(),
        hostnames: [record.hostname.as_str()],
    }
}

/// Extracts `error.message` from an error body, if it is JSON.
fn error_message(text: &str) -> Option<String> {
    serde_json::from_str::<Value>(text)
        .ok()?
        .get("error")?
        .get("message")?
        .as_str()
        .map(String::from)
}

impl std::fmt::Debug for ControlDClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlDClient")
            .field("api_token", &"<REDACTED>")
            .field("profile_id", &self.profile_id)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::planner::Hostname;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ControlDClient {
        ControlDClient::new("token-123", "prof1")
            .unwrap()
            .with_base_url(server.uri())
    }

    fn record(host: &str, ip: &str) -> DesiredRecord {
        DesiredRecord::new(Hostname::new(host).unwrap(), ip.parse().unwrap())
    }

    #[tokio::test]
    async fn test_find_folder_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profiles/prof1/folders"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "body": { "folders": [
                    { "PK": 11, "name": "Other" },
                    { "PK": 12, "name": "Tailscale" }
                ]}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let folder = client.find_folder("Tailscale").await.unwrap();
        assert_eq!(folder, Some(FolderId::new("12")));
        assert_eq!(client.find_folder("Missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_rules_verbatim() {
        let server = MockServer::start().await;
        let rules = json!([
            { "PK": "r1", "hostnames": ["a.ts"], "via": "100.64.0.1", "extra": { "k": 1 } }
        ]);
        Mock::given(method("GET"))
            .and(path("/profiles/prof1/rules/12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "body": { "rules": rules.clone() }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let listed = client.list_rules(&FolderId::new("12")).await.unwrap();
        assert_eq!(Value::Array(listed), rules);
    }

    #[tokio::test]
    async fn test_envelope_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profiles/prof1/rules/12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/profiles/prof1/rules/r1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let folder = FolderId::new("12");
        assert!(client.list_rules(&folder).await.unwrap().is_empty());
        client
            .update_rule(&folder, &RuleId::new("r1"), &record("a.ts", "100.64.0.1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_rule_sends_spoof_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/profiles/prof1/rules"))
            .and(body_json(json!({
                "group": "12",
                "status": 1,
                "do": 2,
                "via": "100.64.0.5",
                "hostnames[]": ["b.ts"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "body": { "rules": [ { "PK": "r77" } ] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let id = client
            .create_rule(&FolderId::new("12"), &record("b.ts", "100.64.0.5"))
            .await
            .unwrap();
        assert_eq!(id, Some(RuleId::new("r77")));
    }

    #[tokio::test]
    async fn test_delete_targets_rule_id_path() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/profiles/prof1/rules/r2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.delete_rule(&RuleId::new("r2")).await.unwrap();
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "success": false,
                "error": { "message": "Invalid token" }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.list_rules(&FolderId::new("12")).await.unwrap_err();
        assert!(err.is_auth_failure());
        assert!(err.to_string().contains("Invalid token"));
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/profiles/prof1/rules/r1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": { "message": "bad via" }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .update_rule(&FolderId::new("12"), &RuleId::new("r1"), &record("a.ts", "100.64.0.1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Api(ApiError::RequestFailed { status: 200, .. })
        ));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.find_folder("Tailscale").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Api(ApiError::RateLimited { retry_after_secs: 7, .. })
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = ControlDClient::new("secret_token_12345", "prof1").unwrap();
        let debug_str = format!("{client:?}");
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("ControlDClient"));
    }
}
