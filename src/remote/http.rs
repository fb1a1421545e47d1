//! HTTP client for the remote identity service.
//!
//! Construction is explicit: [`HttpRemoteService::connect`] runs the bootstrap
//! call that exchanges a bootstrap token for an integration record, and the
//! returned handle is injected wherever it is needed.

use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{fmt, time::Duration};
use tracing::{debug, instrument};
use url::Url;

use super::{RemoteError, RemoteFuture, RemoteService};
use crate::{handshake::FlowType, APP_USER_AGENT};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const BOOTSTRAP_TOKEN_HEADER: &str = "x-bootstrap-token";
const API_KEY_HEADER: &str = "x-api-key";

/// Credentials issued to this service by the remote identity service.
pub struct IntegrationRecord {
    pub integration_id: String,
    pub api_key: SecretString,
}

impl fmt::Debug for IntegrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationRecord")
            .field("integration_id", &self.integration_id)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapResponse {
    integration_id: String,
    api_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    flow_token: String,
}

#[derive(Debug)]
pub struct HttpRemoteService {
    client: Client,
    base_url: Url,
    integration: IntegrationRecord,
}

impl HttpRemoteService {
    /// Bootstrap against `base_url` and return a ready client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the bootstrap call fails.
    #[instrument(skip(bootstrap_token))]
    pub async fn connect(base_url: Url, bootstrap_token: &SecretString) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let integration = bootstrap(&client, &base_url, bootstrap_token).await?;

        debug!(integration_id = %integration.integration_id, "remote integration ready");

        Ok(Self::with_integration(client, base_url, integration))
    }

    #[must_use]
    pub fn with_integration(client: Client, base_url: Url, integration: IntegrationRecord) -> Self {
        Self {
            client,
            base_url,
            integration,
        }
    }

    #[must_use]
    pub fn integration_id(&self) -> &str {
        &self.integration.integration_id
    }

    async fn post(&self, path: &str, body: Value) -> Result<Response, RemoteError> {
        let url = endpoint_url(&self.base_url, path)?;
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.integration.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;
        check_status(response).await
    }
}

impl RemoteService for HttpRemoteService {
    fn start<'a>(&'a self, flow: FlowType, email: &'a str) -> RemoteFuture<'a, String> {
        Box::pin(async move {
            let response = self
                .post(&format!("/v1/flows/{flow}/start"), json!({ "email": email }))
                .await?;
            let body: StartResponse = response
                .json()
                .await
                .map_err(|err| RemoteError::Decode(err.to_string()))?;
            Ok(body.flow_token)
        })
    }

    fn acknowledge<'a>(&'a self, email: &'a str) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            self.post("/v1/flows/reset/acknowledge", json!({ "email": email }))
                .await?;
            Ok(())
        })
    }
}

async fn bootstrap(
    client: &Client,
    base_url: &Url,
    bootstrap_token: &SecretString,
) -> Result<IntegrationRecord, RemoteError> {
    let url = endpoint_url(base_url, "/v1/integrations/bootstrap")?;
    let response = client
        .post(url)
        .header(BOOTSTRAP_TOKEN_HEADER, bootstrap_token.expose_secret())
        .send()
        .await?;
    let response = check_status(response).await?;

    let body: BootstrapResponse = response
        .json()
        .await
        .map_err(|err| RemoteError::Decode(err.to_string()))?;

    Ok(IntegrationRecord {
        integration_id: body.integration_id,
        api_key: SecretString::from(body.api_key),
    })
}

/// Append `path` to the base URL, keeping any path prefix the base carries.
fn endpoint_url(base_url: &Url, path: &str) -> Result<Url, RemoteError> {
    let base = base_url.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

/// Turn a non-2xx response into `RemoteError::Status`, keeping the service's message.
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = body["error"]
        .as_str()
        .or_else(|| body["message"].as_str())
        .or_else(|| status.canonical_reason())
        .unwrap_or("")
        .to_string();

    Err(RemoteError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    async fn mount_bootstrap(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/integrations/bootstrap"))
            .and(header(BOOTSTRAP_TOKEN_HEADER, "boot-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "integrationId": "int-1",
                "apiKey": "api-key-1",
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn connect(server: &MockServer) -> Result<HttpRemoteService> {
        let base = Url::parse(&server.uri())?;
        Ok(HttpRemoteService::connect(base, &SecretString::from("boot-token")).await?)
    }

    #[test]
    fn endpoint_url_keeps_base_path() -> Result<()> {
        let base = Url::parse("https://id.example.com/api/")?;
        let url = endpoint_url(&base, "/v1/flows/register/start")?;
        assert_eq!(url.as_str(), "https://id.example.com/api/v1/flows/register/start");
        Ok(())
    }

    #[test]
    fn integration_record_debug_redacts_key() {
        let record = IntegrationRecord {
            integration_id: "int-1".to_string(),
            api_key: SecretString::from("super-secret"),
        };
        let rendered = format!("{record:?}");
        assert!(rendered.contains("int-1"));
        assert!(!rendered.contains("super-secret"));
    }

    #[tokio::test]
    async fn connect_bootstraps_integration() -> Result<()> {
        let server = MockServer::start().await;
        mount_bootstrap(&server).await;

        let remote = connect(&server).await?;
        assert_eq!(remote.integration_id(), "int-1");
        Ok(())
    }

    #[tokio::test]
    async fn connect_surfaces_bootstrap_rejection() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/integrations/bootstrap"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "error": "bad bootstrap token" })),
            )
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri())?;
        let result = HttpRemoteService::connect(base, &SecretString::from("wrong")).await;
        match result {
            Err(RemoteError::Status { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "bad bootstrap token");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn start_posts_email_with_api_key() -> Result<()> {
        let server = MockServer::start().await;
        mount_bootstrap(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/flows/restore/start"))
            .and(header(API_KEY_HEADER, "api-key-1"))
            .and(body_json(json!({ "email": "a@b.com" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "flowToken": "remote-42" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let remote = connect(&server).await?;
        let token = remote.start(FlowType::Restore, "a@b.com").await?;
        assert_eq!(token, "remote-42");
        Ok(())
    }

    #[tokio::test]
    async fn start_rejects_undecodable_body() -> Result<()> {
        let server = MockServer::start().await;
        mount_bootstrap(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/flows/register/start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": 1 })))
            .mount(&server)
            .await;

        let remote = connect(&server).await?;
        let result = remote.start(FlowType::Register, "a@b.com").await;
        assert!(matches!(result, Err(RemoteError::Decode(_))));
        Ok(())
    }

    #[tokio::test]
    async fn acknowledge_maps_server_errors() -> Result<()> {
        let server = MockServer::start().await;
        mount_bootstrap(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/flows/reset/acknowledge"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let remote = connect(&server).await?;
        match remote.acknowledge("a@b.com").await {
            Err(RemoteError::Status { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn acknowledge_succeeds_on_no_content() -> Result<()> {
        let server = MockServer::start().await;
        mount_bootstrap(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/flows/reset/acknowledge"))
            .and(body_json(json!({ "email": "a@b.com" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let remote = connect(&server).await?;
        remote.acknowledge("a@b.com").await?;
        Ok(())
    }
}
