//! HTTP binding of the notebook control plane.

use anyhow::{Context, Result};
use async_trait::async_trait;
use nbr_id::{OperationId, ResourceName};
use nbr_reconcile::{
    ClientError, DesiredConfig, ObservedState, ResourceClient, TagClient, Tags, UpdateRequest,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::idempotency::{default_idempotency_key, IDEMPOTENCY_KEY_HEADER};

/// Error codes the control plane uses for a missing resource.
const NOT_FOUND_CODES: &[&str] = &["ResourceNotFound", "RecordNotFound"];

const INSTANCES_PATH: &str = "/v1/notebook-instances";

/// Control-plane client over HTTP + JSON.
///
/// One client serves one CLI invocation; `invocation` scopes its
/// idempotency keys.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: reqwest::Client,
    base_url: String,
    invocation: OperationId,
}

impl HttpControlPlane {
    pub fn new(endpoint: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("Invalid token format")?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            invocation: OperationId::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn instance_url(&self, name: &ResourceName, action: Option<&str>) -> String {
        match action {
            Some(action) => self.url(&format!("{INSTANCES_PATH}/{name}/{action}")),
            None => self.url(&format!("{INSTANCES_PATH}/{name}")),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(handle_error(response).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Map a non-success response onto the client error taxonomy.
async fn handle_error(response: reqwest::Response) -> ClientError {
    let status = response.status();

    let body: ApiErrorResponse = response.json().await.unwrap_or_else(|_| ApiErrorResponse {
        code: status
            .canonical_reason()
            .unwrap_or("unknown")
            .replace(' ', ""),
        message: format!("HTTP {}", status.as_u16()),
        request_id: None,
    });

    debug!(
        status = status.as_u16(),
        code = %body.code,
        request_id = body.request_id.as_deref().unwrap_or("-"),
        "Control plane returned error"
    );

    if status == StatusCode::NOT_FOUND || NOT_FOUND_CODES.contains(&body.code.as_str()) {
        return ClientError::NotFound(body.message);
    }

    let message = match body.request_id {
        Some(request_id) => format!("{} (request id {})", body.message, request_id),
        None => body.message,
    };
    ClientError::api(body.code, message)
}

/// API error response structure.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: String,
    message: String,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    name: ResourceName,
}

#[derive(Debug, Deserialize)]
struct ListTagsResponse {
    #[serde(default)]
    tags: Tags,
}

#[derive(Debug, Serialize)]
struct AddTagsRequest<'a> {
    resource_arn: &'a str,
    tags: &'a Tags,
}

#[derive(Debug, Serialize)]
struct RemoveTagsRequest<'a> {
    resource_arn: &'a str,
    tag_keys: &'a [String],
}

#[async_trait]
impl ResourceClient for HttpControlPlane {
    async fn create(&self, desired: &DesiredConfig) -> Result<ResourceName, ClientError> {
        let invocation = self.invocation.to_string();
        let key = default_idempotency_key(
            "notebook-instances.create",
            INSTANCES_PATH,
            &invocation,
            desired,
        )
        .map_err(|e| ClientError::Decode(e.to_string()))?;

        let response: CreateResponse = self
            .send_json(
                self.client
                    .post(self.url(INSTANCES_PATH))
                    .header(IDEMPOTENCY_KEY_HEADER, key)
                    .json(desired),
            )
            .await?;
        Ok(response.name)
    }

    async fn describe(&self, name: &ResourceName) -> Result<ObservedState, ClientError> {
        self.send_json(self.client.get(self.instance_url(name, None)))
            .await
    }

    async fn update(
        &self,
        name: &ResourceName,
        request: &UpdateRequest,
    ) -> Result<(), ClientError> {
        self.send(self.client.patch(self.instance_url(name, None)).json(request))
            .await
            .map(|_| ())
    }

    async fn start(&self, name: &ResourceName) -> Result<(), ClientError> {
        self.send(self.client.post(self.instance_url(name, Some("start"))))
            .await
            .map(|_| ())
    }

    async fn stop(&self, name: &ResourceName) -> Result<(), ClientError> {
        self.send(self.client.post(self.instance_url(name, Some("stop"))))
            .await
            .map(|_| ())
    }

    async fn delete(&self, name: &ResourceName) -> Result<(), ClientError> {
        self.send(self.client.delete(self.instance_url(name, None)))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl TagClient for HttpControlPlane {
    async fn list_tags(&self, arn: &str) -> Result<Tags, ClientError> {
        let response: ListTagsResponse = self
            .send_json(
                self.client
                    .get(self.url("/v1/tags"))
                    .query(&[("resource_arn", arn)]),
            )
            .await?;
        Ok(response.tags)
    }

    async fn add_tags(&self, arn: &str, tags: &Tags) -> Result<(), ClientError> {
        let body = AddTagsRequest {
            resource_arn: arn,
            tags,
        };
        self.send(self.client.post(self.url("/v1/tags")).json(&body))
            .await
            .map(|_| ())
    }

    async fn remove_tags(&self, arn: &str, keys: &[String]) -> Result<(), ClientError> {
        let body = RemoveTagsRequest {
            resource_arn: arn,
            tag_keys: keys,
        };
        self.send(self.client.post(self.url("/v1/tags/delete")).json(&body))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbr_reconcile::LifecycleStatus;
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn name() -> ResourceName {
        ResourceName::parse("nb-1").unwrap()
    }

    fn described(status: &str) -> serde_json::Value {
        serde_json::json!({
            "name": "nb-1",
            "arn": "arn:aws:sagemaker:us-east-1:123456789012:notebook-instance/nb-1",
            "status": status,
            "role_arn": "arn:aws:iam::123456789012:role/notebook",
            "instance_type": "ml.t2.medium"
        })
    }

    #[test]
    fn test_url_building() {
        let client = HttpControlPlane::new("http://localhost:8080/", None).unwrap();
        assert_eq!(
            client.instance_url(&name(), Some("stop")),
            "http://localhost:8080/v1/notebook-instances/nb-1/stop"
        );
    }

    #[tokio::test]
    async fn test_describe_decodes_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/notebook-instances/nb-1"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(described("InService")))
            .mount(&server)
            .await;

        let client = HttpControlPlane::new(&server.uri(), Some("t0ken")).unwrap();
        let state = client.describe(&name()).await.unwrap();
        assert_eq!(state.status, LifecycleStatus::InService);
    }

    #[tokio::test]
    async fn test_describe_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/notebook-instances/nb-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpControlPlane::new(&server.uri(), None).unwrap();
        assert!(client.describe(&name()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_not_found_error_code_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/notebook-instances/nb-1"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": "RecordNotFound",
                "message": "Record not found"
            })))
            .mount(&server)
            .await;

        let client = HttpControlPlane::new(&server.uri(), None).unwrap();
        assert!(client.describe(&name()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_api_error_keeps_code_and_request_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/notebook-instances/nb-1/stop"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": "ValidationException",
                "message": "Status (Stopped) not in ([InService])",
                "request_id": "req-42"
            })))
            .mount(&server)
            .await;

        let client = HttpControlPlane::new(&server.uri(), None).unwrap();
        match client.stop(&name()).await.unwrap_err() {
            ClientError::Api { code, message } => {
                assert_eq!(code, "ValidationException");
                assert!(message.contains("req-42"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_status_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/notebook-instances/nb-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(described("")))
            .mount(&server)
            .await;

        let client = HttpControlPlane::new(&server.uri(), None).unwrap();
        assert!(matches!(
            client.describe(&name()).await.unwrap_err(),
            ClientError::Decode(_)
        ));
    }

    #[tokio::test]
    async fn test_create_sends_idempotency_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/notebook-instances"))
            .and(header_exists("idempotency-key"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "name": "nb-1",
                "arn": "arn:nb-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpControlPlane::new(&server.uri(), None).unwrap();
        let desired = DesiredConfig::new(name(), "role", "ml.t2.medium");
        assert_eq!(client.create(&desired).await.unwrap(), name());
    }

    #[tokio::test]
    async fn test_idempotency_key_is_scoped_to_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/notebook-instances"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "name": "nb-1"
            })))
            .expect(3)
            .mount(&server)
            .await;

        let desired = DesiredConfig::new(name(), "role", "ml.t2.medium");
        let first = HttpControlPlane::new(&server.uri(), None).unwrap();
        first.create(&desired).await.unwrap();
        first.create(&desired).await.unwrap();
        HttpControlPlane::new(&server.uri(), None)
            .unwrap()
            .create(&desired)
            .await
            .unwrap();

        let keys: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| {
                r.headers
                    .get(IDEMPOTENCY_KEY_HEADER)
                    .unwrap()
                    .to_str()
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0], keys[1]);
        assert_ne!(keys[0], keys[2]);
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1/notebook-instances/nb-1"))
            .and(body_json(serde_json::json!({ "instance_type": "ml.t3.large" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpControlPlane::new(&server.uri(), None).unwrap();
        let request = UpdateRequest {
            role_arn: None,
            instance_type: Some("ml.t3.large".to_string()),
        };
        client.update(&name(), &request).await.unwrap();
    }

    #[tokio::test]
    async fn test_tag_calls() {
        let server = MockServer::start().await;
        let arn = "arn:aws:sagemaker:us-east-1:123456789012:notebook-instance/nb-1";
        Mock::given(method("GET"))
            .and(path("/v1/tags"))
            .and(query_param("resource_arn", arn))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tags": { "team": "ml", "aws:owner": "system" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/tags/delete"))
            .and(body_json(serde_json::json!({
                "resource_arn": arn,
                "tag_keys": ["team"]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpControlPlane::new(&server.uri(), None).unwrap();
        let tags = client.list_tags(arn).await.unwrap();
        assert_eq!(tags.len(), 2);
        client.remove_tags(arn, &["team".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let client = HttpControlPlane::new("http://127.0.0.1:1", None).unwrap();
        assert!(matches!(
            client.describe(&name()).await.unwrap_err(),
            ClientError::Transport(_)
        ));
    }
}
