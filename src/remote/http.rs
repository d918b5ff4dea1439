use super::RemoteService;
use crate::error::RemoteError;
use crate::model::{
    ClientConfig, DeployRequest, DeployResponse, ErrorBody, GenerateRequest, GenerateResponse,
    StatusResponse,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

/// JSON-over-HTTP client for the generation and sandbox service.
pub struct HttpRemoteClient {
    base_url: String,
    client: Client,
}

impl HttpRemoteClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn project_url(&self, project_id: &str) -> String {
        format!(
            "{}/projects/{}",
            self.base_url,
            urlencoding::encode(project_id)
        )
    }

    /// Map non-success statuses to [`RemoteError::Api`], pulling `detail` from
    /// the body when the service sends one.
    async fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.detail);
        debug!(status = status.as_u16(), body = %body, "service returned error");
        Err(RemoteError::Api {
            status: status.as_u16(),
            detail,
        })
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RemoteService for HttpRemoteClient {
    async fn generate(&self, prompt: &str) -> Result<GenerateResponse, RemoteError> {
        debug!("POST /generate-code");
        let response = self
            .client
            .post(format!("{}/generate-code", self.base_url))
            .json(&GenerateRequest { prompt })
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn deploy(
        &self,
        project_id: &str,
        generated_code: &str,
    ) -> Result<DeployResponse, RemoteError> {
        debug!(project_id, "POST /deploy-code");
        let response = self
            .client
            .post(format!("{}/deploy-code", self.base_url))
            .json(&DeployRequest {
                project_id,
                generated_code,
            })
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn fetch_status(&self, project_id: &str) -> Result<StatusResponse, RemoteError> {
        debug!(project_id, "GET /projects/status");
        let response = self
            .client
            .get(format!("{}/status", self.project_url(project_id)))
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn delete(&self, project_id: &str) -> Result<(), RemoteError> {
        debug!(project_id, "DELETE /projects");
        let response = self
            .client
            .delete(self.project_url(project_id))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeploymentStatus;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpRemoteClient {
        HttpRemoteClient::new(&ClientConfig {
            base_url: format!("{}/", server.uri()),
            poll_interval: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
            user_agent: "sandbox-deploy-cli/test".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn generate_posts_prompt_and_parses_project() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate-code"))
            .and(body_json(json!({ "prompt": "a todo app" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "project_id": "p1",
                "generated_code": "export default function Home(){}"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = client_for(&server).generate("a todo app").await.unwrap();
        assert_eq!(out.project_id, "p1");
        assert_eq!(out.generated_code, "export default function Home(){}");
    }

    #[tokio::test]
    async fn error_detail_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate-code"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({ "detail": "Prompt rejected" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).generate("x").await.unwrap_err();
        match err {
            RemoteError::Api { status, detail } => {
                assert_eq!(status, 422);
                assert_eq!(detail.as_deref(), Some("Prompt rejected"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_has_no_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deploy-code"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server).deploy("p1", "code").await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Api {
                status: 502,
                detail: None
            }
        ));
    }

    #[tokio::test]
    async fn deploy_sends_project_and_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deploy-code"))
            .and(body_json(json!({ "project_id": "p1", "generated_code": "code" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "project_id": "p1",
                "status": "deploying"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = client_for(&server).deploy("p1", "code").await.unwrap();
        assert_eq!(out.status, DeploymentStatus::Deploying);
        assert!(out.public_url.is_none());
    }

    #[tokio::test]
    async fn fetch_status_reads_deployed_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/p1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "project_id": "p1",
                "status": "deployed",
                "public_url": "https://sandbox.example/p1",
                "sandbox_id": "sb-9"
            })))
            .mount(&server)
            .await;

        let out = client_for(&server).fetch_status("p1").await.unwrap();
        assert_eq!(out.status, DeploymentStatus::Deployed);
        assert_eq!(out.public_url.as_deref(), Some("https://sandbox.example/p1"));
        assert_eq!(out.sandbox_id.as_deref(), Some("sb-9"));
    }

    #[tokio::test]
    async fn malformed_status_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/p1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_status("p1").await.unwrap_err();
        assert!(matches!(err, RemoteError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn delete_accepts_empty_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/projects/p1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).delete("p1").await.unwrap();
    }

    #[tokio::test]
    async fn delete_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/projects/p1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Project not found" })))
            .mount(&server)
            .await;

        let err = client_for(&server).delete("p1").await.unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let client = HttpRemoteClient::new(&ClientConfig {
            base_url: "http://127.0.0.1:9".into(),
            poll_interval: Duration::from_secs(3),
            request_timeout: Duration::from_secs(2),
            user_agent: "sandbox-deploy-cli/test".into(),
        })
        .unwrap();
        let err = client.fetch_status("p1").await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
    }
}
