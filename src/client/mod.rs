//! REST client for the VisualReview server
//!
//! Every method issues exactly one HTTP request and never retries. Failures are
//! reported with the method and path of the offending call.

pub mod config;
pub mod models;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response};
use serde_json::Value;
use tracing::{debug, error, info, trace};
use url::Url;

use crate::error::{Result, VisualReviewError};
pub use self::config::ClientConfig;
pub use models::{Mask, Rectangle, Run, RunAnalysis, DEFAULT_BRANCH};
use models::{CreateRunRequest, CreatedRun};

/// API version this client speaks
pub const EXPECTED_API_VERSION: &str = "1";

/// Stateless wrapper around the server's REST contract
#[derive(Debug, Clone)]
pub struct ServerClient {
    http: Client,
    base: Url,
    log_requests: bool,
}

impl ServerClient {
    /// Builds a client for the server described by `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base = config.api_base()?;
        debug!("Creating VisualReview client for {} (strict_ssl={})", base, config.strict_ssl);

        let http = Client::builder()
            .danger_accept_invalid_certs(!config.strict_ssl)
            .build()
            .map_err(|e| {
                error!("Failed to build HTTP client: {}", e);
                VisualReviewError::Config(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base,
            log_requests: config.log_requests,
        })
    }

    /// Creates a new run for `suite_name` within `project_name`
    pub async fn create_run(
        &self,
        project_name: &str,
        suite_name: &str,
        branch_name: Option<&str>,
    ) -> Result<Run> {
        let path = "runs";
        let branch_name = branch_name.unwrap_or(DEFAULT_BRANCH);
        let body = CreateRunRequest {
            branch_name,
            project_name,
            suite_name,
        };

        let request = self.http.request(Method::POST, self.url(path)?).json(&body);
        let response = self.send(Method::POST, path, request).await?;
        let created: CreatedRun = read_json(Method::POST, path, response).await?;

        let run_id = created.id.ok_or_else(|| {
            VisualReviewError::protocol(
                format!("POST {}", path),
                "server returned an empty run id when creating a new run",
            )
        })?;

        Ok(Run {
            run_id,
            project_id: created.project_id,
            suite_id: created.suite_id,
            branch_name: created.branch_name.unwrap_or_else(|| branch_name.to_string()),
            disabled: false,
        })
    }

    /// Uploads one screenshot with its metadata to the given run
    #[allow(clippy::too_many_arguments)]
    pub async fn send_screenshot(
        &self,
        name: &str,
        run_id: &str,
        metadata: &Value,
        properties: &Value,
        compare_settings: Option<&Value>,
        png: Vec<u8>,
        mask: Option<&Mask>,
    ) -> Result<Value> {
        let path = format!("runs/{}/screenshots", run_id);
        let file = Part::bytes(png)
            .file_name("file.png")
            .mime_str("image/png")
            .map_err(|e| VisualReviewError::protocol(format!("POST {}", path), e.to_string()))?;

        let mut form = Form::new()
            .text("meta", encode_part(&path, "meta", metadata)?)
            .text("properties", encode_part(&path, "properties", properties)?)
            .text("screenshotName", name.to_string());

        if let Some(settings) = compare_settings {
            form = form.text("compareSettings", encode_part(&path, "compareSettings", settings)?);
        }
        if let Some(mask) = mask.filter(|m| !m.is_empty()) {
            form = form.text("mask", encode_part(&path, "mask", mask)?);
        }
        form = form.part("file", file);

        let url = self.run_url(run_id, "screenshots")?;
        let request = self.http.request(Method::POST, url).multipart(form);
        let response = self.send(Method::POST, &path, request).await?;
        let text = read_text(Method::POST, &path, response).await?;

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// Fetches the analysis (diff verdicts) of a run
    pub async fn get_run_analysis(&self, run_id: &str) -> Result<RunAnalysis> {
        let path = format!("runs/{}/analysis", run_id);
        let request = self.http.request(Method::GET, self.run_url(run_id, "analysis")?);
        let response = self.send(Method::GET, &path, request).await?;
        read_json(Method::GET, &path, response).await
    }

    /// Returns the API version reported by the server
    pub async fn get_version(&self) -> Result<String> {
        let path = "version";
        let request = self.http.request(Method::GET, self.url(path)?);
        let response = self.send(Method::GET, path, request).await?;
        let text = read_text(Method::GET, path, response).await?;
        Ok(text.trim().trim_matches('"').to_string())
    }

    /// Fails with `VersionMismatch` unless the server speaks `EXPECTED_API_VERSION`
    pub async fn check_version(&self) -> Result<()> {
        let version = self.get_version().await?;
        if version != EXPECTED_API_VERSION {
            return Err(VisualReviewError::VersionMismatch {
                expected: EXPECTED_API_VERSION.to_string(),
                actual: version,
            });
        }
        Ok(())
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| VisualReviewError::Config(format!("invalid API path {}: {}", path, e)))
    }

    /// `runs/{run_id}/{resource}` with the run id encoded as a single path segment
    fn run_url(&self, run_id: &str, resource: &str) -> Result<Url> {
        if matches!(run_id, "" | "." | "..") {
            return Err(VisualReviewError::protocol(
                format!("runs/{}/{}", run_id, resource),
                format!("invalid run id {:?}", run_id),
            ));
        }

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| VisualReviewError::Config(format!("{} cannot be used as a base URL", self.base)))?
            .pop_if_empty()
            .extend(["runs", run_id, resource]);
        Ok(url)
    }

    async fn send(&self, method: Method, path: &str, request: reqwest::RequestBuilder) -> Result<Response> {
        if self.log_requests {
            info!("VisualReview {} {}", method, path);
        } else {
            debug!("VisualReview {} {}", method, path);
        }

        let response = request.send().await.map_err(|e| {
            error!("Failed to send {} {}: {}", method, path, e);
            VisualReviewError::Transport {
                method: method.to_string(),
                path: path.to_string(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        trace!("{} {} responded with {}", method, path, status);
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            error!("{} {} failed with code {}: {}", method, path, status.as_u16(), body);
            return Err(VisualReviewError::Server {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

async fn read_text(method: Method, path: &str, response: Response) -> Result<String> {
    response.text().await.map_err(|e| VisualReviewError::Transport {
        method: method.to_string(),
        path: path.to_string(),
        message: format!("failed to read response body: {}", e),
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(method: Method, path: &str, response: Response) -> Result<T> {
    let text = read_text(method.clone(), path, response).await?;
    serde_json::from_str(&text).map_err(|e| {
        VisualReviewError::protocol(
            format!("{} {}", method, path),
            format!("could not parse JSON response from server: {}", e),
        )
    })
}

fn encode_part<T: serde::Serialize>(path: &str, part: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        VisualReviewError::protocol(format!("POST {}", path), format!("could not encode {}: {}", part, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ServerClient {
        ServerClient::new(&ClientConfig::new("localhost", 7000)).unwrap()
    }

    #[test]
    fn test_run_url_appends_resource_under_api() {
        let url = client().run_url("12", "analysis").unwrap();
        assert_eq!(url.as_str(), "http://localhost:7000/api/runs/12/analysis");
    }

    #[test]
    fn test_run_url_encodes_slashes_in_run_id() {
        let url = client().run_url("a/../b", "screenshots").unwrap();
        assert_eq!(url.path(), "/api/runs/a%2F..%2Fb/screenshots");
    }

    #[test]
    fn test_run_url_rejects_dot_segments() {
        for run_id in ["", ".", ".."] {
            let err = client().run_url(run_id, "analysis").unwrap_err();
            assert!(err.is_protocol(), "run id {:?} gave {:?}", run_id, err);
        }
    }
}
