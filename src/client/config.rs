use url::Url;

use crate::client::models::Run;
use crate::error::{Result, VisualReviewError};

/// Default URL scheme for the VisualReview server
pub const DEFAULT_SCHEME: &str = "http";

/// Connection parameters for the VisualReview server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host name of the server
    pub hostname: String,

    /// Port the server listens on
    pub port: u16,

    /// `http` or `https`
    pub scheme: String,

    /// Verify TLS certificates when using https
    pub strict_ssl: bool,

    /// Emit one info line per server call
    pub log_requests: bool,
}

impl ClientConfig {
    pub fn new(hostname: &str, port: u16) -> Self {
        Self {
            hostname: hostname.to_string(),
            port,
            ..Self::default()
        }
    }

    /// Sets the URL scheme
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Enables or disables certificate verification
    pub fn with_strict_ssl(mut self, strict_ssl: bool) -> Self {
        self.strict_ssl = strict_ssl;
        self
    }

    pub fn with_log_requests(mut self, log_requests: bool) -> Self {
        self.log_requests = log_requests;
        self
    }

    /// Root of the REST API, always ending with `/api/`
    pub fn api_base(&self) -> Result<Url> {
        let raw = format!("{}://{}:{}/api/", self.scheme, self.hostname, self.port);
        Url::parse(&raw)
            .map_err(|e| VisualReviewError::Config(format!("invalid server address {}: {}", raw, e)))
    }

    /// Web UI page listing the results of `run`
    pub fn results_url(&self, run: &Run) -> String {
        format!(
            "{}://{}:{}/#/{}/{}/{}/rp",
            self.scheme,
            self.hostname,
            self.port,
            run.project_id.as_deref().unwrap_or_default(),
            run.suite_id.as_deref().unwrap_or_default(),
            run.run_id
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 7000,
            scheme: DEFAULT_SCHEME.to_string(),
            strict_ssl: true,
            log_requests: true,
        }
    }
}
