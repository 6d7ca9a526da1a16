use std::sync::Arc;
use tracing::debug;

use crate::browser::Browser;
use crate::client::ServerClient;
use crate::config::{SuiteOptions, VisualReviewOptions};
use crate::error::Result;
use crate::run::store::RunIdentityStore;
use crate::run::VisualReviewRun;

/// Project-wide entry point; hands out one `VisualReviewRun` per suite
#[derive(Debug, Clone)]
pub struct VisualReview {
    options: VisualReviewOptions,
}

impl VisualReview {
    /// Validates the global options (project name, hostname and port are required)
    pub fn new(options: VisualReviewOptions) -> Result<Self> {
        options.validate()?;
        debug!(
            "VisualReview configured for project {} at {}:{}",
            options.project_name, options.hostname, options.port
        );
        Ok(Self { options })
    }

    pub fn options(&self) -> &VisualReviewOptions {
        &self.options
    }

    /// Orchestrator for one suite driving `browser`
    pub fn run(&self, suite: SuiteOptions, browser: Arc<dyn Browser>) -> Result<VisualReviewRun> {
        VisualReviewRun::new(&self.options, suite, browser)
    }

    /// Client for direct calls against the server
    pub fn client(&self) -> Result<ServerClient> {
        ServerClient::new(&self.options.client_config())
    }

    pub fn run_store(&self) -> RunIdentityStore {
        self.options.run_store()
    }
}
