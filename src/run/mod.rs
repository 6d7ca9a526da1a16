//! Suite-level run orchestration
//!
//! A `VisualReviewRun` owns the server run of one test suite. It moves through
//! `Uninitialized -> Active -> Cleaned`; screenshots may only be uploaded
//! while the run is active (or are skipped entirely when the suite is
//! disabled). Each screenshot fans out mask resolution, properties extraction
//! and image capture concurrently and uploads only once all of them succeed.

pub mod masks;
pub mod properties;
pub mod result;
pub mod store;

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::browser::{Browser, Capabilities, ElementRef};
use crate::client::{ClientConfig, Run, ServerClient};
use crate::config::{ScreenshotOptions, SuiteOptions, VisualReviewOptions};
use crate::error::{Result, VisualReviewError};
use masks::resolve_masks;
use properties::{Properties, PropertiesExtractor};
use result::extract_result;
use store::RunIdentityStore;

/// Lifecycle of a suite run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    Active(Run),
    Cleaned(Run),
}

/// Screenshot orchestrator for one test suite
pub struct VisualReviewRun {
    project_name: String,
    suite_name: String,
    branch_name: Option<String>,
    client_config: ClientConfig,
    client: ServerClient,
    browser: Arc<dyn Browser>,
    store: RunIdentityStore,
    persist_run: bool,
    extractor: PropertiesExtractor,
    disabled: bool,
    state: RunState,
    capabilities: OnceCell<Capabilities>,
}

impl VisualReviewRun {
    /// Creates the run for `suite` using the global `options`
    pub fn new(options: &VisualReviewOptions, suite: SuiteOptions, browser: Arc<dyn Browser>) -> Result<Self> {
        if suite.suite_name.trim().is_empty() {
            return Err(VisualReviewError::Config("suite name must be defined".to_string()));
        }

        let client_config = options.client_config();
        let client = ServerClient::new(&client_config)?;
        let extractor = PropertiesExtractor::new()
            .with_override(options.properties_fn.as_ref())
            .with_override(suite.properties_fn.as_ref());

        Ok(Self {
            project_name: options.project_name.clone(),
            suite_name: suite.suite_name,
            branch_name: options.branch_name.clone(),
            client_config,
            client,
            browser,
            store: options.run_store(),
            persist_run: options.persist_run,
            extractor,
            disabled: options.disabled || suite.disabled,
            state: RunState::Uninitialized,
            capabilities: OnceCell::new(),
        })
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// The active run, if any
    pub fn run(&self) -> Option<&Run> {
        match &self.state {
            RunState::Active(run) => Some(run),
            _ => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn suite_name(&self) -> &str {
        &self.suite_name
    }

    /// Starts a run on the server
    ///
    /// Fails if the server speaks another API version or the run cannot be
    /// created; no screenshot of this suite can be taken afterwards.
    #[instrument(skip(self), fields(project = %self.project_name, suite = %self.suite_name))]
    pub async fn init_run(&mut self) -> Result<()> {
        if self.disabled {
            self.log("Suite is disabled. No run will be created.");
            return Ok(());
        }
        if self.state != RunState::Uninitialized {
            return Err(self.fail(VisualReviewError::Precondition(
                "init_run was already called for this suite".to_string(),
            )));
        }

        self.client.check_version().await.map_err(|e| self.fail(e))?;

        let run = self
            .client
            .create_run(&self.project_name, &self.suite_name, self.branch_name.as_deref())
            .await
            .map_err(|e| self.fail(e))?;

        if self.persist_run {
            self.store.write(&run).await.map_err(|e| self.fail(e))?;
        }

        let message = format!("Created run with ID {}", run.run_id);
        self.state = RunState::Active(run);
        self.log(&message);
        Ok(())
    }

    /// Adopts the run another process recorded in the identity file
    #[instrument(skip(self), fields(project = %self.project_name, suite = %self.suite_name))]
    pub async fn resume_run(&mut self) -> Result<()> {
        if self.disabled {
            return Ok(());
        }
        if self.state != RunState::Uninitialized {
            return Err(self.fail(VisualReviewError::Precondition(
                "a run was already started for this suite".to_string(),
            )));
        }

        let run = self.store.read().await.map_err(|e| self.fail(e))?;
        if run.disabled {
            self.disabled = true;
            self.log("Stored run is disabled. No screenshots will be taken.");
            return Ok(());
        }

        let message = format!("Resumed run with ID {}", run.run_id);
        self.state = RunState::Active(run);
        self.log(&message);
        Ok(())
    }

    /// Takes a screenshot and uploads it to the active run
    ///
    /// The returned handle reads the verdict lazily through `get_result`.
    #[instrument(skip(self, options), fields(suite = %self.suite_name))]
    pub async fn take_screenshot(&self, name: &str, options: ScreenshotOptions) -> Result<ScreenshotHandle> {
        if self.disabled || options.disabled {
            self.log("Screenshot is disabled. No screenshot will be taken.");
            return Ok(ScreenshotHandle::disabled(name));
        }

        let run = self.run().ok_or_else(|| {
            self.fail(VisualReviewError::Precondition(
                "could not send screenshot, no run is active. Was init_run called before this test?".to_string(),
            ))
        })?;

        let extractor = self.extractor.clone().with_override(options.properties_fn.as_ref());
        let (mask, properties, png) = futures::try_join!(
            resolve_masks(&options.exclude, options.include.as_ref()),
            self.properties(&extractor),
            self.capture(options.include.as_ref()),
        )
        .map_err(|e| self.fail(e))?;
        debug!(
            "Uploading {} ({} bytes, {} exclude zones)",
            name,
            png.len(),
            mask.exclude_zones.len()
        );

        self.client
            .send_screenshot(
                name,
                &run.run_id,
                &Value::Object(options.meta),
                &Value::Object(properties),
                options.compare_settings.as_ref(),
                png,
                Some(&mask),
            )
            .await
            .map_err(|e| self.fail(e))?;

        Ok(ScreenshotHandle {
            name: name.to_string(),
            verdict: Verdict::Pending {
                client: self.client.clone(),
                run_id: run.run_id.clone(),
                prefix: self.prefix(),
            },
        })
    }

    /// Ends the run: logs where results can be viewed and removes the identity file
    #[instrument(skip(self), fields(suite = %self.suite_name))]
    pub async fn cleanup(&mut self) -> Result<()> {
        if self.disabled {
            return Ok(());
        }

        let run = match &self.state {
            RunState::Active(run) => run.clone(),
            RunState::Uninitialized => {
                warn!("{} cleanup called without an active run", self.prefix());
                return Ok(());
            }
            RunState::Cleaned(_) => {
                debug!("{} run already cleaned up", self.prefix());
                return Ok(());
            }
        };

        self.log(&format!(
            "Tests finished. Your results can be viewed at: {}",
            self.client_config.results_url(&run)
        ));
        self.store.delete().await.map_err(|e| self.fail(e))?;
        self.state = RunState::Cleaned(run);
        Ok(())
    }

    async fn properties(&self, extractor: &PropertiesExtractor) -> Result<Properties> {
        let (size, capabilities) = futures::try_join!(
            async {
                self.browser
                    .window_size()
                    .await
                    .map_err(|e| VisualReviewError::Driver(format!("could not get the window size: {:#}", e)))
            },
            self.capabilities(),
        )?;

        let mut properties = extractor.extract(capabilities);
        properties.insert(
            "resolution".to_string(),
            Value::String(format!("{}x{}", size.width.round(), size.height.round())),
        );
        Ok(properties)
    }

    /// Browser capabilities, fetched once per suite
    async fn capabilities(&self) -> Result<&Capabilities> {
        self.capabilities
            .get_or_try_init(|| async {
                debug!("Fetching browser capabilities");
                self.browser
                    .capabilities()
                    .await
                    .map_err(|e| VisualReviewError::Driver(format!("could not get the browser capabilities: {:#}", e)))
            })
            .await
    }

    async fn capture(&self, target: Option<&ElementRef>) -> Result<Vec<u8>> {
        let png = match target {
            Some(element) => element.take_screenshot().await,
            None => self.browser.take_screenshot().await,
        };
        png.map_err(|e| VisualReviewError::Driver(format!("could not take the screenshot: {:#}", e)))
    }

    fn prefix(&self) -> String {
        let run_id = match &self.state {
            RunState::Active(run) | RunState::Cleaned(run) => run.run_id.as_str(),
            RunState::Uninitialized => "-",
        };
        format!("[Visual Review][{}][{}][{}]", self.project_name, self.suite_name, run_id)
    }

    fn log(&self, message: &str) {
        info!("{} {}", self.prefix(), message);
    }

    fn fail(&self, error: VisualReviewError) -> VisualReviewError {
        warn!("{} {}", self.prefix(), error);
        error.scoped(self.prefix())
    }
}

impl std::fmt::Debug for VisualReviewRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualReviewRun")
            .field("project_name", &self.project_name)
            .field("suite_name", &self.suite_name)
            .field("disabled", &self.disabled)
            .field("state", &self.state)
            .finish()
    }
}

enum Verdict {
    Disabled,
    Pending {
        client: ServerClient,
        run_id: String,
        prefix: String,
    },
}

/// Outcome of `take_screenshot`; the verdict is fetched on demand
pub struct ScreenshotHandle {
    name: String,
    verdict: Verdict,
}

impl ScreenshotHandle {
    fn disabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            verdict: Verdict::Disabled,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.verdict, Verdict::Disabled)
    }

    /// Queries the run analysis and returns whether this screenshot was accepted
    ///
    /// Always true for disabled screenshots.
    pub async fn get_result(&self) -> Result<bool> {
        match &self.verdict {
            Verdict::Disabled => Ok(true),
            Verdict::Pending { client, run_id, prefix } => {
                let analysis = client.get_run_analysis(run_id).await.map_err(|e| {
                    warn!("{} could not get the test results: {}", prefix, e);
                    e.scoped(prefix.clone())
                })?;
                Ok(extract_result(&analysis, &self.name))
            }
        }
    }
}

impl std::fmt::Debug for ScreenshotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenshotHandle")
            .field("name", &self.name)
            .field("disabled", &self.is_disabled())
            .finish()
    }
}
