//! Global, suite and screenshot options
//!
//! Global options can be built in code or loaded from a config file layered
//! with `VISUALREVIEW_*` environment variables:
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `VISUALREVIEW_PROJECT_NAME` | Project the runs belong to | required |
//! | `VISUALREVIEW_HOSTNAME` | Server host | required |
//! | `VISUALREVIEW_PORT` | Server port | required |
//! | `VISUALREVIEW_SCHEME` | `http` or `https` | `http` |
//! | `VISUALREVIEW_STRICT_SSL` | Verify TLS certificates | `true` |
//! | `VISUALREVIEW_BRANCH_NAME` | Branch recorded on new runs | `master` |
//! | `VISUALREVIEW_DISABLED` | Skip all screenshots | `false` |
//! | `VISUALREVIEW_RUN_STORE_DIR` | Directory of the run identity file | `.` |

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::browser::ElementRef;
use crate::client::{ClientConfig, Rectangle};
use crate::error::{Result, VisualReviewError};
use crate::run::masks::MaskSpec;
use crate::run::properties::PropertiesFn;
use crate::run::store::RunIdentityStore;

/// Prefix of the environment variables read by `VisualReviewOptions::load`
pub const ENV_PREFIX: &str = "VISUALREVIEW";

/// Options shared by every suite of a project
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisualReviewOptions {
    pub project_name: String,
    pub hostname: String,
    pub port: u16,
    pub scheme: String,
    pub strict_ssl: bool,

    /// Branch recorded on new runs; the server default applies when unset
    pub branch_name: Option<String>,

    /// Disables screenshots for every suite
    pub disabled: bool,

    /// One info line per server call
    pub log_requests: bool,

    /// Directory holding the run identity file
    pub run_store_dir: Option<PathBuf>,

    /// Write the run identity file when a run is created
    pub persist_run: bool,

    /// Outermost properties override
    #[serde(skip)]
    pub properties_fn: Option<PropertiesFn>,
}

impl Default for VisualReviewOptions {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            hostname: String::new(),
            port: 0,
            scheme: crate::client::config::DEFAULT_SCHEME.to_string(),
            strict_ssl: true,
            branch_name: None,
            disabled: false,
            log_requests: true,
            run_store_dir: None,
            persist_run: true,
            properties_fn: None,
        }
    }
}

impl VisualReviewOptions {
    pub fn new(project_name: &str, hostname: &str, port: u16) -> Self {
        Self {
            project_name: project_name.to_string(),
            hostname: hostname.to_string(),
            port,
            ..Self::default()
        }
    }

    /// Loads options from an optional file, overridden by environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            debug!("Loading options from {}", path.display());
            builder = builder.add_source(::config::File::from(path));
        }
        builder = builder.add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| VisualReviewError::Config(e.to_string()))
    }

    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    pub fn with_branch_name(mut self, branch_name: &str) -> Self {
        self.branch_name = Some(branch_name.to_string());
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_run_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.run_store_dir = Some(dir.into());
        self
    }

    pub fn with_persist_run(mut self, persist_run: bool) -> Self {
        self.persist_run = persist_run;
        self
    }

    pub fn with_properties_fn(mut self, properties_fn: PropertiesFn) -> Self {
        self.properties_fn = Some(properties_fn);
        self
    }

    /// Checks the options every run depends on
    pub fn validate(&self) -> Result<()> {
        if self.project_name.trim().is_empty() {
            return Err(VisualReviewError::Config("project name must be defined".to_string()));
        }
        if self.hostname.trim().is_empty() {
            return Err(VisualReviewError::Config("hostname must be defined".to_string()));
        }
        if self.port == 0 {
            return Err(VisualReviewError::Config("port must be defined".to_string()));
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(VisualReviewError::Config(format!(
                "scheme must be http or https, got {}",
                self.scheme
            )));
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.hostname, self.port)
            .with_scheme(&self.scheme)
            .with_strict_ssl(self.strict_ssl)
            .with_log_requests(self.log_requests)
    }

    pub fn run_store(&self) -> RunIdentityStore {
        match &self.run_store_dir {
            Some(dir) => RunIdentityStore::new(dir),
            None => RunIdentityStore::in_working_dir(),
        }
    }
}

/// Options of one test suite
#[derive(Debug, Clone, Default)]
pub struct SuiteOptions {
    pub suite_name: String,

    /// Disables screenshots for this suite only
    pub disabled: bool,

    /// Overrides the global properties function
    pub properties_fn: Option<PropertiesFn>,
}

impl SuiteOptions {
    pub fn new(suite_name: &str) -> Self {
        Self {
            suite_name: suite_name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_properties_fn(mut self, properties_fn: PropertiesFn) -> Self {
        self.properties_fn = Some(properties_fn);
        self
    }
}

/// Options of a single screenshot
#[derive(Debug, Clone, Default)]
pub struct ScreenshotOptions {
    /// Element to capture instead of the whole viewport
    pub include: Option<ElementRef>,

    /// Regions left out of the comparison
    pub exclude: Vec<MaskSpec>,

    /// Overrides the suite properties function
    pub properties_fn: Option<PropertiesFn>,

    pub compare_settings: Option<Value>,

    /// Free-form metadata sent as the `meta` part
    pub meta: Map<String, Value>,

    pub disabled: bool,
}

impl ScreenshotOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, element: ElementRef) -> Self {
        self.include = Some(element);
        self
    }

    pub fn exclude(mut self, spec: impl Into<MaskSpec>) -> Self {
        self.exclude.push(spec.into());
        self
    }

    pub fn exclude_rect(self, x: i64, y: i64, width: i64, height: i64) -> Self {
        self.exclude(Rectangle::new(x, y, width, height))
    }

    pub fn properties_fn(mut self, properties_fn: PropertiesFn) -> Self {
        self.properties_fn = Some(properties_fn);
        self
    }

    pub fn compare_settings(mut self, settings: Value) -> Self {
        self.compare_settings = Some(settings);
        self
    }

    pub fn meta(mut self, key: &str, value: Value) -> Self {
        self.meta.insert(key.to_string(), value);
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_requires_project_host_and_port() {
        assert!(VisualReviewOptions::new("P", "localhost", 7000).validate().is_ok());
        assert!(VisualReviewOptions::new("", "localhost", 7000).validate().is_err());
        assert!(VisualReviewOptions::new("P", "", 7000).validate().is_err());
        assert!(VisualReviewOptions::new("P", "localhost", 0).validate().is_err());
        assert!(VisualReviewOptions::new("P", "localhost", 7000)
            .with_scheme("ftp")
            .validate()
            .is_err());
    }

    #[test]
    fn test_client_config_carries_connection_settings() {
        let options = VisualReviewOptions::new("P", "vr.local", 443).with_scheme("https");
        let client = options.client_config();
        assert_eq!(client.hostname, "vr.local");
        assert_eq!(client.port, 443);
        assert_eq!(client.scheme, "https");
        assert!(client.strict_ssl);
    }

    #[test]
    fn test_load_reads_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "project_name = \"Shop\"\nhostname = \"vr.internal\"\nport = 7000\nbranch_name = \"develop\"\ndisabled = true"
        )
        .unwrap();

        let options = VisualReviewOptions::load(Some(file.path())).unwrap();
        assert_eq!(options.project_name, "Shop");
        assert_eq!(options.hostname, "vr.internal");
        assert_eq!(options.port, 7000);
        assert_eq!(options.branch_name.as_deref(), Some("develop"));
        assert!(options.disabled);
        assert_eq!(options.scheme, "http");
        assert!(options.persist_run);
    }

    #[test]
    fn test_screenshot_options_builder_collects_masks() {
        let options = ScreenshotOptions::new()
            .exclude_rect(0, 0, 10, 10)
            .exclude_rect(5, 5, 1, 1)
            .meta("build", Value::from(12));
        assert_eq!(options.exclude.len(), 2);
        assert_eq!(options.meta["build"], 12);
        assert!(options.include.is_none());
    }
}
