//! Visual regression testing against a VisualReview server
//!
//! Screenshots taken during browser tests are uploaded, together with
//! environment properties and exclude zones, to a run on the server; the
//! server's verdict can then be read back per screenshot.

pub mod browser;
pub mod client;
pub mod config;
pub mod error;
pub mod run;
pub mod utils;
pub mod visualreview;

pub use client::{Mask, Rectangle, Run, ServerClient};
pub use config::{ScreenshotOptions, SuiteOptions, VisualReviewOptions};
pub use error::{Result, VisualReviewError};
pub use run::masks::MaskSpec;
pub use run::properties::{Properties, PropertiesFn};
pub use run::{RunState, ScreenshotHandle, VisualReviewRun};
pub use visualreview::VisualReview;
