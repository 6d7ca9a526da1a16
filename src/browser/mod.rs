//! Interface to the host's browser driver
//!
//! The orchestrator only needs a handful of queries from the driver: a
//! screenshot of the viewport or of one element, element geometry, the
//! session capabilities and the current window size. `webdriver` provides an
//! implementation backed by a WebDriver session.

pub mod config;
pub mod webdriver;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Capabilities reported by the browser session
pub type Capabilities = Map<String, Value>;

/// Shared reference to a page element owned by the driver
pub type ElementRef = Arc<dyn Element>;

/// Top-left corner of an element in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

/// Size of an element or of the browser window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Browser session as seen by the screenshot orchestrator
#[async_trait]
pub trait Browser: Send + Sync {
    /// PNG of the current viewport
    async fn take_screenshot(&self) -> Result<Vec<u8>>;

    async fn capabilities(&self) -> Result<Capabilities>;

    /// Outer size of the browser window
    async fn window_size(&self) -> Result<Size>;
}

/// A located page element
#[async_trait]
pub trait Element: Send + Sync {
    /// PNG cropped to this element
    async fn take_screenshot(&self) -> Result<Vec<u8>>;

    async fn size(&self) -> Result<Size>;

    async fn location(&self) -> Result<Location>;
}

impl fmt::Debug for dyn Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Element(..)")
    }
}
