use anyhow::{Context, Result};
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

use crate::browser::{Browser, Capabilities, Element, ElementRef, Location, Size};

/// `Browser` backed by a WebDriver session
#[derive(Clone)]
pub struct WebDriverBrowser {
    client: Client,
    capabilities: Capabilities,
}

impl WebDriverBrowser {
    /// Opens a new WebDriver session with the given capabilities
    ///
    /// The capabilities are kept and reported back through `Browser::capabilities`.
    pub async fn connect(
        webdriver_url: &str,
        capabilities: Capabilities,
        window_size: Option<(u32, u32)>,
    ) -> Result<Self> {
        debug!("Connecting to WebDriver at {}", webdriver_url);
        let client = match ClientBuilder::native()
            .capabilities(capabilities.clone())
            .connect(webdriver_url)
            .await
        {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
                return Err(e).context(format!("Failed to connect to WebDriver at {}", webdriver_url));
            }
        };

        if let Some((width, height)) = window_size {
            debug!("Setting window size to {}x{}", width, height);
            if let Err(e) = client.set_window_size(width, height).await {
                error!("Failed to set window size to {}x{}: {}", width, height, e);
            }
        }

        trace!("Successfully created WebDriver session");
        Ok(Self { client, capabilities })
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to URL: {}", url);
        self.client
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))
    }

    /// Finds the first element matching a CSS selector
    pub async fn find_css(&self, selector: &str) -> Result<ElementRef> {
        let element = self
            .client
            .find(Locator::Css(selector))
            .await
            .with_context(|| format!("No element matches {}", selector))?;
        Ok(Arc::new(WebDriverElement { element }))
    }

    /// Ends the WebDriver session
    pub async fn close(self) -> Result<()> {
        self.client.close().await.context("Failed to close WebDriver session")
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn take_screenshot(&self) -> Result<Vec<u8>> {
        let png = self.client.screenshot().await.context("Failed to capture screenshot")?;
        trace!("Screenshot captured successfully, {} bytes", png.len());
        Ok(png)
    }

    async fn capabilities(&self) -> Result<Capabilities> {
        match self.client.execute(SESSION_INFO_SCRIPT, Vec::new()).await {
            Ok(session) => Ok(merge_session_info(self.capabilities.clone(), &session)),
            Err(e) => {
                warn!("Failed to read platform and version from the browser: {}", e);
                Ok(self.capabilities.clone())
            }
        }
    }

    async fn window_size(&self) -> Result<Size> {
        let (width, height) = self
            .client
            .get_window_size()
            .await
            .context("Failed to read window size")?;
        Ok(Size {
            width: width as f64,
            height: height as f64,
        })
    }
}

const SESSION_INFO_SCRIPT: &str = "return {platform: navigator.platform, userAgent: navigator.userAgent};";

/// Fills platform and browser version from the live session when the requested
/// capabilities carry neither
fn merge_session_info(mut capabilities: Capabilities, session: &Value) -> Capabilities {
    let missing = |caps: &Capabilities, keys: [&str; 2]| !keys.iter().any(|key| caps.contains_key(*key));

    if missing(&capabilities, ["platform", "platformName"]) {
        if let Some(platform) = session.get("platform").and_then(Value::as_str).filter(|p| !p.is_empty()) {
            capabilities.insert("platformName".to_string(), Value::String(platform.to_string()));
        }
    }

    if missing(&capabilities, ["version", "browserVersion"]) {
        let browser_name = capabilities.get("browserName").and_then(Value::as_str);
        let version = session
            .get("userAgent")
            .and_then(Value::as_str)
            .and_then(|user_agent| browser_version(user_agent, browser_name));
        if let Some(version) = version {
            capabilities.insert("browserVersion".to_string(), Value::String(version));
        }
    }

    capabilities
}

/// Version of the named browser's product token in a user agent string
fn browser_version(user_agent: &str, browser_name: Option<&str>) -> Option<String> {
    let product = match browser_name.map(str::to_ascii_lowercase).as_deref() {
        Some("firefox") => "Firefox",
        Some("microsoftedge") | Some("msedge") => "Edg",
        Some("safari") => "Version",
        _ => "Chrome",
    };

    user_agent.split_whitespace().find_map(|token| {
        let (name, version) = token.split_once('/')?;
        (name.trim_start_matches("Headless") == product).then(|| version.to_string())
    })
}

/// `Element` backed by a WebDriver element handle
pub struct WebDriverElement {
    element: fantoccini::elements::Element,
}

#[async_trait]
impl Element for WebDriverElement {
    async fn take_screenshot(&self) -> Result<Vec<u8>> {
        self.element
            .screenshot()
            .await
            .context("Failed to capture element screenshot")
    }

    async fn size(&self) -> Result<Size> {
        let (_, _, width, height) = self.element.rectangle().await.context("Failed to read element size")?;
        Ok(Size { width, height })
    }

    async fn location(&self) -> Result<Location> {
        let (x, y, _, _) = self
            .element
            .rectangle()
            .await
            .context("Failed to read element location")?;
        Ok(Location { x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CHROME_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                             HeadlessChrome/120.0.6099.109 Safari/537.36";

    fn requested() -> Capabilities {
        match json!({"browserName": "chrome", "goog:chromeOptions": {"args": ["--headless"]}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_session_info_fills_platform_and_version() {
        let caps = merge_session_info(requested(), &json!({"platform": "Linux x86_64", "userAgent": CHROME_UA}));
        assert_eq!(caps["platformName"], "Linux x86_64");
        assert_eq!(caps["browserVersion"], "120.0.6099.109");
        assert_eq!(caps["browserName"], "chrome");
    }

    #[test]
    fn test_requested_values_take_precedence() {
        let mut caps = requested();
        caps.insert("platform".to_string(), json!("LINUX"));
        caps.insert("version".to_string(), json!("119"));
        let merged = merge_session_info(caps, &json!({"platform": "MacIntel", "userAgent": CHROME_UA}));
        assert_eq!(merged["platform"], "LINUX");
        assert_eq!(merged["version"], "119");
        assert!(!merged.contains_key("platformName"));
        assert!(!merged.contains_key("browserVersion"));
    }

    #[test]
    fn test_unusable_session_info_leaves_capabilities_unchanged() {
        let merged = merge_session_info(requested(), &Value::Null);
        assert_eq!(merged, requested());
        let merged = merge_session_info(requested(), &json!({"platform": "", "userAgent": "curl/8.0"}));
        assert_eq!(merged, requested());
    }

    #[test]
    fn test_browser_version_picks_named_product() {
        let firefox = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
        assert_eq!(browser_version(firefox, Some("firefox")).as_deref(), Some("121.0"));
        let edge = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91";
        assert_eq!(browser_version(edge, Some("MicrosoftEdge")).as_deref(), Some("120.0.2210.91"));
        assert_eq!(browser_version(edge, None).as_deref(), Some("120.0.0.0"));
    }
}
