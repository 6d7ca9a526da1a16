use serde_json::{Map, Value};

/// WebDriver endpoint used when none is given
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// Window size the CLI browser starts with
pub const DEFAULT_WINDOW_SIZE: (u32, u32) = (1280, 800);

// Chrome browser arguments. Rendering flags are pinned so screenshots stay comparable
// between runs.
pub fn chrome_arguments(headless: bool, window_size: (u32, u32)) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--no-sandbox",
        "--disable-gpu",
        "--disable-dev-shm-usage",
        "--disable-extensions",
        "--disable-notifications",
        "--disable-infobars",
        "--hide-scrollbars",
        "--force-color-profile=srgb",
        "--force-device-scale-factor=1",
        "--font-render-hinting=none",
        "--mute-audio",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    args.push(format!("--window-size={},{}", window_size.0, window_size.1));
    if headless {
        args.push("--headless=new".to_string());
    }
    args
}

/// Capabilities requested for a new Chrome session
pub fn chrome_capabilities(headless: bool, window_size: (u32, u32)) -> Map<String, Value> {
    let mut chrome_opts = Map::new();
    chrome_opts.insert(
        "args".to_string(),
        Value::Array(
            chrome_arguments(headless, window_size)
                .into_iter()
                .map(Value::String)
                .collect(),
        ),
    );

    let mut caps = Map::new();
    caps.insert("browserName".to_string(), Value::String("chrome".to_string()));
    caps.insert("goog:chromeOptions".to_string(), Value::Object(chrome_opts));
    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_flag_is_optional() {
        let headed = chrome_arguments(false, (800, 600));
        assert!(!headed.iter().any(|a| a.starts_with("--headless")));
        assert!(headed.contains(&"--window-size=800,600".to_string()));

        let headless = chrome_arguments(true, (800, 600));
        assert!(headless.contains(&"--headless=new".to_string()));
    }

    #[test]
    fn test_capabilities_name_the_browser() {
        let caps = chrome_capabilities(true, DEFAULT_WINDOW_SIZE);
        assert_eq!(caps.get("browserName"), Some(&Value::String("chrome".to_string())));
        assert!(caps["goog:chromeOptions"]["args"].is_array());
    }
}
