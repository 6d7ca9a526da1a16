use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use visualreview::browser::config::{chrome_capabilities, DEFAULT_WEBDRIVER_URL, DEFAULT_WINDOW_SIZE};
use visualreview::browser::webdriver::WebDriverBrowser;
use visualreview::client::EXPECTED_API_VERSION;
use visualreview::run::masks::validate_zone;
use visualreview::run::result::extract_result;
use visualreview::utils::logger::init_logger;
use visualreview::{Mask, Rectangle, ScreenshotOptions, SuiteOptions, VisualReview, VisualReviewOptions};

#[derive(Parser, Debug)]
#[command(name = "visualreview", version, about = "Upload screenshots to a VisualReview server")]
struct Cli {
    /// Options file (TOML, JSON or YAML); VISUALREVIEW_* variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write logs to a timestamped file in this directory instead of stdout
    #[arg(long)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the server API version
    Version,

    /// Create a run and record it in the run identity file
    CreateRun {
        #[arg(long)]
        suite: String,
        #[arg(long)]
        branch: Option<String>,
    },

    /// Upload a PNG file to the recorded run
    Upload {
        #[arg(long)]
        name: String,
        #[arg(long)]
        file: PathBuf,
        /// Exclude zone as x,y,width,height
        #[arg(long = "mask", value_parser = parse_rectangle)]
        masks: Vec<Rectangle>,
        /// Extra property as key=value
        #[arg(long = "property", value_parser = parse_property)]
        properties: Vec<(String, String)>,
    },

    /// Screenshot a page through WebDriver and upload it to the recorded run
    Snap {
        #[arg(long, default_value = DEFAULT_WEBDRIVER_URL)]
        webdriver: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        suite: String,
        #[arg(long)]
        name: String,
        /// CSS selector of the element to capture instead of the viewport
        #[arg(long)]
        include: Option<String>,
        /// CSS selector of an element to leave out of the comparison
        #[arg(long)]
        exclude: Vec<String>,
        #[arg(long)]
        headed: bool,
    },

    /// Print the verdict for a screenshot of the recorded run
    Result {
        #[arg(long)]
        name: String,
    },

    /// Print the results page and remove the run identity file
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.log_dir.as_deref())?;

    let options = VisualReviewOptions::load(cli.config.as_deref()).context("Failed to load options")?;
    let vr = VisualReview::new(options).context("Invalid VisualReview options")?;

    match cli.command {
        Command::Version => {
            let version = vr.client()?.get_version().await?;
            println!("server API version {} (expected {})", version, EXPECTED_API_VERSION);
        }
        Command::CreateRun { suite, branch } => {
            let client = vr.client()?;
            client.check_version().await?;
            let branch = branch.or_else(|| vr.options().branch_name.clone());
            let run = client
                .create_run(&vr.options().project_name, &suite, branch.as_deref())
                .await?;
            vr.run_store().write(&run).await?;
            info!("Created run with ID {}", run.run_id);
            println!("{}", run.run_id);
        }
        Command::Upload { name, file, masks, properties } => {
            let run = vr.run_store().read().await.context("No recorded run, call create-run first")?;
            let png = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let properties: Map<String, Value> = properties
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect();
            let mask = Mask { exclude_zones: masks };

            vr.client()?
                .send_screenshot(
                    &name,
                    &run.run_id,
                    &Value::Object(Map::new()),
                    &Value::Object(properties),
                    None,
                    png,
                    Some(&mask),
                )
                .await?;
            println!("uploaded {} to run {}", name, run.run_id);
        }
        Command::Snap { webdriver, url, suite, name, include, exclude, headed } => {
            let browser = WebDriverBrowser::connect(
                &webdriver,
                chrome_capabilities(!headed, DEFAULT_WINDOW_SIZE),
                Some(DEFAULT_WINDOW_SIZE),
            )
            .await?;

            let outcome = snap(&vr, &browser, &url, &suite, &name, include.as_deref(), &exclude).await;
            if let Err(e) = browser.close().await {
                error!("Failed to close WebDriver session: {}", e);
            }
            outcome?;
        }
        Command::Result { name } => {
            let run = vr.run_store().read().await.context("No recorded run, call create-run first")?;
            let analysis = vr.client()?.get_run_analysis(&run.run_id).await?;
            let accepted = extract_result(&analysis, &name);
            println!("{}: {}", name, if accepted { "accepted" } else { "not accepted" });
            if !accepted {
                bail!("screenshot {} was not accepted", name);
            }
        }
        Command::Cleanup => {
            let store = vr.run_store();
            let run = store.read().await.context("No recorded run")?;
            println!(
                "Your results can be viewed at: {}",
                vr.options().client_config().results_url(&run)
            );
            store.delete().await?;
        }
    }

    Ok(())
}

async fn snap(
    vr: &VisualReview,
    browser: &WebDriverBrowser,
    url: &str,
    suite: &str,
    name: &str,
    include: Option<&str>,
    exclude: &[String],
) -> Result<()> {
    browser.goto(url).await?;

    let mut options = ScreenshotOptions::new();
    if let Some(selector) = include {
        options = options.include(browser.find_css(selector).await?);
    }
    for selector in exclude {
        options = options.exclude(browser.find_css(selector).await?);
    }

    let mut run = vr.run(SuiteOptions::new(suite), Arc::new(browser.clone()))?;
    run.resume_run().await?;
    let handle = run.take_screenshot(name, options).await?;
    println!("uploaded {}", handle.name());
    Ok(())
}

fn parse_rectangle(raw: &str) -> std::result::Result<Rectangle, String> {
    let parts = raw
        .split(',')
        .map(|part| part.trim().parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid mask {}: {}", raw, e))?;
    let rect = match parts.as_slice() {
        [x, y, width, height] => Rectangle::new(*x, *y, *width, *height),
        _ => return Err(format!("mask must be x,y,width,height, got {}", raw)),
    };
    validate_zone(&rect).map_err(|e| e.to_string())?;
    Ok(rect)
}

fn parse_property(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("property must be key=value, got {}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rectangle() {
        assert_eq!(parse_rectangle("1, 2,3,4").unwrap(), Rectangle::new(1, 2, 3, 4));
        assert!(parse_rectangle("1,2,3").is_err());
        assert!(parse_rectangle("a,2,3,4").is_err());
        assert!(parse_rectangle("0,0,-5,5").is_err());
        assert!(parse_rectangle("-1,0,5,5").is_err());
    }

    #[test]
    fn test_parse_property() {
        assert_eq!(parse_property("os=linux").unwrap(), ("os".to_string(), "linux".to_string()));
        assert!(parse_property("os").is_err());
    }

    #[test]
    fn test_cli_parses_upload_masks() {
        let cli = Cli::try_parse_from([
            "visualreview", "upload", "--name", "Home", "--file", "home.png", "--mask", "0,0,10,10", "--mask",
            "5,5,1,1",
        ])
        .unwrap();
        match cli.command {
            Command::Upload { masks, .. } => assert_eq!(masks.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
