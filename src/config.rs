use anyhow::{bail, Context, Result};
use clap::Parser;
use sanitize_filename::sanitize;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::capture::config::{
    DEFAULT_DRIVER_BINARY, DEFAULT_DRIVER_STARTUP_TIMEOUT, DEFAULT_NAVIGATION_TIMEOUT, DEFAULT_WEBDRIVER_URL,
};
use crate::capture::settle::{SettlePolicy, DEFAULT_READY_TIMEOUT, DEFAULT_SETTLE_DELAY};
use crate::capture::{CapturePair, PageTarget, ViewportSpec};

/// Config file picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "capture.toml";
/// Prefix of environment overrides, e.g. `CAPTURE_BASE_URL`
pub const ENV_PREFIX: &str = "CAPTURE";

pub fn default_viewports() -> Vec<ViewportSpec> {
    vec![
        ViewportSpec::new("desktop", 1920, 1080),
        ViewportSpec::new("laptop", 1366, 768),
        ViewportSpec::new("tablet", 768, 1024),
        ViewportSpec::new("mobile", 375, 667),
    ]
}

pub fn default_pages() -> Vec<PageTarget> {
    vec![
        PageTarget::new("dashboard", "/"),
        PageTarget::new("admin", "/admin"),
    ]
}

/// Configuration for a capture run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory the screenshots are written to
    pub output_dir: String,

    /// Base URL relative page URLs are resolved against
    pub base_url: String,

    /// Viewports, captured in this order
    pub viewports: Vec<ViewportSpec>,

    /// Pages, captured in this order within each viewport
    pub pages: Vec<PageTarget>,

    /// Fixed pause after the page is ready
    pub settle_delay_ms: u64,

    /// Bound for the document-ready and selector waits
    pub ready_timeout_secs: u64,

    /// CSS selector to wait for before capturing
    pub wait_for_selector: Option<String>,

    /// Page load timeout for navigation
    pub navigation_timeout_secs: u64,

    pub webdriver_url: String,

    /// Start `driver_binary` when nothing answers at `webdriver_url`
    pub launch_driver: bool,

    pub driver_binary: String,

    pub driver_startup_timeout_secs: u64,

    /// Whether to run the browser in headless mode
    pub headless: bool,

    /// Also write logs to a timestamped file in this directory
    pub log_dir: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: "verification/screenshots".to_string(),
            base_url: "http://localhost:3000".to_string(),
            viewports: default_viewports(),
            pages: default_pages(),
            settle_delay_ms: DEFAULT_SETTLE_DELAY.as_millis() as u64,
            ready_timeout_secs: DEFAULT_READY_TIMEOUT.as_secs(),
            wait_for_selector: None,
            navigation_timeout_secs: DEFAULT_NAVIGATION_TIMEOUT.as_secs(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            launch_driver: true,
            driver_binary: DEFAULT_DRIVER_BINARY.to_string(),
            driver_startup_timeout_secs: DEFAULT_DRIVER_STARTUP_TIMEOUT.as_secs(),
            headless: true,
            log_dir: None,
        }
    }
}

impl CaptureConfig {
    /// Layers defaults, the config file and `CAPTURE_*` environment variables.
    ///
    /// `path` must exist when given; otherwise `capture.toml` is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let settings = ::config::Config::builder()
            .add_source(file)
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read capture configuration")?;

        settings
            .try_deserialize::<CaptureConfig>()
            .context("Invalid capture configuration")
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).with_context(|| format!("Invalid base URL: {}", self.base_url))
    }

    pub fn webdriver_url(&self) -> Result<Url> {
        Url::parse(&self.webdriver_url).with_context(|| format!("Invalid WebDriver URL: {}", self.webdriver_url))
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }

    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy {
            ready_timeout: Duration::from_secs(self.ready_timeout_secs),
            wait_for_selector: self.wait_for_selector.clone(),
            delay: Duration::from_millis(self.settle_delay_ms),
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn driver_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.driver_startup_timeout_secs)
    }

    /// Rejects configurations whose output file names would not be unique,
    /// or whose URLs cannot be used
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.trim().is_empty() {
            bail!("output_dir must not be empty");
        }
        if self.viewports.is_empty() {
            bail!("At least one viewport is required");
        }
        if self.pages.is_empty() {
            bail!("At least one page is required");
        }

        let mut seen = HashSet::new();
        for viewport in &self.viewports {
            check_name("viewport", &viewport.name)?;
            if viewport.width == 0 || viewport.height == 0 {
                bail!("Viewport '{}' must have a positive width and height", viewport.name);
            }
            if !seen.insert(viewport.name.as_str()) {
                bail!("Duplicate viewport name '{}'", viewport.name);
            }
        }

        let base = self.base_url()?;
        let mut seen = HashSet::new();
        for page in &self.pages {
            check_name("page", &page.name)?;
            if !seen.insert(page.name.as_str()) {
                bail!("Duplicate page name '{}'", page.name);
            }
            page.resolve(&base)?;
        }

        // Names may contain '_', so distinct pairs can still join to the same name
        let mut files = HashSet::new();
        for viewport in &self.viewports {
            for page in &self.pages {
                let file_name = CapturePair::new(viewport, page).file_name();
                if !files.insert(file_name.clone()) {
                    bail!(
                        "Page '{}' on viewport '{}' would overwrite another capture: {}",
                        page.name, viewport.name, file_name
                    );
                }
            }
        }

        self.webdriver_url()?;
        Ok(())
    }
}

fn check_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("A {} name must not be empty", kind);
    }
    if sanitize(name) != name {
        bail!("The {} name '{}' is not a valid file name component", kind, name);
    }
    Ok(())
}

/// Command line overrides; every flag is optional
#[derive(Debug, Default, Parser)]
#[command(name = "visual_capture")]
#[command(about = "Capture full-page screenshots of an app at several viewport sizes")]
#[command(version)]
pub struct CliArgs {
    /// Config file (TOML, JSON or YAML); defaults to ./capture.toml if present
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory to write screenshots to
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Base URL of the application
    #[arg(short, long)]
    pub base_url: Option<String>,

    /// WebDriver endpoint
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Pause after the page is ready, in milliseconds
    #[arg(long)]
    pub settle_delay_ms: Option<u64>,

    /// CSS selector to wait for before capturing
    #[arg(long)]
    pub wait_for: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Never start a WebDriver process
    #[arg(long)]
    pub no_launch_driver: bool,

    /// Also log to a file in this directory
    #[arg(long)]
    pub log_dir: Option<String>,
}

impl CliArgs {
    /// Applies the flags that were given on top of `config`
    pub fn apply(self, config: &mut CaptureConfig) {
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(webdriver_url) = self.webdriver_url {
            config.webdriver_url = webdriver_url;
        }
        if let Some(delay) = self.settle_delay_ms {
            config.settle_delay_ms = delay;
        }
        if let Some(selector) = self.wait_for {
            config.wait_for_selector = Some(selector);
        }
        if self.headed {
            config.headless = false;
        }
        if self.no_launch_driver {
            config.launch_driver = false;
        }
        if let Some(log_dir) = self.log_dir {
            config.log_dir = Some(log_dir);
        }
    }
}
