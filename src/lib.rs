//! Full-page screenshots of a web application at a set of named pages and
//! viewport sizes, for visual verification.

pub mod capture;
pub mod config;
pub mod utils;

use anyhow::Result;
use tracing::debug;

use crate::capture::driver::ensure_driver;
use crate::capture::{CaptureRunner, RunSummary, WebDriverBrowser};
use crate::config::CaptureConfig;

/// Validates `config`, brings up the browser and captures every pair
pub async fn run(config: &CaptureConfig) -> Result<RunSummary> {
    config.validate()?;
    debug!("Running capture with {:?}", config);

    let runner = CaptureRunner::new(
        config.output_dir(),
        config.base_url()?,
        config.viewports.clone(),
        config.pages.clone(),
        config.settle_policy(),
    );
    let webdriver_url = config.webdriver_url()?;
    let driver = ensure_driver(
        &webdriver_url,
        config.launch_driver,
        &config.driver_binary,
        config.driver_startup_timeout(),
    )
    .await?;
    let browser = WebDriverBrowser::new(webdriver_url, config.headless, config.navigation_timeout(), driver);

    runner.run(browser).await
}
