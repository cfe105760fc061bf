use anyhow::{bail, Context, Result};
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder, Locator};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::capture::browser::{Browser, BrowsingContext};
use crate::capture::config::{self, RESIZE_SETTLE, SCREENSHOT_TIMEOUT};
use crate::capture::driver::DriverProcess;
use crate::capture::model::ViewportSpec;
use crate::capture::settle::{SettlePolicy, READY_POLL_INTERVAL};

const WINDOW_CHROME_SCRIPT: &str =
    "return [window.outerWidth - window.innerWidth, window.outerHeight - window.innerHeight];";
const DOCUMENT_HEIGHT_SCRIPT: &str = "return Math.max(\
    document.documentElement ? document.documentElement.scrollHeight : 0, \
    document.body ? document.body.scrollHeight : 0);";
const READY_STATE_SCRIPT: &str = "return document.readyState";

/// Creates a new WebDriver session for `viewport`
///
/// Sets up a Chrome browser instance with the window sized for the viewport
/// and a page-load timeout.
///
/// # Arguments
/// * `webdriver_url` - WebDriver server URL
/// * `viewport` - Viewport the session is opened for
/// * `headless` - Whether to run in headless mode
/// * `navigation_timeout` - Page-load timeout applied to navigation
pub async fn create_client(
    webdriver_url: &Url,
    viewport: &ViewportSpec,
    headless: bool,
    navigation_timeout: Duration,
) -> Result<Client> {
    trace!("Creating new WebDriver client connecting to {}", webdriver_url);
    let mut caps = serde_json::map::Map::new();
    let mut chrome_opts = serde_json::map::Map::new();

    debug!("Configuring Chrome options with headless={}", headless);
    let args = config::chrome_arguments(headless, viewport);

    trace!("Setting Chrome arguments: {:?}", args);
    chrome_opts.insert("args".to_string(), serde_json::Value::Array(
        args.into_iter().map(serde_json::Value::String).collect()
    ));
    chrome_opts.insert("prefs".to_string(), serde_json::Value::Object(config::chrome_preferences()));

    caps.insert("browserName".to_string(), serde_json::Value::String("chrome".to_string()));
    caps.insert("goog:chromeOptions".to_string(), serde_json::Value::Object(chrome_opts));

    debug!("Connecting to WebDriver at {}", webdriver_url);
    let client = match ClientBuilder::native()
        .capabilities(caps)
        .connect(webdriver_url.as_str())
        .await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
                return Err(e).context(format!("Failed to connect to WebDriver at {}", webdriver_url));
            }
        };

    client
        .update_timeouts(TimeoutConfiguration::new(None, Some(navigation_timeout), None))
        .await
        .context("Failed to set page load timeout")?;

    trace!("Successfully created WebDriver client");
    Ok(client)
}

/// Width and height the window adds around the viewport
async fn window_chrome(client: &Client) -> Result<(u32, u32)> {
    let value = client
        .execute(WINDOW_CHROME_SCRIPT, vec![])
        .await
        .context("Failed to measure window chrome")?;
    let deltas: Vec<i64> = serde_json::from_value(value).context("Unexpected window chrome measurement")?;
    match deltas.as_slice() {
        [w, h] => Ok(((*w).max(0) as u32, (*h).max(0) as u32)),
        _ => bail!("Unexpected window chrome measurement: {:?}", deltas),
    }
}

/// A chromedriver-compatible WebDriver endpoint
pub struct WebDriverBrowser {
    webdriver_url: Url,
    headless: bool,
    navigation_timeout: Duration,
    driver: Option<DriverProcess>,
}

impl WebDriverBrowser {
    /// `driver` is the process backing `webdriver_url` when we launched it
    pub fn new(
        webdriver_url: Url,
        headless: bool,
        navigation_timeout: Duration,
        driver: Option<DriverProcess>,
    ) -> Self {
        Self {
            webdriver_url,
            headless,
            navigation_timeout,
            driver,
        }
    }
}

impl Browser for WebDriverBrowser {
    type Context = WebDriverContext;

    async fn new_context(&self, viewport: &ViewportSpec) -> Result<WebDriverContext> {
        let client = create_client(&self.webdriver_url, viewport, self.headless, self.navigation_timeout)
            .await
            .with_context(|| format!("Failed to open browsing context for {}", viewport))?;

        let mut context = WebDriverContext {
            client,
            width: viewport.width,
            height: viewport.height,
            chrome: (0, 0),
            expanded: false,
        };

        if let Err(e) = context.fit_viewport().await {
            // The session is useless if its viewport is wrong
            if let Err(close_err) = context.client.close().await {
                warn!("Failed to close WebDriver session: {}", close_err);
            }
            return Err(e).with_context(|| format!("Failed to size viewport to {}", viewport));
        }

        debug!("Opened browsing context for {}", viewport);
        Ok(context)
    }

    async fn close(self) -> Result<()> {
        info!("Closing browser");
        match self.driver {
            Some(driver) => driver.shutdown().await,
            None => Ok(()),
        }
    }
}

/// One WebDriver session sized to a viewport
pub struct WebDriverContext {
    client: Client,
    width: u32,
    height: u32,
    /// Extra (width, height) of the window around the viewport
    chrome: (u32, u32),
    /// Window is still grown from a capture whose restore failed
    expanded: bool,
}

impl WebDriverContext {
    async fn resize_inner(&self, width: u32, height: u32) -> Result<()> {
        let (dw, dh) = self.chrome;
        trace!("Resizing window to inner {}x{}", width, height);
        self.client
            .set_window_size(width + dw, height + dh)
            .await
            .with_context(|| format!("Failed to resize window to {}x{}", width, height))
    }

    /// Resizes the window so the inner viewport is exactly width x height
    async fn fit_viewport(&mut self) -> Result<()> {
        self.chrome = window_chrome(&self.client).await?;
        debug!("Window chrome is {}x{}", self.chrome.0, self.chrome.1);
        self.resize_inner(self.width, self.height).await
    }

    async fn document_height(&self) -> Result<u32> {
        let value = self
            .client
            .execute(DOCUMENT_HEIGHT_SCRIPT, vec![])
            .await
            .context("Failed to measure document height")?;
        let height = value
            .as_f64()
            .with_context(|| format!("Unexpected document height: {}", value))?;
        Ok(height.ceil().max(0.0) as u32)
    }

    async fn wait_for_ready_state(&self, limit: Duration) -> Result<()> {
        let deadline = Instant::now() + limit;
        loop {
            let state = self
                .client
                .execute(READY_STATE_SCRIPT, vec![])
                .await
                .context("Failed to read document.readyState")?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("Page not ready after {:?} (readyState {})", limit, state);
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }
}

impl BrowsingContext for WebDriverContext {
    async fn goto(&mut self, url: &Url) -> Result<()> {
        debug!("Navigating to URL: {}", url);
        self.client
            .goto(url.as_str())
            .await
            .with_context(|| format!("Failed to navigate to {}", url))
    }

    async fn settle(&mut self, policy: &SettlePolicy) -> Result<()> {
        self.wait_for_ready_state(policy.ready_timeout).await?;

        if let Some(selector) = &policy.wait_for_selector {
            debug!("Waiting for selector {}", selector);
            self.client
                .wait()
                .at_most(policy.ready_timeout)
                .for_element(Locator::Css(selector.as_str()))
                .await
                .with_context(|| format!("Selector {} did not appear", selector))?;
        }

        if !policy.delay.is_zero() {
            debug!("Waiting {:?} for page content to settle", policy.delay);
            sleep(policy.delay).await;
        }
        Ok(())
    }

    async fn full_page_screenshot(&mut self) -> Result<Vec<u8>> {
        if self.expanded {
            self.resize_inner(self.width, self.height).await?;
            self.expanded = false;
            sleep(RESIZE_SETTLE).await;
        }

        let document_height = self.document_height().await?;
        let grow = document_height > self.height;

        if grow {
            debug!("Expanding viewport to full document height {}", document_height);
            self.resize_inner(self.width, document_height).await?;
            self.expanded = true;
            sleep(RESIZE_SETTLE).await;
        }

        let captured = timeout(SCREENSHOT_TIMEOUT, self.client.screenshot()).await;

        if grow {
            // The next capture retries the restore before measuring
            match self.resize_inner(self.width, self.height).await {
                Ok(()) => self.expanded = false,
                Err(e) => warn!("Failed to restore viewport to {}x{}: {:#}", self.width, self.height, e),
            }
        }

        let data = captured
            .context("Timed out capturing screenshot")?
            .context("Failed to capture screenshot")?;
        trace!("Screenshot captured successfully, {} bytes", data.len());
        Ok(data)
    }

    async fn close(self) -> Result<()> {
        self.client
            .close()
            .await
            .context("Failed to close WebDriver session")
    }
}
