use anyhow::{bail, Context, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::capture::config::{DRIVER_POLL_INTERVAL, STATUS_PROBE_TIMEOUT};

/// A WebDriver server process started by us
#[derive(Debug)]
pub struct DriverProcess {
    binary: String,
    child: Child,
}

impl DriverProcess {
    /// Kills the driver and waits for it to exit
    pub async fn shutdown(mut self) -> Result<()> {
        debug!("Stopping {} (pid {:?})", self.binary, self.child.id());
        self.child
            .kill()
            .await
            .with_context(|| format!("Failed to stop {}", self.binary))
    }
}

/// `{webdriver_url}/status`, keeping any path prefix such as `/wd/hub`
pub fn status_url(webdriver_url: &Url) -> String {
    format!("{}/status", webdriver_url.as_str().trim_end_matches('/'))
}

/// Returns true when the WebDriver endpoint answers `/status` and does not
/// report itself as not ready
pub async fn is_ready(webdriver_url: &Url) -> bool {
    let client = match reqwest::Client::builder().timeout(STATUS_PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to build HTTP client for WebDriver probe: {}", e);
            return false;
        }
    };

    let url = status_url(webdriver_url);
    trace!("Probing WebDriver status at {}", url);
    let response = match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            trace!("WebDriver status returned {}", response.status());
            return false;
        }
        Err(e) => {
            trace!("WebDriver status probe failed: {}", e);
            return false;
        }
    };

    match response.json::<serde_json::Value>().await {
        Ok(body) => body
            .pointer("/value/ready")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true),
        Err(_) => true,
    }
}

/// Makes sure a WebDriver endpoint is serving at `webdriver_url`.
///
/// An endpoint that is already up is reused. Otherwise `binary` is spawned on
/// the URL's port when `launch` is set, and polled until it reports ready.
pub async fn ensure_driver(
    webdriver_url: &Url,
    launch: bool,
    binary: &str,
    startup_timeout: Duration,
) -> Result<Option<DriverProcess>> {
    if is_ready(webdriver_url).await {
        info!("Using running WebDriver at {}", webdriver_url);
        return Ok(None);
    }

    if !launch {
        bail!("No WebDriver reachable at {} and launching is disabled", webdriver_url);
    }

    let port = webdriver_url
        .port_or_known_default()
        .with_context(|| format!("WebDriver URL has no port: {}", webdriver_url))?;

    info!("Launching {} on port {}", binary, port);
    let child = Command::new(binary)
        .arg(format!("--port={}", port))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to launch {}", binary))?;

    let mut process = DriverProcess {
        binary: binary.to_string(),
        child,
    };

    let deadline = Instant::now() + startup_timeout;
    loop {
        if is_ready(webdriver_url).await {
            info!("{} is ready at {}", binary, webdriver_url);
            return Ok(Some(process));
        }

        if let Some(status) = process.child.try_wait()? {
            bail!("{} exited during startup with {}", binary, status);
        }

        if Instant::now() >= deadline {
            // kill_on_drop reaps the child
            bail!("{} did not become ready within {:?}", binary, startup_timeout);
        }

        sleep(DRIVER_POLL_INTERVAL).await;
    }
}
