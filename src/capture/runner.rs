use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::capture::browser::{Browser, BrowsingContext};
use crate::capture::model::{CaptureFailure, CapturePair, PageTarget, RunSummary, ViewportSpec};
use crate::capture::settle::SettlePolicy;

/// Captures every page at every viewport, one pair at a time
pub struct CaptureRunner {
    output_dir: PathBuf,
    base_url: Url,
    viewports: Vec<ViewportSpec>,
    pages: Vec<PageTarget>,
    settle: SettlePolicy,
}

impl CaptureRunner {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        base_url: Url,
        viewports: Vec<ViewportSpec>,
        pages: Vec<PageTarget>,
        settle: SettlePolicy,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            base_url,
            viewports,
            pages,
            settle,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Creates the output directory if it is missing
    pub fn prepare_output_dir(&self) -> Result<()> {
        trace!("Ensuring screenshot directory exists: {}", self.output_dir.display());
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create directory: {}", self.output_dir.display()))
    }

    /// Runs all captures and closes `browser` afterwards.
    ///
    /// Failures of individual pairs are logged and collected in the summary.
    /// Only setting up the output directory or opening a browsing context
    /// aborts the run.
    pub async fn run<B: Browser>(&self, browser: B) -> Result<RunSummary> {
        self.prepare_output_dir()?;

        let result = self.capture_all(&browser).await;

        if let Err(e) = browser.close().await {
            warn!("Failed to close browser: {:#}", e);
        }

        let summary = result?;
        info!(
            "Capture run finished: {} captured, {} failed",
            summary.captured.len(),
            summary.failures.len()
        );
        Ok(summary)
    }

    async fn capture_all<B: Browser>(&self, browser: &B) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for viewport in &self.viewports {
            debug!("Opening context for {}", viewport);
            let mut context = browser.new_context(viewport).await?;

            for page in &self.pages {
                let pair = CapturePair::new(viewport, page);
                info!("Capturing {} on {}...", page.name, viewport.name);

                match self.capture_pair(&mut context, &pair).await {
                    Ok(path) => summary.captured.push(path),
                    Err(e) => {
                        let failure = CaptureFailure::new(&pair, &e);
                        error!("{}", failure);
                        summary.failures.push(failure);
                    }
                }
            }

            if let Err(e) = context.close().await {
                warn!("Failed to close context for {}: {:#}", viewport, e);
            }
        }

        Ok(summary)
    }

    async fn capture_pair<C: BrowsingContext>(&self, context: &mut C, pair: &CapturePair<'_>) -> Result<PathBuf> {
        let url = pair.page.resolve(&self.base_url)?;

        context.goto(&url).await?;
        context.settle(&self.settle).await?;
        let image = context.full_page_screenshot().await?;

        let path = pair.output_path(&self.output_dir);
        trace!("Writing {} bytes to {}", image.len(), path.display());
        fs::write(&path, &image)
            .with_context(|| format!("Failed to write screenshot to {}", path.display()))?;

        info!("Screenshot saved to {}", path.display());
        Ok(path)
    }
}
