use anyhow::{Context, Result};
use sanitize_filename::sanitize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// A named browser viewport size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSpec {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl ViewportSpec {
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
        }
    }
}

impl fmt::Display for ViewportSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}x{})", self.name, self.width, self.height)
    }
}

/// A named page of the application under verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTarget {
    pub name: String,
    /// Absolute URL, or a path resolved against the configured base URL
    pub url: String,
}

impl PageTarget {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    /// Resolves the target against `base`. Absolute URLs are returned as is.
    pub fn resolve(&self, base: &Url) -> Result<Url> {
        match Url::parse(&self.url) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => base
                .join(&self.url)
                .with_context(|| format!("Invalid URL for page '{}': {}", self.name, self.url)),
            Err(e) => Err(e).with_context(|| format!("Invalid URL for page '{}': {}", self.name, self.url)),
        }
    }
}

/// One (viewport, page) combination to capture
#[derive(Debug, Clone, Copy)]
pub struct CapturePair<'a> {
    pub viewport: &'a ViewportSpec,
    pub page: &'a PageTarget,
}

impl<'a> CapturePair<'a> {
    pub fn new(viewport: &'a ViewportSpec, page: &'a PageTarget) -> Self {
        Self { viewport, page }
    }

    /// `{page}_{viewport}.png`
    pub fn file_name(&self) -> String {
        format!("{}_{}.png", sanitize(&self.page.name), sanitize(&self.viewport.name))
    }

    pub fn output_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.file_name())
    }
}

/// A pair that could not be captured, with the rendered error chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFailure {
    pub page: String,
    pub viewport: String,
    pub error: String,
}

impl CaptureFailure {
    pub fn new(pair: &CapturePair<'_>, error: &anyhow::Error) -> Self {
        Self {
            page: pair.page.name.clone(),
            viewport: pair.viewport.name.clone(),
            error: format!("{:#}", error),
        }
    }
}

impl fmt::Display for CaptureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to capture {} on {}: {}", self.page, self.viewport, self.error)
    }
}

/// Tally of a completed run
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub captured: Vec<PathBuf>,
    pub failures: Vec<CaptureFailure>,
}

impl RunSummary {
    pub fn attempted(&self) -> usize {
        self.captured.len() + self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_is_page_then_viewport() {
        let viewport = ViewportSpec::new("tablet", 768, 1024);
        let page = PageTarget::new("admin", "/admin");
        let pair = CapturePair::new(&viewport, &page);

        assert_eq!(
            pair.output_path(Path::new("verification/screenshots")),
            PathBuf::from("verification/screenshots/admin_tablet.png")
        );
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = Url::parse("http://localhost:3000").unwrap();

        let admin = PageTarget::new("admin", "/admin");
        assert_eq!(admin.resolve(&base).unwrap().as_str(), "http://localhost:3000/admin");

        let dashboard = PageTarget::new("dashboard", "/");
        assert_eq!(dashboard.resolve(&base).unwrap().as_str(), "http://localhost:3000/");

        let external = PageTarget::new("ext", "https://example.com/status");
        assert_eq!(external.resolve(&base).unwrap().as_str(), "https://example.com/status");
    }

    #[test]
    fn test_failure_message_names_page_and_viewport() {
        let viewport = ViewportSpec::new("mobile", 375, 667);
        let page = PageTarget::new("admin", "/admin");
        let pair = CapturePair::new(&viewport, &page);
        let err = anyhow::anyhow!("connection refused").context("Failed to navigate");

        let failure = CaptureFailure::new(&pair, &err);
        let message = failure.to_string();

        assert!(message.contains("admin"));
        assert!(message.contains("mobile"));
        assert!(message.contains("connection refused"));
    }
}
