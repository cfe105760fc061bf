//! The seam between the capture runner and a browser engine.
//!
//! The runner only needs to open a context per viewport and, inside it,
//! navigate, settle and capture. [`crate::capture::client`] implements this
//! over WebDriver.
#![allow(async_fn_in_trait)]

use anyhow::Result;
use url::Url;

use crate::capture::model::ViewportSpec;
use crate::capture::settle::SettlePolicy;

/// A launched browser engine
pub trait Browser {
    type Context: BrowsingContext;

    /// Opens an isolated context whose viewport is exactly `viewport`
    async fn new_context(&self, viewport: &ViewportSpec) -> Result<Self::Context>;

    /// Shuts the engine down
    async fn close(self) -> Result<()>;
}

/// An isolated session (own cookies and storage) with a single page
pub trait BrowsingContext {
    async fn goto(&mut self, url: &Url) -> Result<()>;

    async fn settle(&mut self, policy: &SettlePolicy) -> Result<()>;

    /// PNG of the whole document, not just the visible viewport
    async fn full_page_screenshot(&mut self) -> Result<Vec<u8>>;

    async fn close(self) -> Result<()>;
}
