//! Capturing full-page screenshots of named pages at named viewport sizes.

pub mod browser;
pub mod client;
pub mod config;
pub mod driver;
pub mod model;
pub mod runner;
pub mod settle;

pub use browser::{Browser, BrowsingContext};
pub use client::WebDriverBrowser;
pub use model::{CaptureFailure, CapturePair, PageTarget, RunSummary, ViewportSpec};
pub use runner::CaptureRunner;
pub use settle::SettlePolicy;
