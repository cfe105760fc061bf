use anyhow::{anyhow, bail, Result};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use visual_capture::capture::{Browser, BrowsingContext, CaptureRunner, SettlePolicy};
use visual_capture::config::{default_pages, default_viewports};

/// What the fake browser saw, in order
#[derive(Debug, Default)]
struct Journal {
    events: Vec<String>,
    browser_closed: bool,
}

#[derive(Clone, Default)]
struct FakeBrowser {
    journal: Arc<Mutex<Journal>>,
    unreachable_paths: Vec<String>,
    broken_viewports: Vec<String>,
    image_tag: String,
}

impl FakeBrowser {
    fn new() -> Self {
        Self::default()
    }

    fn unreachable(mut self, path: &str) -> Self {
        self.unreachable_paths.push(path.to_string());
        self
    }

    fn cannot_open(mut self, viewport: &str) -> Self {
        self.broken_viewports.push(viewport.to_string());
        self
    }

    fn tagged(mut self, tag: &str) -> Self {
        self.image_tag = tag.to_string();
        self
    }

    fn record(&self, event: String) {
        self.journal.lock().unwrap().events.push(event);
    }

    fn events(&self) -> Vec<String> {
        self.journal.lock().unwrap().events.clone()
    }

    fn closed(&self) -> bool {
        self.journal.lock().unwrap().browser_closed
    }
}

struct FakeContext {
    browser: FakeBrowser,
    viewport: String,
    current: Option<Url>,
}

impl Browser for FakeBrowser {
    type Context = FakeContext;

    async fn new_context(&self, viewport: &visual_capture::capture::ViewportSpec) -> Result<FakeContext> {
        if self.broken_viewports.contains(&viewport.name) {
            bail!("browser crashed");
        }
        self.record(format!("open {}", viewport.name));
        Ok(FakeContext {
            browser: self.clone(),
            viewport: viewport.name.clone(),
            current: None,
        })
    }

    async fn close(self) -> Result<()> {
        self.journal.lock().unwrap().browser_closed = true;
        Ok(())
    }
}

impl BrowsingContext for FakeContext {
    async fn goto(&mut self, url: &Url) -> Result<()> {
        self.browser.record(format!("goto {} {}", self.viewport, url.path()));
        if self.browser.unreachable_paths.iter().any(|p| p == url.path()) {
            self.current = None;
            return Err(anyhow!("net::ERR_CONNECTION_REFUSED at {}", url));
        }
        self.current = Some(url.clone());
        Ok(())
    }

    async fn settle(&mut self, policy: &SettlePolicy) -> Result<()> {
        self.browser.record(format!("settle {} {:?}", self.viewport, policy.delay));
        Ok(())
    }

    async fn full_page_screenshot(&mut self) -> Result<Vec<u8>> {
        let url = self.current.as_ref().ok_or_else(|| anyhow!("no page loaded"))?;
        Ok(format!("PNG {} {} {}", self.viewport, url.path(), self.browser.image_tag).into_bytes())
    }

    async fn close(self) -> Result<()> {
        self.browser.record(format!("close {}", self.viewport));
        Ok(())
    }
}

/// Collects formatted log output for assertions
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir()
        .join(format!("visual_capture_{}", uuid::Uuid::new_v4()))
        .join("verification")
        .join("screenshots")
}

fn runner(output_dir: &Path) -> CaptureRunner {
    CaptureRunner::new(
        output_dir,
        Url::parse("http://localhost:3000").unwrap(),
        default_viewports(),
        default_pages(),
        SettlePolicy::fixed(Duration::ZERO),
    )
}

fn file_names(dir: &Path) -> HashSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

fn expected_names(pages: &[&str]) -> HashSet<String> {
    let mut names = HashSet::new();
    for page in pages {
        for viewport in ["desktop", "laptop", "tablet", "mobile"] {
            names.insert(format!("{}_{}.png", page, viewport));
        }
    }
    names
}

#[tokio::test]
async fn test_captures_every_pair() -> Result<()> {
    let dir = scratch_dir();
    let browser = FakeBrowser::new();

    let summary = runner(&dir).run(browser.clone()).await?;

    assert_eq!(summary.captured.len(), 8);
    assert!(summary.failures.is_empty());
    assert_eq!(file_names(&dir), expected_names(&["dashboard", "admin"]));
    assert!(browser.closed());

    let tablet_admin = fs::read_to_string(dir.join("admin_tablet.png"))?;
    assert_eq!(tablet_admin, "PNG tablet /admin ");
    Ok(())
}

#[tokio::test]
async fn test_viewports_then_pages_in_declared_order() -> Result<()> {
    let dir = scratch_dir();
    let browser = FakeBrowser::new();

    runner(&dir).run(browser.clone()).await?;

    let navigation: Vec<String> = browser
        .events()
        .into_iter()
        .filter(|e| !e.starts_with("settle"))
        .collect();

    let mut expected = Vec::new();
    for viewport in ["desktop", "laptop", "tablet", "mobile"] {
        expected.push(format!("open {}", viewport));
        expected.push(format!("goto {} /", viewport));
        expected.push(format!("goto {} /admin", viewport));
        expected.push(format!("close {}", viewport));
    }
    assert_eq!(navigation, expected);
    Ok(())
}

#[tokio::test]
async fn test_second_run_overwrites_same_files() -> Result<()> {
    let dir = scratch_dir();

    runner(&dir).run(FakeBrowser::new().tagged("first")).await?;
    runner(&dir).run(FakeBrowser::new().tagged("second")).await?;

    assert_eq!(file_names(&dir), expected_names(&["dashboard", "admin"]));
    let content = fs::read_to_string(dir.join("dashboard_mobile.png"))?;
    assert!(content.ends_with("second"));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_page_does_not_stop_other_pairs() -> Result<()> {
    let dir = scratch_dir();
    let browser = FakeBrowser::new().unreachable("/admin");

    let summary = runner(&dir).run(browser.clone()).await?;

    assert_eq!(file_names(&dir), expected_names(&["dashboard"]));
    assert_eq!(summary.captured.len(), 4);
    assert_eq!(summary.failures.len(), 4);
    assert_eq!(summary.attempted(), 8);

    for failure in &summary.failures {
        assert_eq!(failure.page, "admin");
        let message = failure.to_string();
        assert!(message.contains("admin"));
        assert!(message.contains(&failure.viewport));
        assert!(message.contains("ERR_CONNECTION_REFUSED"));
    }
    let failed_viewports: Vec<&str> = summary.failures.iter().map(|f| f.viewport.as_str()).collect();
    assert_eq!(failed_viewports, vec!["desktop", "laptop", "tablet", "mobile"]);
    assert!(browser.closed());
    Ok(())
}

#[tokio::test]
async fn test_creates_missing_directory_and_keeps_unrelated_files() -> Result<()> {
    let dir = scratch_dir();
    assert!(!dir.exists());

    runner(&dir).run(FakeBrowser::new()).await?;
    assert!(dir.is_dir());

    fs::write(dir.join("notes.txt"), "keep me")?;
    fs::write(dir.join("old_page_desktop.png"), "stale")?;

    runner(&dir).run(FakeBrowser::new()).await?;

    assert_eq!(fs::read_to_string(dir.join("notes.txt"))?, "keep me");
    assert_eq!(fs::read_to_string(dir.join("old_page_desktop.png"))?, "stale");
    assert_eq!(file_names(&dir).len(), 10);
    Ok(())
}

#[tokio::test]
async fn test_browser_failure_aborts_run() -> Result<()> {
    let dir = scratch_dir();
    let browser = FakeBrowser::new().cannot_open("tablet");

    let result = runner(&dir).run(browser.clone()).await;

    assert!(result.is_err());
    assert!(browser.closed());
    // viewports before the failing one were captured
    assert!(dir.join("admin_laptop.png").exists());
    assert!(!dir.join("admin_tablet.png").exists());
    Ok(())
}

#[tokio::test]
async fn test_unwritable_output_dir_is_fatal() -> Result<()> {
    let parent = std::env::temp_dir().join(format!("visual_capture_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&parent)?;
    let blocker = parent.join("screenshots");
    fs::write(&blocker, "not a directory")?;

    let result = runner(&blocker).run(FakeBrowser::new()).await;

    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_settle_policy_is_applied_per_pair() -> Result<()> {
    let dir = scratch_dir();
    let browser = FakeBrowser::new();
    let runner = CaptureRunner::new(
        &dir,
        Url::parse("http://localhost:3000")?,
        default_viewports(),
        default_pages(),
        SettlePolicy::fixed(Duration::from_millis(1)),
    );

    runner.run(browser.clone()).await?;

    let settles = browser.events().into_iter().filter(|e| e.starts_with("settle")).count();
    assert_eq!(settles, 8);
    Ok(())
}

#[tokio::test]
async fn test_failures_are_logged_with_page_and_viewport() -> Result<()> {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let dir = scratch_dir();
    runner(&dir).run(FakeBrowser::new().unreachable("/admin")).await?;

    let output = logs.contents();
    for viewport in ["desktop", "laptop", "tablet", "mobile"] {
        assert!(output.contains(&format!("Capturing dashboard on {}...", viewport)));
        assert!(output.contains(&format!("Capturing admin on {}...", viewport)));

        let failure = output
            .lines()
            .find(|line| line.contains(&format!("Failed to capture admin on {}:", viewport)))
            .unwrap_or_else(|| panic!("no failure logged for admin on {}:\n{}", viewport, output));
        assert!(failure.contains("ERROR"));
        assert!(failure.contains("ERR_CONNECTION_REFUSED"));
    }
    assert!(!output.contains("Failed to capture dashboard"));
    assert!(output.contains("4 captured, 4 failed"));
    Ok(())
}
