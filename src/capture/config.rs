use std::time::Duration;

use crate::capture::model::ViewportSpec;

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";
pub const DEFAULT_DRIVER_BINARY: &str = "chromedriver";
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_DRIVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DRIVER_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Timeout of a single `/status` probe
pub const STATUS_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(60);
/// Pause after resizing the window before measuring or capturing again
pub const RESIZE_SETTLE: Duration = Duration::from_millis(250);

// Chrome browser arguments
pub fn chrome_arguments(headless: bool, viewport: &ViewportSpec) -> Vec<String> {
    let window_size = format!("--window-size={},{}", viewport.width, viewport.height);
    vec![
        "--no-sandbox",
        "--disable-gpu",
        "--disable-dev-shm-usage",
        "--disable-extensions",
        "--disable-notifications",
        "--disable-infobars",
        "--disable-popup-blocking",
        "--disable-background-networking",
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-renderer-backgrounding",
        "--disable-features=TranslateUI",
        "--force-color-profile=srgb",
        "--force-device-scale-factor=1",
        "--hide-scrollbars",
        "--mute-audio",
        window_size.as_str(),
        if headless { "--headless=new" } else { "" }
    ].into_iter()
    .filter(|s| !s.is_empty())
    .map(String::from)
    .collect()
}

// Chrome content settings preferences
pub fn chrome_preferences() -> serde_json::Map<String, serde_json::Value> {
    let mut prefs = serde_json::Map::new();
    prefs.insert("profile.default_content_setting_values.images".to_string(), 1.into()); // 1 = allow
    prefs.insert("profile.managed_default_content_settings.javascript".to_string(), 1.into()); // 1 = allow
    prefs.insert("profile.managed_default_content_settings.notifications".to_string(), 2.into()); // 2 = block
    prefs.insert("profile.managed_default_content_settings.geolocation".to_string(), 2.into()); // 2 = block
    prefs.insert("profile.managed_default_content_settings.media_stream".to_string(), 2.into()); // 2 = block
    prefs
}
