use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global tracing subscriber.
///
/// Logs go to the console, filtered by `RUST_LOG` (default `info`). With a
/// `log_dir`, a timestamped log file is written there too; its path is returned.
pub fn init_logger(log_dir: Option<&str>) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer().with_target(false);

    let (file_layer, log_file) = match log_dir {
        Some(dir) => {
            let path = log_file_path(Path::new(dir));
            fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory: {}", dir))?;
            let file = fs::File::create(&path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;

            let layer = fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to install logger")?;

    if let Some(path) = &log_file {
        info!("Logging to {}", path.display());
    }
    Ok(log_file)
}

fn log_file_path(dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("visual_capture_{}.log", timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_is_timestamped() {
        let path = log_file_path(Path::new("logs"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();

        assert!(path.starts_with("logs"));
        assert!(name.starts_with("visual_capture_"));
        assert!(name.ends_with(".log"));
        // visual_capture_YYYYmmdd_HHMMSS.log
        assert_eq!(name.len(), "visual_capture_".len() + 15 + ".log".len());
    }
}
