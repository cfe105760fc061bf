use anyhow::Result;
use clap::Parser;

use visual_capture::config::{CaptureConfig, CliArgs};
use visual_capture::utils::logger::init_logger;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let mut config = CaptureConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    init_logger(config.log_dir.as_deref())?;

    // Per-page failures are logged by the runner and do not affect the exit status
    visual_capture::run(&config).await?;

    Ok(())
}
