// License: MIT

use std::path::Path;

use anyhow::{Context, Result};

/// Initialize eventline once, before any window machinery runs.
/// The interactive binary wants console output; file output is opt-in.
pub fn init(log_path: Option<&Path>, verbose: bool) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime for eventline init")?;

    rt.block_on(async {
        eventline::runtime::init().await;
    });

    eventline::runtime::enable_console_output(true);
    eventline::runtime::enable_console_color(true);
    eventline::runtime::enable_console_timestamp(false);
    eventline::runtime::enable_console_duration(true);

    if let Some(path) = log_path {
        eventline::runtime::enable_file_output(path)
            .with_context(|| format!("enable eventline file output: {}", path.display()))?;
    }

    eventline::runtime::set_log_level(if verbose {
        eventline::runtime::LogLevel::Debug
    } else {
        eventline::runtime::LogLevel::Info
    });

    Ok(())
}
