// src/main.rs

//! Entry point: runs one display session against the configured card.

use anyhow::Context;
use drm_scribble::config::CONFIG;
use drm_scribble::run_display_session;
use log::info;

fn main() -> anyhow::Result<()> {
    // Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    info!("Starting drm-scribble...");
    let config = &*CONFIG;
    info!("Using device {}", config.device.path.display());

    let report = run_display_session(config).with_context(|| {
        format!(
            "Display session on {} failed",
            config.device.path.display()
        )
    })?;

    info!(
        "Session finished: {} output(s), {} skipped, {} failed, {} steps, {} pixels ({} clipped)",
        report.outputs.len(),
        report.skipped_connectors.len(),
        report.failed_connectors.len(),
        report.animation.iterations,
        report.animation.pixels_written,
        report.animation.pixels_clipped
    );
    Ok(())
}
