//! el4000log - EL3500/EL4000 power-meter log exporter
//!
//! Reads every .BIN file the logger wrote into a directory, writes one CSV
//! sorted by time and optionally charts real power over time.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use el4000log::chart;
use el4000log::cli::Cli;
use el4000log::export;

fn run(cli: &Cli) -> anyhow::Result<()> {
    let settings = cli.settings().context("Failed to load settings")?;

    if cli.save_config {
        let path = cli
            .settings_path()
            .context("Could not determine config directory, pass --config")?;
        settings.save_to(&path)?;
        tracing::info!("Saved settings to {}", path.display());
        return Ok(());
    }

    let options = cli.export_options(&settings);

    let summary = export::export_all(&options)
        .with_context(|| format!("Export of {} failed", options.source_dir.display()))?;
    if summary.files_skipped > 0 {
        tracing::warn!("{} files skipped", summary.files_skipped);
    }

    if !settings.plot {
        return Ok(());
    }

    let chart_path = cli.chart_path(&settings, &summary.output);
    let chart_path = chart::plot_watt_over_time(&summary.output, &chart_path)
        .context("Charting the export failed")?;

    if cli.open {
        open::that(&chart_path)
            .with_context(|| format!("Failed to open {}", chart_path.display()))?;
    }

    Ok(())
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        tracing::error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}
