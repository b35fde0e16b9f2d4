use std::path::PathBuf;

mod backend_bridge;
mod controller;
mod ui;

use anyhow::{anyhow, Context};
use clap::Parser;
use client_core::{load_settings, Backend, Settings};
use crossbeam_channel::bounded;
use eframe::egui;
use tracing_subscriber::EnvFilter;

use crate::backend_bridge::{commands::BackendCommand, runtime::spawn_backend_thread};
use crate::controller::events::UiEvent;
use crate::ui::SigcheckApp;

#[derive(Debug, Parser)]
#[command(name = "sigcheck", about = "Two-lane signature verification workbench")]
struct Args {
    /// Settings file; defaults to ./sigcheck.toml, then the user config dir.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Base URL of the image-processing service.
    #[arg(long)]
    stage_url: Option<String>,
    /// Base URL of the signature library API.
    #[arg(long)]
    library_url: Option<String>,
}

fn resolve_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = &args.stage_url {
        settings.stage_url = url.clone();
    }
    if let Some(url) = &args.library_url {
        settings.library_url = url.clone();
    }
    settings.validate().context("invalid command-line override")?;
    Ok(settings)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings = resolve_settings(&args)?;
    let workbench = Backend::workbench(&settings);

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(1024);
    spawn_backend_thread(settings, cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Signature Check")
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([900.0, 600.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Signature Check",
        options,
        Box::new(move |_cc| Ok(Box::new(SigcheckApp::new(cmd_tx, ui_rx, workbench)))),
    )
    .map_err(|err| anyhow!("desktop shell failed: {err}"))
}
