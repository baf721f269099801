// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! docsort web dashboard
//!
//! Standalone server for analyzing, reviewing and filing documents from a browser.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use docsort::classifier::Classifier;
use docsort::config::AppConfig;
use docsort::session::Session;
use docsort::Result;

#[derive(Parser, Debug)]
#[command(name = "docsort-web")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "docsort web dashboard server")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Open browser automatically
    #[arg(long)]
    open: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("docsort web dashboard v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(&args.config)?;
    if let Some(host) = args.host {
        config.web.host = host;
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }
    config.validate()?;

    let classifier = Classifier::from_config(&config.classifier, config.categories.clone())?;
    info!("Classifier: {} over {} categories", classifier.model_name(), config.categories.len());
    let session = Session::open(config, classifier)?;

    if args.open {
        let web = &session.config().web;
        let url = format!("http://{}:{}", web.host, web.port);
        if let Err(e) = open_browser(&url) {
            error!("Failed to open browser: {}", e);
        }
    }

    docsort::web::start_server(session).await
}

fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd").args(["/c", "start", url]).spawn()?;
    }
    Ok(())
}
