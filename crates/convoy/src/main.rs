// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Convoy - multi-tenant WhatsApp messaging bridge.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod http;
mod serve;
mod shutdown;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use convoy_config::model::ConvoyConfig;
use convoy_engine::window;

/// Convoy - multi-tenant WhatsApp messaging bridge.
#[derive(Parser, Debug)]
#[command(name = "convoy", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook listener, delivery engine and retry scheduler.
    Serve,
    /// Load and validate the configuration, then print a summary.
    CheckConfig,
    /// Evaluate the session window for a last-inbound timestamp.
    Window {
        /// RFC 3339 timestamp of the last inbound message; omit for none.
        #[arg(long)]
        last_inbound: Option<DateTime<Utc>>,
        /// Evaluate at this instant instead of now.
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let config = load_config(cli.config.as_ref());
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            let config = load_config(cli.config.as_ref());
            println!("{}", config_summary(&config));
        }
        Some(Commands::Window { last_inbound, at }) => {
            println!("{}", window_report(last_inbound, at.unwrap_or_else(Utc::now)));
        }
        None => {
            println!("convoy: use --help for available commands");
        }
    }
}

/// Loads and validates configuration, rendering diagnostics and exiting on failure.
fn load_config(path: Option<&PathBuf>) -> ConvoyConfig {
    let result = match path {
        Some(path) => convoy_config::load_and_validate_path(path),
        None => convoy_config::load_and_validate(),
    };
    match result {
        Ok(config) => config,
        Err(errors) => {
            convoy_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

fn config_summary(config: &ConvoyConfig) -> String {
    let active = config.teams.iter().filter(|t| t.active).count();
    format!(
        "config ok: service={} teams={} (active {}) retry_budget={} backoff={}..{}ms scheduler={} listen={}:{}",
        config.service.name,
        config.teams.len(),
        active,
        config.delivery.retry_budget,
        config.delivery.backoff_base_ms,
        config.delivery.backoff_max_ms,
        if config.scheduler.enabled { "on" } else { "off" },
        config.whatsapp.bind_address,
        config.whatsapp.port,
    )
}

fn window_report(last_inbound: Option<DateTime<Utc>>, at: DateTime<Utc>) -> String {
    let status = window::evaluate(last_inbound, at);
    let free_form = if status.is_open() { "allowed" } else { "templates only" };
    format!("window: {status}; free-form: {free_form}")
}
