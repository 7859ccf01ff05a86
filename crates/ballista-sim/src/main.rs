//! # Ballista
//!
//! Headless projectile simulation: a turret fires at moving creatures while
//! a loopback client reports hits back to the authoritative server.
//!
//! Usage: `ballista [CONFIG] [--write-config]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod scenario;

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{SimConfig, CONFIG_FILE};

/// Main entry point.
fn main() -> Result<()> {
    let mut config_path = PathBuf::from(CONFIG_FILE);
    let mut write_config = false;
    for arg in std::env::args().skip(1) {
        if arg == "--write-config" {
            write_config = true;
        } else {
            config_path = PathBuf::from(arg);
        }
    }

    let mut config = SimConfig::load_from(&config_path);
    config.validate();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(config.log_directive.parse()?))
        .init();

    info!("Ballista simulation starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config_path.display());

    if write_config {
        config.save_to(&config_path)?;
    }

    let report = scenario::run(config)?;
    report.log();

    info!("Ballista simulation complete");
    Ok(())
}
