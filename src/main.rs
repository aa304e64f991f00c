//! Thicket - a plugin-driven static site generator.
//!
//! The binary runs with the built-in plugins only: every file is copied
//! through unchanged. Sites with their own plugins, views and generators
//! call [`build_site`] and [`preview_site`] from their own binary.

use anyhow::Result;
use clap::Parser;
use thicket::{
    build::build_site,
    cli::{Cli, Commands},
    config::SiteConfig,
    environment::Environment,
    log,
    preview::preview_site,
};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        log!("error"; "{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Build { .. } => {
            let config = SiteConfig::load(cli)?;
            build_site(&Environment::new(config))
        }
        Commands::Preview { .. } => preview_site(cli, &|_| {}),
    }
}
