//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// thicket static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Content directory path (relative to project root)
    #[arg(short, long)]
    pub contents: Option<PathBuf>,

    /// Config file name (default: thicket.toml)
    #[arg(short = 'C', long, default_value = "thicket.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Resolve the content tree and render every leaf into the output directory
    Build {
        /// Output directory path (relative to project root)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Remove the output directory before building
        #[arg(long)]
        clean: bool,
    },

    /// Serve the site from memory, re-resolving content as files change
    Preview {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port you should provide
        #[arg(short, long)]
        port: Option<u16>,
    },
}

impl Cli {
    pub const fn is_preview(&self) -> bool {
        matches!(self.command, Commands::Preview { .. })
    }
}
