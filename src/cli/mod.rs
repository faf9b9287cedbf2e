//! CLI module for lydtag.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Lydtag - AI-assisted audio catalog
///
/// Watches a directory for audio files, generates descriptive metadata with
/// a generative model, and answers natural-language searches over the
/// resulting catalog.
#[derive(Parser, Debug)]
#[command(name = "lydtag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the music directory and catalog new audio files
    Watch {
        /// Directory to watch (overrides the configured music_dir)
        #[arg(short, long)]
        dir: Option<String>,

        /// Skip the startup scan of files already in the directory
        #[arg(long)]
        skip_scan: bool,
    },

    /// Start the HTTP search API and playback server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Search the catalog with a free-text query
    Search {
        /// Search query
        query: String,
    },

    /// List cataloged audio files
    List,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
