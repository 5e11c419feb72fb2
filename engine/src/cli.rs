//! CLI interface for Wayfarer
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines the commands and global flags for running a recommendation session.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Wayfarer travel recommender
///
/// A conversational assistant that suggests destinations from your origin,
/// travel dates, activities and flight limits, and learns from your feedback.
#[derive(Parser, Debug)]
#[command(name = "wayfarer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the recorded engine events after each turn
    #[arg(long, global = true)]
    pub trace_events: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive session
    Chat,

    /// Answer a single request and exit
    Ask {
        /// Departure point as "City, Country"
        #[arg(long, value_name = "CITY, COUNTRY")]
        origin: String,

        /// The travel request
        query: String,
    },

    /// Check configuration, data sources and LLM providers
    Doctor,

    /// Write a configuration file and store the API key
    Setup,
}
