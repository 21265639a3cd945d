// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! SessionLens command-line interface

pub mod play;

pub use clap::Parser;

use clap::Subcommand;
use sl_logging::CliLoggingArgs;

/// SessionLens: stream and replay recorded browser sessions
#[derive(Debug, Parser)]
#[command(name = "sl", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub logging: CliLoggingArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Stream a recorded session and play it back headlessly
    Play(play::PlayArgs),
}
