// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::Result;
use sl_cli::{Cli, Commands, Parser};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.logging.init("sl")?;

    match cli.command {
        Commands::Play(args) => args.run().await,
    }
}
