// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `sl play`: stream a recorded session and play it back headlessly

use anyhow::Context;
use clap::Args;
use sl_player::{
    ActionSink, ControllerConfig, HeadlessEngineFactory, ProgressSink, ReplayStreamController,
    ShellSink,
};
use sl_rest_client::{NetworkConfig, ReplayClient};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Args)]
pub struct PlayArgs {
    /// Session identifier to replay
    pub session_id: String,

    /// Replay service base URL; overrides the config file
    #[arg(long, env = "SL_SERVER")]
    pub server: Option<String>,

    /// Network configuration file (TOML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Monitored package the session belongs to; overrides the config file
    #[arg(long)]
    pub package: Option<String>,

    /// Backend server type discriminator; overrides the config file
    #[arg(long)]
    pub server_type: Option<String>,

    /// Jump close to this absolute epoch-milliseconds timestamp once the
    /// stream has caught up past it
    #[arg(long)]
    pub start_at_ms: Option<i64>,

    /// Pinpoint the action row recorded at this relative offset
    #[arg(long)]
    pub error_log_tm: Option<i64>,

    /// Do not follow the most recently completed action row
    #[arg(long)]
    pub no_auto_scroll: bool,
}

impl PlayArgs {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut network = NetworkConfig::default();
        if let Some(path) = &self.config {
            network = network.merged_with(NetworkConfig::from_file(path)?);
        }
        let network = network.merged_with(NetworkConfig {
            service_base_url: self.server.clone(),
            package_name: self.package.clone(),
            server_type: self.server_type.clone(),
        });

        let base_url = network
            .service_base_url
            .context("no replay service URL; pass --server or set service-base-url in the config file")?;
        let package_name = network
            .package_name
            .context("no package name; pass --package or set package-name in the config file")?;
        let server_type = network.server_type.unwrap_or_else(|| "java".to_string());

        let client = ReplayClient::from_url(&base_url)?;
        let sink = Arc::new(ConsoleSink::default());
        let controller = ReplayStreamController::new(
            client,
            Arc::new(HeadlessEngineFactory),
            sink.clone(),
            sink.clone(),
            sink.clone(),
            ControllerConfig {
                package_name,
                server_type,
                auto_scroll: !self.no_auto_scroll,
                error_log_tm: self.error_log_tm,
                ..ControllerConfig::default()
            },
        );

        controller.load(&self.session_id, self.start_at_ms).await?;

        let snapshot = controller.snapshot();
        println!(
            "session {} loaded, duration {:.1}s",
            self.session_id,
            snapshot.total_duration as f64 / 1000.0
        );

        controller.play();
        tokio::select! {
            _ = sink.finish_signal.notified() => {
                println!("playback finished");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
            }
        }

        controller.close();
        Ok(())
    }
}

/// Sink that narrates playback on stdout and signals completion
#[derive(Default)]
struct ConsoleSink {
    finish_signal: Notify,
    last_percent: AtomicI64,
}

impl ShellSink for ConsoleSink {
    fn ready(&self) {
        println!("replay engine ready");
    }

    fn error(&self, message: &str) {
        eprintln!("error: {}", message);
    }

    fn finished(&self) {
        self.finish_signal.notify_one();
    }

    fn not_ready(&self) {
        eprintln!("replay engine is not ready yet");
    }
}

impl ProgressSink for ConsoleSink {
    fn load_progress(&self, percent: u8) {
        tracing::debug!(percent, "loading");
    }

    fn playback_progress(&self, percent: f64, current_ms: i64) {
        // One line per whole percent, not one per poll tick
        let whole = percent as i64;
        if self.last_percent.swap(whole, Ordering::Relaxed) != whole {
            println!("{:>3}% {:.1}s", whole, current_ms as f64 / 1000.0);
        }
    }
}

impl ActionSink for ConsoleSink {
    fn mark_completed(&self, completed: &[bool], scroll_to: Option<usize>) {
        let done = completed.iter().filter(|c| **c).count();
        tracing::trace!(done, total = completed.len(), ?scroll_to, "action progress");
    }

    fn pinpoint(&self, row: Option<usize>) {
        if let Some(row) = row {
            println!("error pinpointed at action row {}", row);
        }
    }
}
