// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatgate serve` command implementation.
//!
//! Wires the application root: definition seeding into the repository,
//! runner registry, query pool, plugin bridge, pipeline manager, and the
//! configured adapters. Shutdown is cooperative: SIGINT/SIGTERM cancel the
//! root token, adapters stop accepting inbound traffic, and in-flight
//! pipelines are left to finish.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chatgate_aibot::AibotAdapter;
use chatgate_config::AppConfig;
use chatgate_core::{Adapter, BotDefinition, EventKind, EventListener, GateError, MemoryRepository};
use chatgate_pipeline::{PipelineManager, QueryPool, RunnerRegistry};
use chatgate_plugin::PluginBridge;

use crate::runners::EchoRunner;

/// Runs the `chatgate serve` command until shutdown.
pub async fn run_serve(config: AppConfig) -> Result<(), GateError> {
    init_tracing(&config.app.log_level);

    info!(name = config.app.name.as_str(), "starting chatgate serve");

    // Seed the repository from the definitions file.
    let seeds = chatgate_config::load_definition_seeds(Path::new(&config.definitions.path))?;
    let bots = seeds.bots.clone();
    let repository = Arc::new(MemoryRepository::seeded(seeds.pipelines, seeds.bots));

    // Built-in runners; vendor runners are registered by their own crates.
    let mut runners = RunnerRegistry::new();
    runners.register(Arc::new(EchoRunner));
    let runners = Arc::new(runners);

    // The pool is shared between the manager and the plugin tool proxy.
    let pool = Arc::new(QueryPool::new());
    let bridge = Arc::new(PluginBridge::disconnected(pool.clone()));

    let manager = Arc::new(PipelineManager::new(
        repository,
        runners,
        bridge.clone(),
        pool,
    ));
    let loaded = manager.load_pipelines().await?;
    info!(loaded, "pipelines loaded");

    let cancel = install_signal_handler();

    if config.aibot.enabled {
        let adapter = AibotAdapter::new(config.aibot.clone(), config.server.clone())?;
        wire_bot_listeners(&adapter, &manager, &bots);
        adapter.run_until(cancel.clone()).await?;
    } else {
        warn!("no adapter enabled; serving until shutdown signal");
        cancel.cancelled().await;
    }

    info!("chatgate stopped");
    Ok(())
}

/// Binds the adapter's inbound events to the pipeline manager via the bot
/// record configured for it.
fn wire_bot_listeners(
    adapter: &Arc<AibotAdapter>,
    manager: &Arc<PipelineManager>,
    bots: &[BotDefinition],
) {
    let Some(bot) = bots
        .iter()
        .find(|b| b.enabled && b.adapter == adapter.name())
    else {
        warn!(adapter = adapter.name(), "no enabled bot bound to adapter");
        return;
    };

    for kind in [EventKind::Friend, EventKind::Group] {
        let manager = manager.clone();
        let bot = bot.clone();
        let adapter_dyn: Arc<dyn Adapter> = adapter.clone();
        let listener: EventListener = Arc::new(move |event| {
            let manager = manager.clone();
            let bot = bot.clone();
            let adapter = adapter_dyn.clone();
            Box::pin(async move {
                if let Err(e) = manager.dispatch(event, &bot, adapter) {
                    warn!(bot = bot.name.as_str(), error = %e, "dispatch failed");
                }
            })
        });
        adapter.register_listener(kind, listener);
    }
    info!(bot = bot.name.as_str(), adapter = adapter.name(), "bot listeners wired");
}

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a token cancelled when either signal arrives.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
    });

    token
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatgate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
