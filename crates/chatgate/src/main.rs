// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! chatgate - a multi-tenant chat-platform gateway.
//!
//! This is the binary entry point for the gateway process.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};

mod runners;
mod serve;

/// chatgate - a multi-tenant chat-platform gateway.
#[derive(Parser, Debug)]
#[command(name = "chatgate", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway server.
    Serve,
    /// Print the merged configuration and exit.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match chatgate_config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("chatgate: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Err(errors) = chatgate_config::validate(&config) {
        for error in &errors {
            eprintln!("chatgate: config error: {error}");
        }
        std::process::exit(1);
    }

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("chatgate: serve failed: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => {
            match toml::to_string_pretty(&config) {
                Ok(rendered) => println!("{rendered}"),
                Err(e) => {
                    eprintln!("chatgate: cannot render config: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("chatgate: use --help for available commands");
        }
    }
}
