// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application configuration model.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level chatgate configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub app: ProcessConfig,

    /// Webhook HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Enterprise-IM AI-bot adapter settings.
    #[serde(default)]
    pub aibot: AibotConfig,

    /// Pipeline/bot definition seeding.
    #[serde(default)]
    pub definitions: DefinitionsConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    /// Display name used in logs.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_app_name() -> String {
    "chatgate".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Webhook HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    2280
}

/// Enterprise-IM AI-bot adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AibotConfig {
    /// Whether the adapter is wired at startup.
    #[serde(default)]
    pub enabled: bool,

    /// Callback verification token.
    #[serde(default)]
    pub token: String,

    /// 43-character base64 callback AES key.
    #[serde(default)]
    pub aes_key: String,

    /// Bot/corp identity checked against the envelope trailer.
    #[serde(default)]
    pub receive_id: String,

    /// Display name the platform inserts for textual at-mentions.
    #[serde(default)]
    pub bot_name: String,

    /// How long one poll waits for a chunk before answering empty.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Idle stream-session lifetime before the sweep removes it.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Bound of each stream session's chunk queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AibotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: String::new(),
            aes_key: String::new(),
            receive_id: String::new(),
            bot_name: String::new(),
            poll_timeout_ms: default_poll_timeout_ms(),
            session_ttl_secs: default_session_ttl_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_poll_timeout_ms() -> u64 {
    500
}

fn default_session_ttl_secs() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    32
}

/// Pipeline/bot definition seed file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionsConfig {
    /// Path to the TOML file seeding pipeline and bot definitions.
    #[serde(default = "default_definitions_path")]
    pub path: String,
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self {
            path: default_definitions_path(),
        }
    }
}

fn default_definitions_path() -> String {
    "pipelines.toml".to_string()
}

/// Validates cross-field constraints the type system cannot express.
///
/// Returns all problems at once so the operator fixes them in one pass.
pub fn validate(config: &AppConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.aibot.enabled {
        if config.aibot.token.is_empty() {
            errors.push("aibot.token must be set when aibot.enabled = true".to_string());
        }
        if config.aibot.aes_key.len() != 43 {
            errors.push(format!(
                "aibot.aes_key must be 43 base64 characters, got {}",
                config.aibot.aes_key.len()
            ));
        }
        if config.aibot.poll_timeout_ms == 0 {
            errors.push("aibot.poll_timeout_ms must be positive".to_string());
        }
        if config.aibot.session_ttl_secs == 0 {
            errors.push("aibot.session_ttl_secs must be positive".to_string());
        }
    }
    if config.server.port == 0 {
        errors.push("server.port must be positive".to_string());
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
