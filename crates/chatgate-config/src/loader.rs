// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./chatgate.toml` > `~/.config/chatgate/chatgate.toml`
//! > `/etc/chatgate/chatgate.toml`, with environment variable overrides via
//! the `CHATGATE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use chatgate_core::{GateError, PipelineDefinition};

use crate::model::AppConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chatgate/chatgate.toml` (system-wide)
/// 3. `~/.config/chatgate/chatgate.toml` (user XDG config)
/// 4. `./chatgate.toml` (local directory)
/// 5. `CHATGATE_*` environment variables
pub fn load_config() -> Result<AppConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file("/etc/chatgate/chatgate.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chatgate/chatgate.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chatgate.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from inline TOML only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<AppConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AppConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CHATGATE_AIBOT_AES_KEY` must map to
/// `aibot.aes_key`, not `aibot.aes.key`.
fn env_provider() -> Env {
    Env::prefixed("CHATGATE_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("app_", "app.", 1)
            .replacen("server_", "server.", 1)
            .replacen("aibot_", "aibot.", 1)
            .replacen("definitions_", "definitions.", 1);
        mapped.into()
    })
}

/// On-disk shape of the definitions seed file: `[[pipelines]]` entries plus
/// optional `[[bots]]` bindings.
#[derive(Debug, Default, serde::Deserialize)]
pub struct DefinitionSeeds {
    #[serde(default)]
    pub pipelines: Vec<PipelineDefinition>,
    #[serde(default)]
    pub bots: Vec<chatgate_core::BotDefinition>,
}

/// Loads pipeline/bot definitions from the seed TOML file.
///
/// A missing file is not an error: the process starts with no pipelines and
/// an operator can reload after creating one.
pub fn load_definition_seeds(path: &Path) -> Result<DefinitionSeeds, GateError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "definitions seed file missing, starting empty");
        return Ok(DefinitionSeeds::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|e| {
        GateError::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    toml::from_str(&raw)
        .map_err(|e| GateError::Config(format!("invalid seed file {}: {e}", path.display())))
}
