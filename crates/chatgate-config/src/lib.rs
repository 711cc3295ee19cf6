// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the chatgate gateway.
//!
//! Two layers: the process-level [`AppConfig`] loaded from TOML + env vars,
//! and the per-pipeline [`PipelineConfig`] parsed from repository definition
//! blobs into an immutable snapshot shared with every stage.

pub mod loader;
pub mod model;
pub mod pipeline;

pub use loader::{
    DefinitionSeeds, load_config, load_config_from_path, load_config_from_str,
    load_definition_seeds,
};
pub use model::{AibotConfig, AppConfig, DefinitionsConfig, ProcessConfig, ServerConfig, validate};
pub use pipeline::{
    AccessControlConfig, AccessMode, AiConfig, ContentFilterConfig, FilterAction,
    GroupRespondRulesConfig, IgnoreRulesConfig, OutputConfig, OutputMiscConfig, PipelineConfig,
    RateLimitConfig, RateLimitStrategy, SafetyConfig, TriggerConfig,
};
