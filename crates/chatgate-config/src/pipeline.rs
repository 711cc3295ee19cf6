// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed view of a pipeline definition's nested config map.
//!
//! Repository definitions carry config as an untyped JSON map; a
//! [`PipelineConfig`] snapshot is parsed once per pipeline load and shared
//! immutably with every stage, so stages never re-read or re-validate keys
//! mid-query.

use serde::{Deserialize, Serialize};

use chatgate_core::GateError;

/// Parsed `trigger.*`, `safety.*`, `ai.*`, `output.*` sections.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Parses the untyped config blob stored on a pipeline definition.
    ///
    /// A null/absent blob yields the all-defaults config.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, GateError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
            .map_err(|e| GateError::Config(format!("invalid pipeline config: {e}")))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TriggerConfig {
    #[serde(default)]
    pub access_control: AccessControlConfig,
    #[serde(default)]
    pub group_respond_rules: GroupRespondRulesConfig,
    #[serde(default)]
    pub ignore_rules: IgnoreRulesConfig,
}

/// Whitelist/blacklist admission over launcher keys.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AccessControlConfig {
    #[serde(default)]
    pub mode: AccessMode,
    /// Patterns of the form `{person|group|*}_{id|*}`.
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            mode: AccessMode::Blacklist,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    Whitelist,
    #[default]
    Blacklist,
}

/// Rules deciding whether a group message addresses the bot.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GroupRespondRulesConfig {
    /// Respond when the bot is at-mentioned.
    #[serde(default = "default_true")]
    pub at: bool,
    /// Respond when the text starts with one of these prefixes (stripped).
    #[serde(default)]
    pub prefix: Vec<String>,
    /// Respond with this probability regardless of content.
    #[serde(default)]
    pub random: f64,
    /// Respond when the text matches one of these regexes.
    #[serde(default)]
    pub regexp: Vec<String>,
}

impl Default for GroupRespondRulesConfig {
    fn default() -> Self {
        Self {
            at: true,
            prefix: Vec::new(),
            random: 0.0,
            regexp: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Inbound text silently dropped before the pipeline runs the model.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct IgnoreRulesConfig {
    #[serde(default)]
    pub prefix: Vec<String>,
    #[serde(default)]
    pub regexp: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SafetyConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub content_filter: ContentFilterConfig,
}

/// Fixed-window rate limiting over launcher keys.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Admission algorithm; `fixwin` is the only built-in.
    #[serde(default = "default_algo")]
    pub algo: String,
    /// Window length in seconds.
    #[serde(default = "default_window_length")]
    pub window_length: u64,
    /// Admissions allowed per window.
    #[serde(default = "default_limitation")]
    pub limitation: u32,
    #[serde(default)]
    pub strategy: RateLimitStrategy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            algo: default_algo(),
            window_length: default_window_length(),
            limitation: default_limitation(),
            strategy: RateLimitStrategy::Drop,
        }
    }
}

fn default_algo() -> String {
    "fixwin".to_string()
}

fn default_window_length() -> u64 {
    60
}

fn default_limitation() -> u32 {
    60
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitStrategy {
    #[default]
    Drop,
    Wait,
}

/// Ban-word screening applied to user text and model output.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ContentFilterConfig {
    /// Regex patterns the ban-word filter screens for.
    #[serde(default)]
    pub ban_words: Vec<String>,
    /// What a ban-word hit does: mask the span or block the message.
    #[serde(default)]
    pub action: FilterAction,
    /// Replacement character for masked spans.
    #[serde(default = "default_mask")]
    pub mask: String,
    /// Notice sent when a filter blocks outright.
    #[serde(default = "default_block_notice")]
    pub block_notice: String,
}

impl Default for ContentFilterConfig {
    fn default() -> Self {
        Self {
            ban_words: Vec::new(),
            action: FilterAction::Mask,
            mask: default_mask(),
            block_notice: default_block_notice(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterAction {
    #[default]
    Mask,
    Block,
}

fn default_mask() -> String {
    "*".to_string()
}

fn default_block_notice() -> String {
    "Your message was blocked by the content filter.".to_string()
}

// No deny_unknown_fields here: runner-specific keys flatten into `extra`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AiConfig {
    /// Name of the runner producing replies for this pipeline.
    #[serde(default = "default_runner")]
    pub runner: String,
    /// Wall-clock budget for one runner invocation, in seconds.
    #[serde(default = "default_runner_timeout")]
    pub timeout_secs: u64,
    /// Runner-specific settings, passed through untyped.
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            runner: default_runner(),
            timeout_secs: default_runner_timeout(),
            extra: serde_json::Map::new(),
        }
    }
}

fn default_runner() -> String {
    "local-agent".to_string()
}

fn default_runner_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub misc: OutputMiscConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutputMiscConfig {
    /// Strip a leading `<think>…</think>` block from runner text.
    #[serde(default)]
    pub remove_think: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_blob_yields_defaults() {
        let config = PipelineConfig::from_value(&serde_json::Value::Null).unwrap();
        assert_eq!(config.safety.rate_limit.algo, "fixwin");
        assert_eq!(config.trigger.access_control.mode, AccessMode::Blacklist);
        assert!(config.trigger.group_respond_rules.at);
    }

    #[test]
    fn kebab_case_keys_parse() {
        let blob = serde_json::json!({
            "trigger": {
                "access-control": {"mode": "whitelist", "whitelist": ["person_*"]},
                "group-respond-rules": {"at": true, "prefix": ["!ask"], "random": 0.05},
                "ignore-rules": {"prefix": ["/"]},
            },
            "safety": {
                "rate-limit": {"algo": "fixwin", "window-length": 10, "limitation": 1, "strategy": "drop"},
                "content-filter": {"ban-words": ["(?i)banned"]},
            },
            "ai": {"runner": "dify-chat", "timeout-secs": 30, "api-key": "k"},
            "output": {"misc": {"remove-think": true}},
        });
        let config = PipelineConfig::from_value(&blob).unwrap();
        assert_eq!(config.trigger.access_control.mode, AccessMode::Whitelist);
        assert_eq!(config.trigger.group_respond_rules.prefix, vec!["!ask"]);
        assert_eq!(config.safety.rate_limit.window_length, 10);
        assert_eq!(config.safety.rate_limit.limitation, 1);
        assert_eq!(config.ai.runner, "dify-chat");
        assert_eq!(config.ai.extra.get("api-key").unwrap(), "k");
        assert!(config.output.misc.remove_think);
    }

    #[test]
    fn bad_blob_is_config_error() {
        let blob = serde_json::json!({"safety": {"rate-limit": {"strategy": "explode"}}});
        let err = PipelineConfig::from_value(&blob).unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }
}
