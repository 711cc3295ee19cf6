// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content filters for user text (pre-runner) and model output (post-runner).
//!
//! Aggregation over a filter list: any BLOCK interrupts; otherwise each
//! MASKED replacement feeds the next filter, so the last replacement wins.
//! The post position screens every chunk before it is forwarded, which
//! keeps blocked output from ever reaching the platform.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use chatgate_config::{FilterAction, PipelineConfig};
use chatgate_core::{MessageChain, MessageComponent};

use crate::query::Query;
use crate::stage::{Stage, StageResult};

/// Screening verdict levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterLevel {
    Pass,
    Masked,
    Block,
}

/// One filter's verdict on a piece of text.
#[derive(Debug, Clone)]
pub struct FilterResult {
    pub level: FilterLevel,
    pub replacement: Option<String>,
    pub user_notice: Option<String>,
    pub console_notice: Option<String>,
}

impl FilterResult {
    fn pass() -> Self {
        Self {
            level: FilterLevel::Pass,
            replacement: None,
            user_notice: None,
            console_notice: None,
        }
    }
}

/// A single content filter.
pub trait ContentFilter: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, text: &str) -> FilterResult;
}

/// Blocks blank input before it reaches the runner. Silent: no notice.
pub struct EmptyInputFilter;

impl ContentFilter for EmptyInputFilter {
    fn name(&self) -> &str {
        "empty-input"
    }

    fn apply(&self, text: &str) -> FilterResult {
        if text.trim().is_empty() {
            FilterResult {
                level: FilterLevel::Block,
                replacement: None,
                user_notice: None,
                console_notice: Some("empty input blocked".to_string()),
            }
        } else {
            FilterResult::pass()
        }
    }
}

/// Silently drops text matching the ignore rules (command prefixes meant
/// for other bots, automated noise).
pub struct ContentIgnoreFilter {
    prefixes: Vec<String>,
    regexps: Vec<Regex>,
}

impl ContentIgnoreFilter {
    pub fn new(prefixes: &[String], patterns: &[String]) -> Self {
        Self {
            prefixes: prefixes.to_vec(),
            regexps: compile_patterns(patterns, "ignore-rule"),
        }
    }
}

impl ContentFilter for ContentIgnoreFilter {
    fn name(&self) -> &str {
        "content-ignore"
    }

    fn apply(&self, text: &str) -> FilterResult {
        let ignored = self
            .prefixes
            .iter()
            .any(|p| !p.is_empty() && text.starts_with(p.as_str()))
            || self.regexps.iter().any(|re| re.is_match(text));
        if ignored {
            FilterResult {
                level: FilterLevel::Block,
                replacement: None,
                user_notice: None,
                console_notice: Some("ignore rule matched".to_string()),
            }
        } else {
            FilterResult::pass()
        }
    }
}

/// Screens for configured ban-word regexes, masking or blocking per config.
pub struct BanWordFilter {
    patterns: Vec<Regex>,
    action: FilterAction,
    mask: String,
    block_notice: String,
}

impl BanWordFilter {
    pub fn new(config: &chatgate_config::ContentFilterConfig) -> Self {
        Self {
            patterns: compile_patterns(&config.ban_words, "ban-word"),
            action: config.action,
            mask: config.mask.clone(),
            block_notice: config.block_notice.clone(),
        }
    }
}

impl ContentFilter for BanWordFilter {
    fn name(&self) -> &str {
        "ban-word"
    }

    fn apply(&self, text: &str) -> FilterResult {
        let hit = self.patterns.iter().find(|re| re.is_match(text));
        let Some(first) = hit else {
            return FilterResult::pass();
        };

        match self.action {
            FilterAction::Block => FilterResult {
                level: FilterLevel::Block,
                replacement: None,
                user_notice: Some(self.block_notice.clone()),
                console_notice: Some(format!("ban-word pattern matched: {first}")),
            },
            FilterAction::Mask => {
                let mut masked = text.to_string();
                for re in &self.patterns {
                    masked = re
                        .replace_all(&masked, |caps: &regex::Captures<'_>| {
                            self.mask.repeat(caps[0].chars().count())
                        })
                        .into_owned();
                }
                FilterResult {
                    level: FilterLevel::Masked,
                    replacement: Some(masked),
                    user_notice: None,
                    console_notice: Some("ban-word span masked".to_string()),
                }
            }
        }
    }
}

fn compile_patterns(patterns: &[String], what: &str) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(filter = what, pattern = pattern.as_str(), error = %e, "invalid regex");
                None
            }
        })
        .collect()
}

/// Aggregated result of running a filter list over one text.
#[derive(Debug)]
pub enum FilterOutcome {
    Blocked {
        user_notice: Option<String>,
        console_notice: Option<String>,
    },
    Passed {
        text: String,
        changed: bool,
    },
}

/// Runs filters in order, feeding each MASKED replacement to the next.
pub fn run_filters(filters: &[Arc<dyn ContentFilter>], text: &str) -> FilterOutcome {
    let mut current = text.to_string();
    let mut changed = false;
    for filter in filters {
        let result = filter.apply(&current);
        match result.level {
            FilterLevel::Block => {
                return FilterOutcome::Blocked {
                    user_notice: result.user_notice,
                    console_notice: result
                        .console_notice
                        .map(|n| format!("{}: {n}", filter.name())),
                };
            }
            FilterLevel::Masked => {
                if let Some(replacement) = result.replacement {
                    current = replacement;
                    changed = true;
                }
            }
            FilterLevel::Pass => {}
        }
    }
    FilterOutcome::Passed {
        text: current,
        changed,
    }
}

/// Strips a leading `<think>…</think>` block from runner output.
pub fn strip_think(text: &str) -> &str {
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix("<think>")
        && let Some(end) = rest.find("</think>")
    {
        return rest[end + "</think>".len()..].trim_start();
    }
    text
}

/// Replaces the chain's text content with `replacement`, keeping non-text
/// parts in place. The first text part carries the whole replacement; the
/// rest are dropped so the chain's plain text equals the replacement.
fn replace_chain_text(chain: &MessageChain, replacement: String) -> MessageChain {
    let mut parts = Vec::with_capacity(chain.len());
    let mut placed = false;
    for part in chain.iter() {
        match part {
            MessageComponent::Text { .. } => {
                if !placed {
                    parts.push(MessageComponent::Text {
                        text: replacement.clone(),
                    });
                    placed = true;
                }
            }
            other => parts.push(other.clone()),
        }
    }
    if !placed {
        parts.push(MessageComponent::Text { text: replacement });
    }
    MessageChain(parts)
}

/// The content filter stage; the same type serves both named slots.
pub struct ContentFilterStage {
    filters: Vec<Arc<dyn ContentFilter>>,
}

impl ContentFilterStage {
    /// Pre-runner filter list: empty input, ignore rules, then ban words.
    pub fn pre(config: &PipelineConfig) -> Self {
        let ignore = &config.trigger.ignore_rules;
        Self {
            filters: vec![
                Arc::new(EmptyInputFilter),
                Arc::new(ContentIgnoreFilter::new(&ignore.prefix, &ignore.regexp)),
                Arc::new(BanWordFilter::new(&config.safety.content_filter)),
            ],
        }
    }

    /// Post-runner filter list: ban words only.
    pub fn post(config: &PipelineConfig) -> Self {
        Self {
            filters: vec![Arc::new(BanWordFilter::new(&config.safety.content_filter))],
        }
    }

    /// Screens a bare text (used per chunk on the output path).
    pub fn screen(&self, text: &str) -> FilterOutcome {
        run_filters(&self.filters, text)
    }
}

#[async_trait]
impl Stage for ContentFilterStage {
    async fn process(&self, query: &mut Query, stage_name: &str) -> StageResult {
        let text = query.message_chain.plain_text();
        match self.screen(&text) {
            FilterOutcome::Blocked {
                user_notice,
                console_notice,
            } => {
                debug!(stage = stage_name, "content filter blocked query");
                let mut result = match user_notice {
                    Some(notice) => StageResult::interrupt_with_notice(notice),
                    None => StageResult::interrupt(),
                };
                result.console_notice = console_notice;
                result
            }
            FilterOutcome::Passed { text, changed } => {
                if changed {
                    query.message_chain = replace_chain_text(&query.message_chain, text);
                }
                StageResult::proceed()
            }
        }
    }
}
