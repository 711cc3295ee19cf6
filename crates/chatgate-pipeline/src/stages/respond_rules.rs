// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group respond rules: does this group message address the bot?
//!
//! Person queries skip the stage entirely. Rules run in a fixed order
//! (at-mention, prefix, regexp, random); the first match replaces the
//! query's working chain, no match interrupts silently.

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use chatgate_core::MessageChain;

use crate::query::{LauncherType, Query};
use crate::stage::{Stage, StageResult};

/// Outcome of one rule check.
struct RuleOutcome {
    matching: bool,
    replacement: Option<MessageChain>,
}

impl RuleOutcome {
    fn miss() -> Self {
        Self {
            matching: false,
            replacement: None,
        }
    }

    fn hit(replacement: MessageChain) -> Self {
        Self {
            matching: true,
            replacement: Some(replacement),
        }
    }
}

/// The bot was at-mentioned: strip up to two mention parts (platforms
/// sometimes double-insert on reply) and respond to the rest.
fn check_at(chain: &MessageChain, bot_account_id: &str) -> RuleOutcome {
    if !chain.has_at(bot_account_id) {
        return RuleOutcome::miss();
    }
    let mut replacement = chain.clone();
    replacement.remove_at(bot_account_id, 2);
    RuleOutcome::hit(replacement)
}

/// The first text part starts with a configured prefix: strip it.
fn check_prefix(chain: &MessageChain, prefixes: &[String]) -> RuleOutcome {
    let text = chain.plain_text();
    for prefix in prefixes {
        if !prefix.is_empty() && text.starts_with(prefix.as_str()) {
            let mut replacement = chain.clone();
            replacement.set_first_text(text[prefix.len()..].trim_start().to_string());
            return RuleOutcome::hit(replacement);
        }
    }
    RuleOutcome::miss()
}

/// The text matches a configured regex: respond to the chain unchanged.
fn check_regexp(chain: &MessageChain, patterns: &[regex::Regex]) -> RuleOutcome {
    let text = chain.plain_text();
    if patterns.iter().any(|re| re.is_match(&text)) {
        RuleOutcome::hit(chain.clone())
    } else {
        RuleOutcome::miss()
    }
}

/// Respond with probability `p`, independent per query.
fn check_random(chain: &MessageChain, p: f64) -> RuleOutcome {
    if p > 0.0 && rand::thread_rng().gen_bool(p.clamp(0.0, 1.0)) {
        RuleOutcome::hit(chain.clone())
    } else {
        RuleOutcome::miss()
    }
}

/// Stage applying the group respond rules.
///
/// Regexes compile once from the pipeline's config snapshot; invalid
/// patterns are dropped with a warning at construction.
pub struct GroupRespondRulesStage {
    regexps: Vec<regex::Regex>,
}

impl GroupRespondRulesStage {
    pub fn new(config: &chatgate_config::PipelineConfig) -> Self {
        let regexps = config
            .trigger
            .group_respond_rules
            .regexp
            .iter()
            .filter_map(|pattern| match regex::Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = pattern.as_str(), error = %e, "invalid respond regexp");
                    None
                }
            })
            .collect();
        Self { regexps }
    }
}

#[async_trait]
impl Stage for GroupRespondRulesStage {
    async fn process(&self, query: &mut Query, stage_name: &str) -> StageResult {
        if query.launcher_type == LauncherType::Person {
            return StageResult::proceed();
        }

        let rules = query.pipeline_config.trigger.group_respond_rules.clone();
        let chain = &query.message_chain;

        let outcome = [
            if rules.at {
                check_at(chain, &query.bot_account_id)
            } else {
                RuleOutcome::miss()
            },
            check_prefix(chain, &rules.prefix),
            check_regexp(chain, &self.regexps),
            check_random(chain, rules.random),
        ]
        .into_iter()
        .find(|o| o.matching);

        match outcome {
            Some(RuleOutcome {
                replacement: Some(replacement),
                ..
            }) => {
                query.message_chain = replacement;
                StageResult::proceed()
            }
            _ => {
                debug!(
                    stage = stage_name,
                    group = query.launcher_id.as_str(),
                    "no respond rule matched"
                );
                StageResult::interrupt()
            }
        }
    }
}
