// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Whitelist/blacklist admission over launcher keys.

use async_trait::async_trait;
use tracing::debug;

use chatgate_config::AccessMode;

use crate::query::Query;
use crate::stage::{Stage, StageResult};

/// Matches a `{person|group|*}_{id|*}` pattern against a launcher key.
///
/// `*` is a single wildcard in either position. Patterns without an
/// underscore never match (the key always has one).
pub fn matches_pattern(pattern: &str, key: &str) -> bool {
    let (Some((pat_type, pat_id)), Some((key_type, key_id))) =
        (pattern.split_once('_'), key.split_once('_'))
    else {
        return false;
    };
    (pat_type == "*" || pat_type == key_type) && (pat_id == "*" || pat_id == key_id)
}

/// Whitelist mode admits only matching keys; blacklist mode rejects them.
pub fn allow(mode: AccessMode, patterns: &[String], key: &str) -> bool {
    let matched = patterns.iter().any(|p| matches_pattern(p, key));
    match mode {
        AccessMode::Whitelist => matched,
        AccessMode::Blacklist => !matched,
    }
}

/// Stage gating every query on the pipeline's access-control list.
pub struct AccessControlStage;

#[async_trait]
impl Stage for AccessControlStage {
    async fn process(&self, query: &mut Query, stage_name: &str) -> StageResult {
        let control = &query.pipeline_config.trigger.access_control;
        let patterns = match control.mode {
            AccessMode::Whitelist => &control.whitelist,
            AccessMode::Blacklist => &control.blacklist,
        };
        let key = query.launcher_key();
        if allow(control.mode, patterns, &key) {
            StageResult::proceed()
        } else {
            debug!(stage = stage_name, key = key.as_str(), "access denied");
            StageResult::interrupt()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_pattern_matches_exact_key() {
        assert!(matches_pattern("person_u1", "person_u1"));
        assert!(!matches_pattern("person_u1", "person_u2"));
        assert!(!matches_pattern("person_u1", "group_u1"));
    }

    #[test]
    fn wildcards_match_either_position() {
        assert!(matches_pattern("*_u1", "person_u1"));
        assert!(matches_pattern("*_u1", "group_u1"));
        assert!(matches_pattern("person_*", "person_anyone"));
        assert!(matches_pattern("*_*", "group_g9"));
        assert!(!matches_pattern("group_*", "person_u1"));
    }

    #[test]
    fn id_with_underscores_matches_whole_tail() {
        // Keys split on the first underscore only; ids may contain more.
        assert!(matches_pattern("person_a_b", "person_a_b"));
        assert!(matches_pattern("person_*", "person_a_b"));
        assert!(!matches_pattern("person_a", "person_a_b"));
    }

    #[test]
    fn patterns_without_separator_never_match() {
        assert!(!matches_pattern("person", "person_u1"));
        assert!(!matches_pattern("", "person_u1"));
    }

    #[test]
    fn whitelist_requires_match() {
        let patterns = vec!["person_u1".to_string(), "group_*".to_string()];
        assert!(allow(AccessMode::Whitelist, &patterns, "person_u1"));
        assert!(allow(AccessMode::Whitelist, &patterns, "group_g1"));
        assert!(!allow(AccessMode::Whitelist, &patterns, "person_u2"));
        assert!(!allow(AccessMode::Whitelist, &[], "person_u1"));
    }

    #[test]
    fn blacklist_requires_no_match() {
        let patterns = vec!["person_u1".to_string()];
        assert!(!allow(AccessMode::Blacklist, &patterns, "person_u1"));
        assert!(allow(AccessMode::Blacklist, &patterns, "person_u2"));
        assert!(allow(AccessMode::Blacklist, &[], "person_u1"));
    }

    proptest! {
        #[test]
        fn modes_are_complementary_for_same_patterns(
            id in "[a-z0-9]{1,8}",
            patterns in proptest::collection::vec("(person|group|\\*)_([a-z0-9]{1,4}|\\*)", 0..6),
        ) {
            let key = format!("person_{id}");
            let allowed_wl = allow(AccessMode::Whitelist, &patterns, &key);
            let allowed_bl = allow(AccessMode::Blacklist, &patterns, &key);
            prop_assert_ne!(allowed_wl, allowed_bl);
        }
    }
}
