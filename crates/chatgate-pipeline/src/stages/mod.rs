// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in pipeline stages.

pub mod access;
pub mod filters;
pub mod rate_limit;
pub mod respond_rules;
pub mod runner_stage;

pub use access::AccessControlStage;
pub use filters::ContentFilterStage;
pub use rate_limit::{ReleaseRateLimitStage, RequireRateLimitStage};
pub use respond_rules::GroupRespondRulesStage;
pub use runner_stage::RunnerStage;
