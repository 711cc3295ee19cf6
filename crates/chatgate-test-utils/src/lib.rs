// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles and fixtures for the chatgate workspace.
//!
//! Mocks here record every interaction so tests assert on delivery order
//! and content without a live platform, runner, or plugin runtime.

pub mod fixtures;
pub mod mock_adapter;
pub mod mock_runner;
pub mod sink;

pub use fixtures::{
    event_fixture, query_fixture, query_fixture_on_adapter, query_fixture_with_config,
};
pub use mock_adapter::MockAdapter;
pub use mock_runner::MockRunner;
pub use sink::RecordingEventSink;
