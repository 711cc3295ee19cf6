// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the chatgate gateway.

use thiserror::Error;

/// Entity kinds that can fail a registry lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum NotFoundKind {
    StreamSession,
    Query,
    Bot,
    Pipeline,
    Runner,
}

/// Failure classes for a runner invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunnerErrorKind {
    /// The runner exceeded its configured wall-clock budget.
    Timeout,
    /// The upstream model/vendor API failed.
    Upstream,
    /// The upstream response could not be parsed.
    Parse,
}

/// The primary error type used across chatgate crates.
///
/// Codec failures map to HTTP 4xx at the adapter boundary; everything the
/// pipeline surfaces to users travels as a `StageResult` notice instead of
/// crossing stage boundaries as an error.
#[derive(Debug, Error)]
pub enum GateError {
    /// Configuration errors (invalid TOML, missing required fields, bad key material).
    #[error("configuration error: {0}")]
    Config(String),

    /// Callback signature did not match the computed digest.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Envelope ciphertext could not be decrypted or its padding is invalid.
    #[error("decrypt failed: {0}")]
    DecryptFailed(String),

    /// Request body or plaintext payload is structurally invalid.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A registry lookup failed.
    #[error("{kind} not found: {id}")]
    NotFound { kind: NotFoundKind, id: String },

    /// Rate-limit admission rejected the query.
    #[error("admission denied: {notice}")]
    AdmissionDenied { notice: String },

    /// A content filter blocked the text.
    #[error("content blocked: {notice}")]
    FilterBlocked { notice: String },

    /// Runner invocation failures (timeout, upstream API, parse).
    #[error("runner error ({kind}): {message}")]
    Runner {
        kind: RunnerErrorKind,
        message: String,
    },

    /// Reply could not be delivered to the platform.
    #[error("adapter send failed: {message}")]
    AdapterSend {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Persistence/repository backend errors.
    #[error("repository error: {source}")]
    Repository {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// True for codec-level failures the adapter maps to HTTP 4xx.
    pub fn is_codec_rejection(&self) -> bool {
        matches!(
            self,
            GateError::SignatureInvalid | GateError::DecryptFailed(_) | GateError::Malformed(_)
        )
    }
}
