// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform payload codec: envelope crypto, callback signatures, and
//! encrypted media handling.
//!
//! Failures surface as [`GateError::SignatureInvalid`],
//! [`GateError::DecryptFailed`], or [`GateError::Malformed`]; the adapter
//! maps those to HTTP 400/403 and never invokes the pipeline for them.
//!
//! [`GateError::SignatureInvalid`]: chatgate_core::GateError::SignatureInvalid
//! [`GateError::DecryptFailed`]: chatgate_core::GateError::DecryptFailed
//! [`GateError::Malformed`]: chatgate_core::GateError::Malformed

pub mod envelope;
pub mod media;

pub use envelope::{CallbackCrypto, Envelope};
pub use media::{decrypt_media, download_media, sniff_mime};
