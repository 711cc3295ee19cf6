// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Callback envelope seal/open for the enterprise-IM webhook protocol.
//!
//! Envelope plaintext layout before encryption:
//! `random(16) || msg_len(u32 BE) || msg || receive_id`, padded to the
//! 32-byte block the platform mandates, then AES-256-CBC encrypted with the
//! IV taken from the first 16 key bytes. The callback signature is the SHA1
//! hex digest of the lexicographically sorted `[token, timestamp, nonce,
//! ciphertext]` concatenation.

use aes::Aes256;
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use chatgate_core::GateError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Platform-mandated padding block size (larger than the AES block).
const PAD_BLOCK: usize = 32;

/// An encrypted callback envelope plus its transport parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub encrypt: String,
    pub msg_signature: String,
    pub timestamp: String,
    pub nonce: String,
}

/// Seals and opens callback envelopes for one bot's key material.
#[derive(Debug)]
pub struct CallbackCrypto {
    token: String,
    key: [u8; 32],
    receive_id: String,
}

impl CallbackCrypto {
    /// Builds the codec from the platform's 43-character base64 AES key.
    ///
    /// `receive_id` is the bot/corp identity the envelope trailer must
    /// match; pass an empty string to skip that check (URL verification
    /// for some platform variants omits it).
    pub fn new(
        token: impl Into<String>,
        encoded_aes_key: &str,
        receive_id: impl Into<String>,
    ) -> Result<Self, GateError> {
        let decoded = B64
            .decode(format!("{encoded_aes_key}="))
            .map_err(|e| GateError::Config(format!("invalid AES key encoding: {e}")))?;
        let key: [u8; 32] = decoded
            .try_into()
            .map_err(|_| GateError::Config("AES key must decode to 32 bytes".to_string()))?;
        Ok(Self {
            token: token.into(),
            key,
            receive_id: receive_id.into(),
        })
    }

    /// The raw AES key, shared with platform-hosted media decryption.
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// SHA1 hex digest over the sorted `[token, timestamp, nonce, data]`.
    pub fn signature(&self, timestamp: &str, nonce: &str, data: &str) -> String {
        let mut parts = [self.token.as_str(), timestamp, nonce, data];
        parts.sort_unstable();
        let mut hasher = Sha1::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }

    /// GET verification handshake: checks the signature over `echostr` and
    /// returns its decrypted plaintext for echoing.
    pub fn verify_url(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        echostr: &str,
    ) -> Result<String, GateError> {
        let plaintext = self.open(echostr, msg_signature, timestamp, nonce)?;
        String::from_utf8(plaintext)
            .map_err(|_| GateError::DecryptFailed("echostr is not valid UTF-8".to_string()))
    }

    /// Verifies the signature and decrypts one envelope body, returning the
    /// inner message plaintext.
    pub fn decrypt(
        &self,
        ciphertext_b64: &str,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
    ) -> Result<Vec<u8>, GateError> {
        self.open(ciphertext_b64, msg_signature, timestamp, nonce)
    }

    /// Encrypts `plaintext` into a signed envelope.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        nonce: &str,
        timestamp: &str,
    ) -> Result<Envelope, GateError> {
        // random(16) || msg_len || msg || receive_id, padded to PAD_BLOCK.
        let mut prefix = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut prefix);

        let mut buf = Vec::with_capacity(
            16 + 4 + plaintext.len() + self.receive_id.len() + PAD_BLOCK,
        );
        buf.extend_from_slice(&prefix);
        buf.extend_from_slice(&(plaintext.len() as u32).to_be_bytes());
        buf.extend_from_slice(plaintext);
        buf.extend_from_slice(self.receive_id.as_bytes());

        let pad = PAD_BLOCK - (buf.len() % PAD_BLOCK);
        buf.extend(std::iter::repeat_n(pad as u8, pad));

        let iv: [u8; 16] = self.key[..16]
            .try_into()
            .expect("key is 32 bytes, IV slice is 16");
        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<NoPadding>(&buf);

        let encrypt = B64.encode(ciphertext);
        let msg_signature = self.signature(timestamp, nonce, &encrypt);
        Ok(Envelope {
            encrypt,
            msg_signature,
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
        })
    }

    fn open(
        &self,
        ciphertext_b64: &str,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
    ) -> Result<Vec<u8>, GateError> {
        let expected = self.signature(timestamp, nonce, ciphertext_b64);
        if !constant_time_eq(expected.as_bytes(), msg_signature.as_bytes()) {
            return Err(GateError::SignatureInvalid);
        }

        let ciphertext = B64
            .decode(ciphertext_b64)
            .map_err(|e| GateError::DecryptFailed(format!("ciphertext is not base64: {e}")))?;
        if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
            return Err(GateError::DecryptFailed(
                "ciphertext length is not a block multiple".to_string(),
            ));
        }

        let iv: [u8; 16] = self.key[..16]
            .try_into()
            .expect("key is 32 bytes, IV slice is 16");
        let mut buf = ciphertext;
        let decrypted = Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| GateError::DecryptFailed("block decryption failed".to_string()))?;

        // Strip platform padding: the last byte encodes 1..=PAD_BLOCK.
        let pad = *decrypted
            .last()
            .ok_or_else(|| GateError::DecryptFailed("empty plaintext".to_string()))?
            as usize;
        if pad == 0 || pad > PAD_BLOCK || pad >= decrypted.len() {
            return Err(GateError::DecryptFailed("invalid padding".to_string()));
        }
        let unpadded = &decrypted[..decrypted.len() - pad];

        if unpadded.len() < 20 {
            return Err(GateError::DecryptFailed("plaintext too short".to_string()));
        }
        let msg_len = u32::from_be_bytes(
            unpadded[16..20]
                .try_into()
                .expect("slice of length 4 fits u32"),
        ) as usize;
        if unpadded.len() < 20 + msg_len {
            return Err(GateError::DecryptFailed(
                "declared message length exceeds payload".to_string(),
            ));
        }

        let trailer = &unpadded[20 + msg_len..];
        if !self.receive_id.is_empty() && trailer != self.receive_id.as_bytes() {
            return Err(GateError::DecryptFailed("receive id mismatch".to_string()));
        }

        Ok(unpadded[20..20 + msg_len].to_vec())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // 43 base64 chars, decodes to 32 bytes with the trailing '='.
    const TEST_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";

    fn crypto() -> CallbackCrypto {
        CallbackCrypto::new("tok3n", TEST_KEY, "bot-corp-1").unwrap()
    }

    #[test]
    fn rejects_short_aes_key() {
        let err = CallbackCrypto::new("t", "tooshort", "r").unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let c = crypto();
        let envelope = c.encrypt(b"{\"msgtype\":\"text\"}", "n0nce", "1700000000").unwrap();
        let plain = c
            .decrypt(&envelope.encrypt, &envelope.msg_signature, "1700000000", "n0nce")
            .unwrap();
        assert_eq!(plain, b"{\"msgtype\":\"text\"}");
    }

    #[test]
    fn decrypt_rejects_bad_signature() {
        let c = crypto();
        let envelope = c.encrypt(b"hello", "n", "1").unwrap();
        let err = c
            .decrypt(&envelope.encrypt, "0000000000000000000000000000000000000000", "1", "n")
            .unwrap_err();
        assert!(matches!(err, GateError::SignatureInvalid));
    }

    #[test]
    fn decrypt_rejects_tampered_ciphertext() {
        let c = crypto();
        let envelope = c.encrypt(b"hello", "n", "1").unwrap();
        let mut raw = B64.decode(&envelope.encrypt).unwrap();
        raw[0] ^= 0x01;
        let tampered = B64.encode(&raw);
        // Re-sign so the failure is decryption, not the signature check.
        let sig = c.signature("1", "n", &tampered);
        let err = c.decrypt(&tampered, &sig, "1", "n").unwrap_err();
        assert!(matches!(err, GateError::DecryptFailed(_)));
    }

    #[test]
    fn decrypt_rejects_wrong_receive_id() {
        let a = CallbackCrypto::new("tok3n", TEST_KEY, "bot-a").unwrap();
        let b = CallbackCrypto::new("tok3n", TEST_KEY, "bot-b").unwrap();
        let envelope = a.encrypt(b"hello", "n", "1").unwrap();
        let err = b
            .decrypt(&envelope.encrypt, &envelope.msg_signature, "1", "n")
            .unwrap_err();
        assert!(matches!(err, GateError::DecryptFailed(_)));
    }

    #[test]
    fn empty_receive_id_skips_trailer_check() {
        let sealed = crypto();
        let open = CallbackCrypto::new("tok3n", TEST_KEY, "").unwrap();
        let envelope = sealed.encrypt(b"echo-plain", "n", "1").unwrap();
        let plain = open
            .decrypt(&envelope.encrypt, &envelope.msg_signature, "1", "n")
            .unwrap();
        assert_eq!(plain, b"echo-plain");
    }

    #[test]
    fn verify_url_returns_echo_plaintext() {
        let c = crypto();
        let envelope = c.encrypt(b"3804718982", "vnonce", "1700000001").unwrap();
        let echoed = c
            .verify_url(&envelope.msg_signature, "1700000001", "vnonce", &envelope.encrypt)
            .unwrap();
        assert_eq!(echoed, "3804718982");
    }

    #[test]
    fn signature_is_order_independent_of_inputs() {
        let c = crypto();
        // Sorting inside signature() means permuting caller arguments that
        // sort identically yields the same digest.
        let s1 = c.signature("111", "222", "333");
        let s2 = c.signature("222", "111", "333");
        assert_eq!(s1, s2);
    }

    proptest! {
        #[test]
        fn roundtrip_arbitrary_payloads(payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let c = crypto();
            let envelope = c.encrypt(&payload, "nonce", "1700000000").unwrap();
            let plain = c
                .decrypt(&envelope.encrypt, &envelope.msg_signature, "1700000000", "nonce")
                .unwrap();
            prop_assert_eq!(plain, payload);
        }
    }
}
