// SPDX-FileCopyrightText: 2026 Chatgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Download and decrypt of platform-hosted encrypted media.
//!
//! Media URLs serve AES-256-CBC ciphertext with standard PKCS7 padding
//! (unlike the 32-byte envelope padding). The decrypted bytes get a MIME
//! type from a magic-number table since the platform strips content types.

use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, KeyIvInit};

use chatgate_core::GateError;

type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Magic-number table: `(prefix, mime)`.
const MAGIC: &[(&[u8], &str)] = &[
    (&[0xFF, 0xD8, 0xFF], "image/jpeg"),
    (&[0x89, 0x50, 0x4E, 0x47], "image/png"),
    (b"GIF8", "image/gif"),
    (b"BM", "image/bmp"),
    (&[0x49, 0x49, 0x2A, 0x00], "image/tiff"),
    (&[0x4D, 0x4D, 0x00, 0x2A], "image/tiff"),
];

/// Sniffs a MIME type from leading bytes; unrecognized content falls back
/// to `application/octet-stream`.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    for (prefix, mime) in MAGIC {
        if data.starts_with(prefix) {
            return mime;
        }
    }
    "application/octet-stream"
}

/// Decrypts a downloaded media body with the message AES key.
pub fn decrypt_media(key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>, GateError> {
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(GateError::DecryptFailed(
            "media ciphertext length is not a block multiple".to_string(),
        ));
    }
    let iv: [u8; 16] = key[..16].try_into().expect("key is 32 bytes, IV slice is 16");
    let mut buf = ciphertext.to_vec();
    let plaintext = Aes256CbcDec::new(&(*key).into(), &iv.into())
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| GateError::DecryptFailed("media decryption failed".to_string()))?;
    Ok(plaintext.to_vec())
}

/// Fetches and decrypts one media object, returning `(bytes, mime)`.
pub async fn download_media(
    client: &reqwest::Client,
    url: &str,
    key: &[u8; 32],
) -> Result<(Vec<u8>, &'static str), GateError> {
    let response = client.get(url).send().await.map_err(|e| GateError::AdapterSend {
        message: format!("media download request failed: {e}"),
        source: Some(Box::new(e)),
    })?;

    if !response.status().is_success() {
        return Err(GateError::AdapterSend {
            message: format!("media download returned {}", response.status()),
            source: None,
        });
    }

    let body = response.bytes().await.map_err(|e| GateError::AdapterSend {
        message: format!("media download body read failed: {e}"),
        source: Some(Box::new(e)),
    })?;

    let bytes = decrypt_media(key, &body)?;
    let mime = sniff_mime(&bytes);
    tracing::debug!(url, mime, size = bytes.len(), "media downloaded");
    Ok((bytes, mime))
}
