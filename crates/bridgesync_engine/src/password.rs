//! Password and SSO payload encryption.
//!
//! Both directions use AES-128-CTR keyed from the connection secret, chosen
//! to match what the partner site decrypts. The derivation is wire-frozen:
//! the key is the first half of `SHA-256(secret)`, and the outbound IV is
//! the ASCII form of the first sixteen hex characters of the same digest.
//! The partner derives the identical key and IV from its stored copy of the
//! secret, so nothing but the ciphertext travels.

use aes::Aes128;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use sha2::{Digest, Sha256};
use thiserror::Error;

type Aes128Ctr = Ctr128BE<Aes128>;

/// An inbound encrypted payload could not be unpacked.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    /// Outer or inner base64 was invalid.
    #[error("invalid base64 in encrypted payload")]
    Base64,
    /// The payload did not have the `cipher::hexiv` shape.
    #[error("encrypted payload is malformed")]
    Malformed,
    /// Decrypted bytes were not UTF-8.
    #[error("decrypted payload is not valid UTF-8")]
    Utf8,
}

/// An encrypted password ready for a webhook payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPassword {
    /// Base64 ciphertext, sent as `password`.
    pub password: String,
    /// Sixteen hex characters, sent as `enc_iv`.
    pub enc_iv: String,
}

fn derive_key(secret: &str) -> [u8; 16] {
    let digest = Sha256::digest(secret.as_bytes());
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    key
}

fn hex_digest(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Encrypts a plaintext password for the site holding `secret`.
pub fn encrypt_password(secret: &str, plaintext: &str) -> EncryptedPassword {
    let key = derive_key(secret);
    let enc_iv: String = hex_digest(secret).chars().take(16).collect();

    let mut iv = [0u8; 16];
    iv.copy_from_slice(enc_iv.as_bytes());

    let mut buf = plaintext.as_bytes().to_vec();
    Aes128Ctr::new(&key.into(), &iv.into()).apply_keystream(&mut buf);

    EncryptedPassword {
        password: BASE64.encode(buf),
        enc_iv,
    }
}

/// Unpacks an inbound SSO payload.
///
/// The outer layer is URL-safe base64 (possibly unpadded) wrapping
/// `<base64 ciphertext>::<hex iv>`; the hex IV is zero-padded to a full
/// block when the sender shipped a short one. An empty payload unpacks to
/// an empty string.
pub fn decrypt_sso_payload(payload: &str, secret: &str) -> Result<String, CipherError> {
    if payload.is_empty() {
        return Ok(String::new());
    }

    let mut normalized = payload.replace('-', "+").replace('_', "/");
    while normalized.len() % 4 != 0 {
        normalized.push('=');
    }
    let outer = BASE64.decode(normalized).map_err(|_| CipherError::Base64)?;
    let outer = String::from_utf8(outer).map_err(|_| CipherError::Utf8)?;

    let (cipher_b64, hex_iv) = outer.rsplit_once("::").ok_or(CipherError::Malformed)?;
    let mut ciphertext = BASE64.decode(cipher_b64).map_err(|_| CipherError::Base64)?;

    let mut iv = [0u8; 16];
    for (i, chunk) in hex_iv.as_bytes().chunks(2).take(16).enumerate() {
        let pair = std::str::from_utf8(chunk).map_err(|_| CipherError::Malformed)?;
        iv[i] = u8::from_str_radix(pair, 16).map_err(|_| CipherError::Malformed)?;
    }

    let key = derive_key(secret);
    Aes128Ctr::new(&key.into(), &iv.into()).apply_keystream(&mut ciphertext);

    let plain = String::from_utf8(ciphertext).map_err(|_| CipherError::Utf8)?;
    Ok(plain.trim().to_string())
}

/// Extracts a value from a `key=value&key=value` string, matching the key
/// case-insensitively and URL-decoding the value.
pub fn query_value(query: &str, key: &str) -> Option<String> {
    let query = query.replace("&amp;", "&");
    for pair in query.split('&') {
        let Some((k, v)) = pair.split_once('=') else {
            continue;
        };
        if k.eq_ignore_ascii_case(key) {
            return Some(url_decode(v));
        }
    }
    None
}

fn url_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                if let Some(hex) = bytes.get(i + 1..i + 3).and_then(|h| std::str::from_utf8(h).ok())
                {
                    if let Ok(byte) = u8::from_str_radix(hex, 16) {
                        out.push(byte);
                        i += 3;
                        continue;
                    }
                }
                out.push(b'%');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
