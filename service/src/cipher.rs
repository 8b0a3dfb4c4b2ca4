// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Encryption of stored credential secrets.
//!
//! Secrets are encrypted with AES-256-CBC (PKCS#7 padding) under a single
//! process-wide [`CipherKey`] and persisted as an envelope:
//!
//! ```text
//! hex(nonce) ":" hex(ciphertext)
//! ```
//!
//! A fresh 128-bit nonce is drawn from the system CSPRNG for every call to
//! [`SecretCipher::encrypt`].
//!
//! # Security
//!
//! - CBC provides confidentiality only. A wrong key or tampered ciphertext is
//!   usually caught by the padding check, but can occasionally decrypt to
//!   garbage instead of failing.
//! - Key bytes and decrypted plaintext are zeroized on drop.

use aws_lc_rs::cipher::{
    AES_256, DecryptionContext, EncryptionContext, PaddedBlockDecryptingKey,
    PaddedBlockEncryptingKey, UnboundCipherKey,
};
use aws_lc_rs::iv::FixedLength;
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use zeroize::Zeroizing;

use crate::constants::{CIPHER_KEY_LENGTH, CIPHER_NONCE_LENGTH, ENVELOPE_DELIMITER};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CipherError {
    #[error("encryption key must be 64 hex characters or 32 bytes")]
    InvalidKey,
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),
    #[error("unable to encrypt value")]
    EncryptFailed,
    #[error("unable to decrypt value")]
    DecryptFailed,
    #[error("decrypted value is not valid UTF-8")]
    InvalidPlaintext,
}

/// A 256-bit symmetric key, zeroized on drop.
#[derive(Clone)]
pub struct CipherKey(Zeroizing<[u8; CIPHER_KEY_LENGTH]>);

impl CipherKey {
    pub fn new(bytes: [u8; CIPHER_KEY_LENGTH]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Parses the configured key: 64 hex characters, or a literal 32-byte string.
    pub fn from_config(value: &str) -> Result<Self, CipherError> {
        let mut bytes = Zeroizing::new([0u8; CIPHER_KEY_LENGTH]);

        if value.len() == CIPHER_KEY_LENGTH * 2 {
            if let Ok(decoded) = HEXLOWER_PERMISSIVE.decode(value.as_bytes()) {
                let decoded = Zeroizing::new(decoded);
                bytes.copy_from_slice(&decoded);
                return Ok(Self(bytes));
            }
        }

        if value.len() == CIPHER_KEY_LENGTH {
            bytes.copy_from_slice(value.as_bytes());
            return Ok(Self(bytes));
        }

        Err(CipherError::InvalidKey)
    }

    fn unbound(&self) -> Result<UnboundCipherKey, CipherError> {
        UnboundCipherKey::new(&AES_256, &self.0[..]).map_err(|_| CipherError::InvalidKey)
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherKey([REDACTED])")
    }
}

/// Encrypts and decrypts credential secrets under one key.
#[derive(Debug, Clone)]
pub struct SecretCipher {
    key: CipherKey,
}

impl SecretCipher {
    pub fn new(key: CipherKey) -> Self {
        Self { key }
    }

    /// Encrypts `plaintext` under a fresh random nonce and returns the envelope.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let encrypting_key = PaddedBlockEncryptingKey::cbc_pkcs7(self.key.unbound()?)
            .map_err(|_| CipherError::EncryptFailed)?;

        let mut nonce = [0u8; CIPHER_NONCE_LENGTH];
        aws_lc_rs::rand::fill(&mut nonce).map_err(|_| CipherError::EncryptFailed)?;

        let mut in_out = plaintext.as_bytes().to_vec();
        encrypting_key
            .less_safe_encrypt(&mut in_out, EncryptionContext::Iv128(FixedLength::from(nonce)))
            .map_err(|_| CipherError::EncryptFailed)?;

        Ok(format!(
            "{}{}{}",
            HEXLOWER.encode(&nonce),
            ENVELOPE_DELIMITER,
            HEXLOWER.encode(&in_out)
        ))
    }

    /// Decrypts an envelope produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// - [`CipherError::MalformedEnvelope`] - missing delimiter, empty or non-hex
    ///   segments, wrong nonce length, or a partial ciphertext block
    /// - [`CipherError::DecryptFailed`] - the padding check failed (usually a wrong key)
    /// - [`CipherError::InvalidPlaintext`] - the plaintext is not UTF-8
    pub fn decrypt(&self, envelope: &str) -> Result<Zeroizing<String>, CipherError> {
        let (nonce_hex, ciphertext_hex) = envelope
            .split_once(ENVELOPE_DELIMITER)
            .ok_or(CipherError::MalformedEnvelope("missing delimiter"))?;

        if nonce_hex.is_empty() || ciphertext_hex.is_empty() {
            return Err(CipherError::MalformedEnvelope("empty segment"));
        }

        let nonce = HEXLOWER_PERMISSIVE
            .decode(nonce_hex.as_bytes())
            .map_err(|_| CipherError::MalformedEnvelope("nonce is not hex"))?;
        let nonce: [u8; CIPHER_NONCE_LENGTH] = nonce
            .as_slice()
            .try_into()
            .map_err(|_| CipherError::MalformedEnvelope("nonce must be 16 bytes"))?;

        let mut in_out = Zeroizing::new(
            HEXLOWER_PERMISSIVE
                .decode(ciphertext_hex.as_bytes())
                .map_err(|_| CipherError::MalformedEnvelope("ciphertext is not hex"))?,
        );
        if in_out.len() % CIPHER_NONCE_LENGTH != 0 {
            return Err(CipherError::MalformedEnvelope(
                "ciphertext is not a whole number of blocks",
            ));
        }

        let decrypting_key = PaddedBlockDecryptingKey::cbc_pkcs7(self.key.unbound()?)
            .map_err(|_| CipherError::DecryptFailed)?;
        let plaintext = decrypting_key
            .decrypt(
                in_out.as_mut_slice(),
                DecryptionContext::Iv128(FixedLength::from(nonce)),
            )
            .map_err(|_| CipherError::DecryptFailed)?;

        let plaintext = std::str::from_utf8(plaintext).map_err(|_| CipherError::InvalidPlaintext)?;

        Ok(Zeroizing::new(plaintext.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn cipher() -> SecretCipher {
        SecretCipher::new(CipherKey::from_config(HEX_KEY).unwrap())
    }

    #[test]
    fn test_round_trip() {
        let cipher = cipher();
        for plaintext in [
            "",
            "s3cr3t",
            "exactly16bytes!!",
            "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY",
            "ünïcödé ✓",
        ] {
            let envelope = cipher.encrypt(plaintext).unwrap();
            assert_eq!(cipher.decrypt(&envelope).unwrap().as_str(), plaintext);
        }
    }

    #[test]
    fn test_envelope_format() {
        let envelope = cipher().encrypt("s3cr3t").unwrap();
        let (nonce, ciphertext) = envelope.split_once(':').unwrap();

        assert_eq!(nonce.len(), CIPHER_NONCE_LENGTH * 2);
        assert_eq!(ciphertext.len(), 32); // one padded block
        assert!(envelope.chars().all(|c| c == ':' || c.is_ascii_hexdigit()));
        assert!(!envelope.contains("s3cr3t"));
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let cipher = cipher();
        let first = cipher.encrypt("s3cr3t").unwrap();
        let second = cipher.encrypt("s3cr3t").unwrap();

        assert_ne!(first.split(':').next(), second.split(':').next());
        assert_ne!(first, second);
    }

    #[test]
    fn test_uppercase_envelope_accepted() {
        let cipher = cipher();
        let envelope = cipher.encrypt("s3cr3t").unwrap().to_uppercase();
        assert_eq!(cipher.decrypt(&envelope).unwrap().as_str(), "s3cr3t");
    }

    #[test]
    fn test_malformed_envelopes_rejected() {
        let cipher = cipher();
        let cases = [
            "no-delimiter",
            ":abcd",
            "00112233445566778899aabbccddeeff:",
            "zz112233445566778899aabbccddeeff:00112233445566778899aabbccddeeff",
            "0011:00112233445566778899aabbccddeeff",
            "00112233445566778899aabbccddeeff:nothex",
            "00112233445566778899aabbccddeeff:0011",
        ];
        for envelope in cases {
            assert!(
                matches!(
                    cipher.decrypt(envelope),
                    Err(CipherError::MalformedEnvelope(_))
                ),
                "expected malformed envelope for {envelope:?}"
            );
        }
    }

    #[test]
    fn test_wrong_key_does_not_yield_plaintext() {
        let envelope = cipher().encrypt("s3cr3t").unwrap();
        let other = SecretCipher::new(CipherKey::new([7u8; CIPHER_KEY_LENGTH]));

        // CBC is unauthenticated: a wrong key is usually a padding failure,
        // occasionally garbage, never the stored secret.
        let result = other.decrypt(&envelope);
        assert!(result.map(|p| p.as_str() != "s3cr3t").unwrap_or(true));
    }

    #[test]
    fn test_key_from_raw_string() {
        let key = CipherKey::from_config("0123456789abcdef0123456789abcdef").unwrap();
        let cipher = SecretCipher::new(key);
        let envelope = cipher.encrypt("value").unwrap();
        assert_eq!(cipher.decrypt(&envelope).unwrap().as_str(), "value");
    }

    #[test]
    fn test_invalid_key_lengths_rejected() {
        assert_eq!(
            CipherKey::from_config("default-encryption-key-for-development").unwrap_err(),
            CipherError::InvalidKey
        );
        assert_eq!(CipherKey::from_config("").unwrap_err(), CipherError::InvalidKey);
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", cipher());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("0001020304"));
    }
}
