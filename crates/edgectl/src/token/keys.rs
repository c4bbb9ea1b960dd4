// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! RSA signing keys.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{SecondsFormat, Utc};
use jsonwebtoken::EncodingKey;
use rsa::RsaPrivateKey;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;

use crate::error::{CliError, Result};
use crate::token::jwks::Jwk;

pub const KEY_BITS: usize = 2048;

/// Key id derived from the creation time, e.g. `2026-10-18T09:30:00+00:00`.
pub fn default_kid() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// RSA private key plus the key id it is published under.
pub struct SigningKey {
    kid: String,
    key: RsaPrivateKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").field("kid", &self.kid).finish_non_exhaustive()
    }
}

impl SigningKey {
    pub fn generate(kid: impl Into<String>) -> Result<Self> {
        Self::generate_with_bits(kid, KEY_BITS)
    }

    fn generate_with_bits(kid: impl Into<String>, bits: usize) -> Result<Self> {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| CliError::Key(format!("generating {}-bit RSA key: {}", bits, e)))?;
        Ok(Self {
            kid: kid.into(),
            key,
        })
    }

    /// Load a PKCS#1 PEM private key.
    pub fn from_pem(kid: impl Into<String>, pem: &str) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| CliError::Key(format!("parsing private key: {}", e)))?;
        Ok(Self {
            kid: kid.into(),
            key,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn private_key_pem(&self) -> Result<String> {
        let pem = self
            .key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| CliError::Key(format!("encoding private key: {}", e)))?;
        Ok(pem.to_string())
    }

    /// Public half as an RS256 signing JWK.
    pub fn public_jwk(&self) -> Jwk {
        Jwk::rsa(
            &self.kid,
            URL_SAFE_NO_PAD.encode(self.key.n().to_bytes_be()),
            URL_SAFE_NO_PAD.encode(self.key.e().to_bytes_be()),
        )
    }

    pub(crate) fn encoding_key(&self) -> Result<EncodingKey> {
        let der = self
            .key
            .to_pkcs1_der()
            .map_err(|e| CliError::Key(format!("encoding private key: {}", e)))?;
        Ok(EncodingKey::from_rsa_der(der.as_bytes()))
    }
}
