// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! JSON Web Key Sets published by the remote-service proxy.

use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CliError, Result};

/// A single JWK. Only the RSA members are interpreted; the rest is kept
/// verbatim so republished sets do not lose fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Jwk {
    /// RS256 signature key from base64url modulus and exponent.
    pub fn rsa(kid: &str, n: String, e: String) -> Self {
        Self {
            kty: "RSA".to_string(),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            kid: Some(kid.to_string()),
            n: Some(n),
            e: Some(e),
            extra: Map::new(),
        }
    }

    pub fn decoding_key(&self) -> Result<DecodingKey> {
        if self.kty != "RSA" {
            return Err(CliError::Token(format!("unsupported key type {}", self.kty)));
        }
        match (&self.n, &self.e) {
            (Some(n), Some(e)) => Ok(DecodingKey::from_rsa_components(n, e)?),
            _ => Err(CliError::Token("RSA key is missing n or e".to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Parse a key set; a document holding one bare key is a set of one.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| CliError::Token(format!("invalid JWKS: {}", e)))?;
        if value.get("keys").is_some() {
            Ok(serde_json::from_value(value)?)
        } else if value.get("kty").is_some() {
            Ok(Self {
                keys: vec![serde_json::from_value(value)?],
            })
        } else {
            Err(CliError::Token(
                "JWKS contains neither keys nor a key".to_string(),
            ))
        }
    }

    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }

    /// New set with `key` first, followed by the current keys, holding at
    /// most `truncate` keys (`0` keeps every key).
    pub fn rotate(&self, key: Jwk, truncate: usize) -> Self {
        let new_kid = key.kid.clone();
        let retired = self
            .keys
            .iter()
            .filter(|k| k.kid.is_none() || k.kid != new_kid)
            .cloned();
        let mut keys: Vec<Jwk> = std::iter::once(key).chain(retired).collect();
        if truncate > 0 {
            keys.truncate(truncate);
        }
        Self { keys }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
