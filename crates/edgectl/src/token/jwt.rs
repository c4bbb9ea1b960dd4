// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Signing, decoding and verifying remote-service tokens.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header, encode};
use serde_json::{Map, Value};

use crate::error::{CliError, Result};
use crate::token::jwks::JwkSet;
use crate::token::keys::SigningKey;

/// Audience of every token the proxy issues.
pub const AUDIENCE: &str = "remote-service-client";

/// Outcome of checking a token against a key set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(String),
}

/// Sign `claims` with RS256, stamping the key id into the header.
pub fn sign(claims: &Value, key: &SigningKey) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key.kid().to_string());
    Ok(encode(&header, claims, &key.encoding_key()?)?)
}

/// Decoded but unverified token.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub header: Header,
    pub claims: Map<String, Value>,
}

/// Decode header and claims without checking the signature.
pub fn inspect(token: &str) -> Result<Inspection> {
    let token = token.trim();
    let header = decode_header(token)?;
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| CliError::Token("token has no payload segment".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| CliError::Token(format!("payload is not base64url: {}", e)))?;
    let claims = match serde_json::from_slice(&bytes)? {
        Value::Object(claims) => claims,
        _ => return Err(CliError::Token("payload is not a JSON object".to_string())),
    };
    Ok(Inspection { header, claims })
}

/// Verify the signature and registered claims of `token` against `keys`.
///
/// The key whose `kid` matches the header is tried first; without a match
/// every key in the set is tried. Errors are reserved for tokens that cannot
/// be decoded at all.
pub fn verify(token: &str, keys: &JwkSet) -> Result<Verdict> {
    let token = token.trim();
    let header = decode_header(token)?;
    if !matches!(
        header.alg,
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512
    ) {
        return Ok(Verdict::Invalid(format!(
            "unsupported algorithm {:?}",
            header.alg
        )));
    }

    let candidates: Vec<_> = match header.kid.as_deref().and_then(|kid| keys.find(kid)) {
        Some(jwk) => vec![jwk],
        None => keys.keys.iter().collect(),
    };
    if candidates.is_empty() {
        return Ok(Verdict::Invalid("no keys in key set".to_string()));
    }

    let mut validation = Validation::new(header.alg);
    validation.set_audience(&[AUDIENCE]);
    validation.validate_nbf = true;
    validation.required_spec_claims.clear();

    let mut last_error = String::new();
    for jwk in candidates {
        let key = match jwk.decoding_key() {
            Ok(key) => key,
            Err(e) => {
                last_error = e.to_string();
                continue;
            }
        };
        match decode::<Value>(token, &key, &validation) {
            Ok(_) => return Ok(Verdict::Valid),
            Err(e) => last_error = e.to_string(),
        }
    }
    Ok(Verdict::Invalid(last_error))
}
