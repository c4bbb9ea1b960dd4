// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! `edgectl token` subcommands.

use std::io::{Read, Write};

use edgectl_client::RotateRequest;
use tracing::{info, warn};

use crate::cli::{CreateSecretArgs, CreateTokenArgs, InspectArgs, RootArgs, RotateCertArgs};
use crate::context::{ProxyCredential, ResolveOptions};
use crate::error::{CliError, Result};
use crate::manifest;
use crate::token::jwks::JwkSet;
use crate::token::jwt::{self, Verdict};
use crate::token::keys::{SigningKey, default_kid};

/// Exchange a client id and secret for a token and print it.
pub async fn create(root: &RootArgs, args: &CreateTokenArgs, out: &mut dyn Write) -> Result<()> {
    let ctx = root.resolve(ResolveOptions::runtime_only())?;
    let client = ctx.remote_service_client(None)?;
    let token = client.create_token(&args.id, &args.secret).await?;
    writeln!(out, "{}", token)?;
    Ok(())
}

/// Print the claims of a token, then verify it against the published keys.
///
/// A token that fails verification is reported, not returned as an error.
pub async fn inspect(
    root: &RootArgs,
    args: &InspectArgs,
    input: &mut dyn Read,
    out: &mut dyn Write,
) -> Result<Verdict> {
    let ctx = root.resolve(ResolveOptions::runtime_only())?;

    let token = match &args.file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut token = String::new();
            input.read_to_string(&mut token)?;
            token
        }
    };
    let token = token.trim();
    if token.is_empty() {
        return Err(CliError::Token("no token given".to_string()));
    }

    let inspection = jwt::inspect(token)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&inspection.claims)?)?;
    writeln!(out)?;
    writeln!(out, "verifying...")?;

    let certs = ctx
        .remote_service_client(ctx.credential.as_ref())?
        .certs()
        .await?;
    let keys = JwkSet::parse(&certs)?;
    let verdict = jwt::verify(token, &keys)?;
    match &verdict {
        Verdict::Valid => writeln!(out, "valid token")?,
        Verdict::Invalid(reason) => writeln!(out, "invalid token: {}", reason)?,
    }
    Ok(verdict)
}

/// Generate a signing key and publish it through the proxy's rotate endpoint.
pub async fn rotate_cert(root: &RootArgs, args: &RotateCertArgs, out: &mut dyn Write) -> Result<()> {
    let ctx = root.resolve(ResolveOptions::runtime_only())?;
    let credential = match (&args.id, &args.secret) {
        (Some(key), Some(secret)) => ProxyCredential {
            key: key.clone(),
            secret: secret.clone(),
        },
        (None, None) => ctx.credential.clone().ok_or_else(|| {
            CliError::Config(
                "proxy credential required: pass --id and --secret or a --config file".to_string(),
            )
        })?,
        _ => {
            return Err(CliError::Config(
                "--id and --secret must be given together".to_string(),
            ));
        }
    };

    let client = ctx.remote_service_client(Some(&credential))?;
    let current = JwkSet::parse(&client.certs().await?)?;

    let key = SigningKey::generate(args.kid.clone().unwrap_or_else(default_kid))?;
    let keys = current.rotate(key.public_jwk(), args.truncate);
    info!(kid = key.kid(), keys = keys.keys.len(), "publishing rotated key set");

    client
        .rotate(&RotateRequest {
            kid: key.kid().to_string(),
            private_key: key.private_key_pem()?,
            certificate: keys.to_json()?,
        })
        .await?;
    writeln!(out, "certificate successfully rotated")?;
    Ok(())
}

/// Print a policy Secret holding a new key plus the currently published ones.
pub async fn create_secret(
    root: &RootArgs,
    args: &CreateSecretArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let ctx = root.resolve(ResolveOptions::runtime_only())?;
    if ctx.org.is_empty() || ctx.env.is_empty() {
        return Err(CliError::Config("--org and --env are required".to_string()));
    }

    let client = ctx.remote_service_client(ctx.credential.as_ref())?;
    let current = match client.certs().await {
        Ok(bytes) => JwkSet::parse(&bytes)?,
        Err(e) if e.is_not_found() => {
            warn!("no published keys found, the secret holds only the new key");
            JwkSet::default()
        }
        Err(e) => return Err(e.into()),
    };

    let key = SigningKey::generate(args.kid.clone().unwrap_or_else(default_kid))?;
    let keys = current.rotate(key.public_jwk(), args.truncate);
    let secret = manifest::policy_secret(&ctx.org, &ctx.env, &args.namespace, &key, &keys)?;
    out.write_all(secret.as_bytes())?;
    Ok(())
}
