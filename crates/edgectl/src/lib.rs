// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! edgectl
//!
//! Provisions the remote-service proxy on a management platform (legacy
//! SaaS, hybrid or on-premises) and manages the keys that sign its tokens.
//!
//! `provision` deploys the proxy and the resources it needs, verifies it, and
//! prints the Kubernetes manifests the envoy adapter is configured with. The
//! `token` commands obtain, inspect and rotate signed tokens.
//!
//! Commands write their results to the writer handed to [`run`]; progress is
//! logged through `tracing` on stderr.

use std::io::{Read, Write};

pub mod bundle;
pub mod cli;
pub mod context;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod provision;
pub mod tenant;
pub mod token;

pub use cli::{Cli, Command, RootArgs, TokenCommand};
pub use context::{Context, Mode, ProxyCredential};
pub use error::{CliError, Result};
pub use provision::{ProvisionReport, Provisioner, Step, StepStatus};
pub use tenant::TenantConfig;

/// Execute a parsed command line.
pub async fn run(cli: Cli, input: &mut dyn Read, out: &mut dyn Write) -> Result<()> {
    let root = &cli.root;
    match &cli.command {
        Command::Provision(args) => {
            provision::provision(root, args, out).await?;
        }
        Command::Token(TokenCommand::Create(args)) => token::create(root, args, out).await?,
        Command::Token(TokenCommand::Inspect(args)) => {
            token::inspect(root, args, input, out).await?;
        }
        Command::Token(TokenCommand::RotateCert(args)) => {
            token::rotate_cert(root, args, out).await?
        }
        Command::Token(TokenCommand::CreateSecret(args)) => {
            token::create_secret(root, args, out).await?
        }
    }
    out.flush()?;
    Ok(())
}
