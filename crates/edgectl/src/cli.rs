// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "edgectl",
    version,
    about = "Provision the remote-service proxy and manage its signing credentials"
)]
pub struct Cli {
    #[command(flatten)]
    pub root: RootArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection flags shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct RootArgs {
    /// Organization name
    #[arg(short = 'o', long = "org", global = true)]
    pub org: Option<String>,

    /// Environment name
    #[arg(short = 'e', long = "env", global = true)]
    pub env: Option<String>,

    /// Management API user (legacy, OPDK)
    #[arg(short = 'u', long, global = true)]
    pub username: Option<String>,

    /// Management API password (legacy, OPDK)
    #[arg(
        short = 'p',
        long,
        env = "EDGECTL_PASSWORD",
        hide_env_values = true,
        global = true
    )]
    pub password: Option<String>,

    /// Management API OAuth token (hybrid)
    #[arg(
        short = 't',
        long,
        env = "EDGECTL_TOKEN",
        hide_env_values = true,
        global = true
    )]
    pub token: Option<String>,

    /// Management API base URL
    #[arg(short = 'm', long, global = true)]
    pub management: Option<String>,

    /// Runtime base URL hosting the remote-service proxy
    #[arg(short = 'r', long, global = true)]
    pub runtime: Option<String>,

    /// Internal proxy URL (legacy, OPDK)
    #[arg(long, global = true)]
    pub internal_api: Option<String>,

    /// Tenant config file written by a previous provision
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Legacy SaaS management platform
    #[arg(long, global = true, conflicts_with = "opdk")]
    pub legacy: bool,

    /// On-premises (OPDK) management platform
    #[arg(long, global = true)]
    pub opdk: bool,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Deploy the remote-service proxy and create its credentials
    Provision(ProvisionArgs),

    /// Create, inspect and rotate signed tokens
    #[command(subcommand)]
    Token(TokenCommand),
}

#[derive(Debug, Clone, Args)]
pub struct ProvisionArgs {
    /// Developer email owning the remote-service app (hybrid)
    #[arg(short = 'd', long)]
    pub developer_email: Option<String>,

    /// Kubernetes namespace for the emitted manifests
    #[arg(short = 'n', long, default_value = "apigee")]
    pub namespace: String,

    /// Import and deploy the proxy even if a revision is already deployed
    #[arg(short = 'f', long)]
    pub force_proxy_install: bool,

    /// Virtual hosts the proxy listens on (legacy, OPDK)
    #[arg(long, value_delimiter = ',', default_value = "default,secure")]
    pub virtual_hosts: Vec<String>,

    /// Only verify the already provisioned proxy
    #[arg(long)]
    pub verify_only: bool,

    /// Proxy bundle zip to deploy instead of the generated one
    #[arg(long)]
    pub bundle: Option<PathBuf>,

    /// Also write the emitted manifests to this file
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Obtain a token for a client id and secret
    Create(CreateTokenArgs),

    /// Print a token's claims and verify its signature
    Inspect(InspectArgs),

    /// Publish a new signing key through the proxy
    RotateCert(RotateCertArgs),

    /// Print a Kubernetes Secret holding a new signing key
    CreateSecret(CreateSecretArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CreateTokenArgs {
    /// Client id (app key)
    #[arg(long)]
    pub id: String,

    /// Client secret
    #[arg(long)]
    pub secret: String,
}

#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    /// Read the token from this file instead of stdin
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct RotateCertArgs {
    /// Key id for the new key (default: current time)
    #[arg(long)]
    pub kid: Option<String>,

    /// Number of keys to keep in the published set
    #[arg(long, default_value_t = 2)]
    pub truncate: usize,

    /// Proxy credential key (default: from the tenant config)
    #[arg(long)]
    pub id: Option<String>,

    /// Proxy credential secret (default: from the tenant config)
    #[arg(long)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct CreateSecretArgs {
    /// Key id for the new key (default: current time)
    #[arg(long)]
    pub kid: Option<String>,

    /// Number of keys to keep in the published set
    #[arg(long, default_value_t = 2)]
    pub truncate: usize,

    /// Kubernetes namespace of the Secret
    #[arg(short = 'n', long, default_value = "apigee")]
    pub namespace: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_provision_legacy() {
        let cli = Cli::try_parse_from([
            "edgectl", "provision", "-o", "org", "-e", "env", "-u", "user", "-p", "pw",
            "--legacy",
        ])
        .unwrap();
        assert_eq!(cli.root.org.as_deref(), Some("org"));
        assert_eq!(cli.root.env.as_deref(), Some("env"));
        assert!(cli.root.legacy);
        match cli.command {
            Command::Provision(args) => {
                assert_eq!(args.namespace, "apigee");
                assert_eq!(args.virtual_hosts, vec!["default", "secure"]);
                assert!(!args.verify_only);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_legacy_and_opdk_conflict() {
        let result = Cli::try_parse_from(["edgectl", "provision", "--legacy", "--opdk"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_token_subcommands() {
        let cli = Cli::try_parse_from([
            "edgectl", "token", "create", "--runtime", "https://rt", "--id", "i", "--secret", "s",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Token(TokenCommand::Create(_))));
        assert_eq!(cli.root.runtime.as_deref(), Some("https://rt"));

        let cli = Cli::try_parse_from(["edgectl", "token", "rotate-cert", "-c", "cfg.yaml"]).unwrap();
        match cli.command {
            Command::Token(TokenCommand::RotateCert(args)) => assert_eq!(args.truncate, 2),
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from([
            "edgectl", "token", "create-secret", "-o", "org", "-e", "env", "-n", "istio",
        ])
        .unwrap();
        match cli.command {
            Command::Token(TokenCommand::CreateSecret(args)) => assert_eq!(args.namespace, "istio"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_token_create_requires_id() {
        let result = Cli::try_parse_from(["edgectl", "token", "create", "--secret", "s"]);
        assert!(result.is_err());
    }
}
