// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provisioning context: flags and tenant config resolved into the URLs and
//! credentials of one run.

use std::fmt;

use edgectl_client::{Auth, ClientConfig, ManagementClient, RemoteServiceClient};

use crate::cli::RootArgs;
use crate::error::{CliError, Result};
use crate::tenant::TenantConfig;

pub const LEGACY_MANAGEMENT_URL: &str = "https://api.enterprise.apigee.com";
pub const LEGACY_INTERNAL_URL: &str = "https://istioservices.apigee.net/edgemicro";
pub const HYBRID_MANAGEMENT_URL: &str = "https://apigee.googleapis.com";

/// Path of the remote-service proxy under the runtime URL.
pub const REMOTE_SERVICE_BASE_PATH: &str = "/remote-service";
/// Path of the internal proxy under the OPDK runtime URL.
pub const INTERNAL_BASE_PATH: &str = "/edgemicro";

/// Management platform topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Legacy SaaS.
    Legacy,
    /// Hybrid / GCP-managed.
    Hybrid,
    /// On-premises.
    Opdk,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Legacy => "legacy",
            Mode::Hybrid => "hybrid",
            Mode::Opdk => "opdk",
        })
    }
}

/// App key/secret the remote-service proxy authenticates callers with.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProxyCredential {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for ProxyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredential")
            .field("key", &self.key)
            .field("secret", &"***")
            .finish()
    }
}

/// What a command needs resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Org, env, management URL and management credentials.
    pub require_management: bool,
    /// The remote-service proxy URL.
    pub require_runtime: bool,
}

impl ResolveOptions {
    pub fn provisioning() -> Self {
        Self {
            require_management: true,
            require_runtime: true,
        }
    }

    pub fn runtime_only() -> Self {
        Self {
            require_management: false,
            require_runtime: true,
        }
    }
}

/// Immutable inputs of one run.
#[derive(Debug, Clone)]
pub struct Context {
    pub mode: Mode,
    pub org: String,
    pub env: String,
    pub management_url: Option<String>,
    pub remote_service_url: Option<String>,
    pub internal_url: Option<String>,
    pub management_auth: Auth,
    pub credential: Option<ProxyCredential>,
    pub insecure: bool,
}

impl RootArgs {
    pub fn resolve(&self, options: ResolveOptions) -> Result<Context> {
        let tenant = self
            .config
            .as_deref()
            .map(TenantConfig::load)
            .transpose()?
            .unwrap_or_default();

        let mode = match (self.legacy, self.opdk) {
            (true, true) => {
                return Err(CliError::Config(
                    "--legacy and --opdk are mutually exclusive".to_string(),
                ));
            }
            (true, false) => Mode::Legacy,
            (false, true) => Mode::Opdk,
            (false, false) => Mode::Hybrid,
        };

        let org = pick(&self.org, &tenant.org_name).unwrap_or_default();
        let env = pick(&self.env, &tenant.env_name).unwrap_or_default();

        let management_url = self.management.clone().or_else(|| match mode {
            Mode::Legacy => Some(LEGACY_MANAGEMENT_URL.to_string()),
            Mode::Hybrid => Some(HYBRID_MANAGEMENT_URL.to_string()),
            Mode::Opdk => None,
        });

        let runtime_url = self
            .runtime
            .as_deref()
            .map(|r| r.trim_end_matches('/').to_string());

        let remote_service_url = match (&runtime_url, TenantConfig::non_empty(&tenant.remote_service_api)) {
            (Some(runtime), _) => Some(format!("{}{}", runtime, REMOTE_SERVICE_BASE_PATH)),
            (None, Some(from_config)) => Some(from_config),
            (None, None) if mode == Mode::Legacy && !org.is_empty() && !env.is_empty() => Some(
                format!("https://{}-{}.apigee.net{}", org, env, REMOTE_SERVICE_BASE_PATH),
            ),
            (None, None) => None,
        };

        let internal_url = pick(&self.internal_api, &tenant.internal_api).or_else(|| match mode {
            Mode::Legacy => Some(LEGACY_INTERNAL_URL.to_string()),
            Mode::Opdk => runtime_url
                .as_ref()
                .map(|runtime| format!("{}{}", runtime, INTERNAL_BASE_PATH)),
            Mode::Hybrid => None,
        });

        let management_auth = match mode {
            Mode::Legacy | Mode::Opdk => match (&self.username, &self.password) {
                (Some(user), Some(password)) => Auth::basic(user, password),
                _ => Auth::None,
            },
            Mode::Hybrid => self.token.as_ref().map(Auth::bearer).unwrap_or_default(),
        };

        let credential = match (
            TenantConfig::non_empty(&tenant.key),
            TenantConfig::non_empty(&tenant.secret),
        ) {
            (Some(key), Some(secret)) => Some(ProxyCredential { key, secret }),
            _ => None,
        };

        let context = Context {
            mode,
            org,
            env,
            management_url,
            remote_service_url,
            internal_url,
            management_auth,
            credential,
            insecure: self.insecure || tenant.allow_unverified_ssl_cert,
        };
        context.check(options)?;
        Ok(context)
    }
}

fn pick(flag: &Option<String>, from_config: &str) -> Option<String> {
    flag.clone()
        .filter(|v| !v.is_empty())
        .or_else(|| TenantConfig::non_empty(from_config))
}

fn check_url(name: &str, value: &Option<String>) -> Result<()> {
    if let Some(value) = value {
        let parsed = url::Url::parse(value)
            .map_err(|e| CliError::Config(format!("invalid {} URL {}: {}", name, value, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CliError::Config(format!(
                "{} URL must be http or https: {}",
                name, value
            )));
        }
    }
    Ok(())
}

impl Context {
    fn check(&self, options: ResolveOptions) -> Result<()> {
        check_url("management", &self.management_url)?;
        check_url("remote-service", &self.remote_service_url)?;
        check_url("internal proxy", &self.internal_url)?;

        if options.require_management {
            if self.org.is_empty() || self.env.is_empty() {
                return Err(CliError::Config(
                    "--org and --env are required".to_string(),
                ));
            }
            if self.management_url.is_none() {
                return Err(CliError::Config(
                    "--management is required for OPDK".to_string(),
                ));
            }
            if self.management_auth == Auth::None {
                return Err(CliError::Config(match self.mode {
                    Mode::Hybrid => "--token is required for hybrid".to_string(),
                    _ => "--username and --password are required".to_string(),
                }));
            }
        }

        if options.require_runtime && self.remote_service_url.is_none() {
            return Err(CliError::Config(
                "--runtime is required (or a config file with remote_service_api)".to_string(),
            ));
        }
        Ok(())
    }

    fn client_config(&self, base_url: &str) -> ClientConfig {
        ClientConfig::new(base_url).with_skip_cert_verification(self.insecure)
    }

    /// Management client bound to this org/env.
    pub fn management_client(&self) -> Result<ManagementClient> {
        let url = self
            .management_url
            .as_deref()
            .ok_or_else(|| CliError::Config("management URL is not set".to_string()))?;
        let config = self
            .client_config(url)
            .with_auth(self.management_auth.clone());
        Ok(ManagementClient::new(config, &self.org, &self.env)?)
    }

    /// Client for the remote-service proxy, authenticated with `credential`.
    pub fn remote_service_client(
        &self,
        credential: Option<&ProxyCredential>,
    ) -> Result<RemoteServiceClient> {
        let url = self
            .remote_service_url
            .as_deref()
            .ok_or_else(|| CliError::Config("remote-service URL is not set".to_string()))?;
        let auth = credential
            .map(|c| Auth::basic(&c.key, &c.secret))
            .unwrap_or_default();
        Ok(RemoteServiceClient::new(
            self.client_config(url).with_auth(auth),
        )?)
    }

    /// Tenant document describing this context and `credential`.
    pub fn tenant_config(&self, credential: &ProxyCredential) -> TenantConfig {
        TenantConfig {
            internal_api: self.internal_url.clone().unwrap_or_default(),
            remote_service_api: self.remote_service_url.clone().unwrap_or_default(),
            org_name: self.org.clone(),
            env_name: self.env.clone(),
            key: credential.key.clone(),
            secret: credential.secret.clone(),
            allow_unverified_ssl_cert: self.insecure,
        }
    }
}
