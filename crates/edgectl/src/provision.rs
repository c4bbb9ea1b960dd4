// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provisioning workflow.
//!
//! A run executes the fixed plan of its mode step by step. A step either
//! creates its resource, finds it already present, or fails; the first
//! failure stops the run and nothing already created is rolled back.
//!
//! ```text
//! legacy:  deploy remote-service -> cache -> kvm -> credential -> verify
//! opdk:    deploy internal -> deploy remote-service -> cache -> kvm -> credential -> verify
//! hybrid:  deploy remote-service -> cache -> kvm -> product -> developer -> app -> verify
//! ```

use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use edgectl_client::{
    ApiProduct, App, Attribute, Cache, ClientError, Developer, KeyValueMap, ManagementClient,
    QuotaRequest,
};
use tracing::{debug, info, instrument, warn};

use crate::bundle::{self, ProxyKind};
use crate::cli::{ProvisionArgs, RootArgs};
use crate::context::{Context, Mode, ProxyCredential, ResolveOptions};
use crate::error::{CliError, Result};
use crate::manifest;
use crate::token::{JwkSet, SigningKey, default_kid};

/// Name shared by the cache, KVM, product and app the proxy relies on.
pub const RESOURCE_NAME: &str = "remote-service";

pub const KVM_PRIVATE_KEY: &str = "private_key";
pub const KVM_CERTS: &str = "certs";
pub const KVM_KID: &str = "kid";

/// Identifier of the quota bucket exercised during verification.
const VERIFY_QUOTA_IDENTIFIER: &str = "remote-service-verify";

// ============================================================================
// Plan
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    DeployInternalProxy,
    DeployRemoteServiceProxy,
    CreateCache,
    CreateKeyValueMap,
    CreateApiProduct,
    CreateDeveloper,
    CreateApp,
    CreateLegacyCredential,
    VerifyProxy,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::DeployInternalProxy => "deploy internal proxy",
            Step::DeployRemoteServiceProxy => "deploy remote-service proxy",
            Step::CreateCache => "create cache",
            Step::CreateKeyValueMap => "create key-value map",
            Step::CreateApiProduct => "create API product",
            Step::CreateDeveloper => "create developer",
            Step::CreateApp => "create app",
            Step::CreateLegacyCredential => "create credential",
            Step::VerifyProxy => "verify remote-service proxy",
        })
    }
}

/// Ordered steps of a run.
pub fn plan(mode: Mode, verify_only: bool) -> Vec<Step> {
    use Step::*;

    if verify_only {
        return vec![VerifyProxy];
    }
    match mode {
        Mode::Legacy => vec![
            DeployRemoteServiceProxy,
            CreateCache,
            CreateKeyValueMap,
            CreateLegacyCredential,
            VerifyProxy,
        ],
        Mode::Opdk => vec![
            DeployInternalProxy,
            DeployRemoteServiceProxy,
            CreateCache,
            CreateKeyValueMap,
            CreateLegacyCredential,
            VerifyProxy,
        ],
        Mode::Hybrid => vec![
            DeployRemoteServiceProxy,
            CreateCache,
            CreateKeyValueMap,
            CreateApiProduct,
            CreateDeveloper,
            CreateApp,
            VerifyProxy,
        ],
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: Step,
    pub status: StepStatus,
}

#[derive(Debug, Default)]
pub struct ProvisionReport {
    pub steps: Vec<StepReport>,
    /// Credential the proxy was provisioned (or verified) with.
    pub credential: Option<ProxyCredential>,
    /// Hybrid signing key, shipped in the policy Secret.
    pub signing_key: Option<SigningKey>,
}

// ============================================================================
// Provisioner
// ============================================================================

/// Options of `edgectl provision` that shape the run.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub developer_email: Option<String>,
    pub namespace: String,
    pub force_proxy_install: bool,
    pub virtual_hosts: Vec<String>,
    pub verify_only: bool,
    pub bundle: Option<PathBuf>,
    pub out: Option<PathBuf>,
}

impl From<&ProvisionArgs> for ProvisionOptions {
    fn from(args: &ProvisionArgs) -> Self {
        Self {
            developer_email: args.developer_email.clone().filter(|e| !e.is_empty()),
            namespace: args.namespace.clone(),
            force_proxy_install: args.force_proxy_install,
            virtual_hosts: args.virtual_hosts.clone(),
            verify_only: args.verify_only,
            bundle: args.bundle.clone(),
            out: args.out.clone(),
        }
    }
}

pub struct Provisioner {
    ctx: Context,
    options: ProvisionOptions,
    management: Option<ManagementClient>,
}

impl Provisioner {
    pub fn new(ctx: Context, options: ProvisionOptions) -> Result<Self> {
        let management = if options.verify_only {
            if ctx.credential.is_none() {
                warn!("no key and secret configured, verifying without credentials");
            }
            None
        } else {
            if ctx.mode == Mode::Hybrid && options.developer_email.is_none() {
                return Err(CliError::Config(
                    "--developer-email is required for hybrid".to_string(),
                ));
            }
            Some(ctx.management_client()?)
        };
        Ok(Self {
            ctx,
            options,
            management,
        })
    }

    /// Execute the plan, then write the adapter manifests to `out`.
    pub async fn run(&self, out: &mut dyn Write) -> Result<ProvisionReport> {
        let report = self
            .run_steps(&plan(self.ctx.mode, self.options.verify_only))
            .await?;

        let Some(manifests) = self.render(&report)? else {
            info!("no proxy credential, no manifests emitted");
            return Ok(report);
        };
        out.write_all(manifests.as_bytes())?;
        if let Some(path) = &self.options.out {
            std::fs::write(path, &manifests)?;
            info!(path = %path.display(), "manifests written");
        }
        Ok(report)
    }

    /// Execute `steps` in order, stopping at the first failure.
    pub async fn run_steps(&self, steps: &[Step]) -> Result<ProvisionReport> {
        let mut report = ProvisionReport {
            credential: self
                .options
                .verify_only
                .then(|| self.ctx.credential.clone())
                .flatten(),
            ..ProvisionReport::default()
        };
        info!(mode = %self.ctx.mode, org = %self.ctx.org, env = %self.ctx.env, "provisioning");

        for &step in steps {
            info!(%step, "running");
            let status = self
                .execute(step, &mut report)
                .await
                .map_err(CliError::at(step))?;
            match status {
                StepStatus::Done => info!(%step, "done"),
                StepStatus::AlreadyExists => info!(%step, "already exists"),
            }
            report.steps.push(StepReport { step, status });
        }
        Ok(report)
    }

    async fn execute(&self, step: Step, report: &mut ProvisionReport) -> Result<StepStatus> {
        match step {
            Step::DeployInternalProxy => self.deploy_proxy(ProxyKind::Internal).await,
            Step::DeployRemoteServiceProxy => self.deploy_proxy(ProxyKind::RemoteService).await,
            Step::CreateCache => self.create_cache().await,
            Step::CreateKeyValueMap => self.create_kvm(report).await,
            Step::CreateApiProduct => self.create_api_product().await,
            Step::CreateDeveloper => self.create_developer().await,
            Step::CreateApp => {
                let (credential, status) = self.create_app().await?;
                report.credential = Some(credential);
                Ok(status)
            }
            Step::CreateLegacyCredential => {
                report.credential = Some(self.create_legacy_credential().await?);
                Ok(StepStatus::Done)
            }
            Step::VerifyProxy => {
                self.verify(report.credential.as_ref()).await?;
                Ok(StepStatus::Done)
            }
        }
    }

    fn management(&self) -> Result<&ManagementClient> {
        self.management
            .as_ref()
            .ok_or_else(|| CliError::Config("management API is not configured".to_string()))
    }

    fn developer_email(&self) -> Result<&str> {
        self.options
            .developer_email
            .as_deref()
            .ok_or_else(|| CliError::Config("--developer-email is required".to_string()))
    }

    // ========================================================================
    // Steps
    // ========================================================================

    #[instrument(skip(self), fields(proxy = kind.name()))]
    async fn deploy_proxy(&self, kind: ProxyKind) -> Result<StepStatus> {
        let mgmt = self.management()?;
        let name = kind.name();

        let deployed = mgmt
            .get_deployments(name)
            .await?
            .map(|d| d.deployed_revisions())
            .unwrap_or_default();
        if let Some(revision) = deployed.first() {
            if !self.options.force_proxy_install {
                info!(revision, "proxy already deployed, use --force-proxy-install to replace it");
                return Ok(StepStatus::AlreadyExists);
            }
            debug!(revision, "replacing deployed revision");
        }

        let latest = mgmt
            .get_proxy(name)
            .await?
            .and_then(|p| p.latest_revision())
            .unwrap_or(0);

        let bundle = match (kind, &self.options.bundle) {
            (ProxyKind::RemoteService, Some(path)) => bundle::load(path)?,
            _ => bundle::build(kind, self.ctx.mode, &self.options.virtual_hosts)?,
        };
        let imported = mgmt.import_proxy(name, bundle).await?;
        let revision = imported.revision.unwrap_or(latest + 1);

        mgmt.deploy_proxy(name, revision).await?;
        info!(revision, "proxy deployed");
        Ok(StepStatus::Done)
    }

    async fn create_cache(&self) -> Result<StepStatus> {
        let cache = Cache::new(RESOURCE_NAME)
            .with_description("Cache for the remote-service proxy")
            .with_timeout_secs(300);
        tolerate_conflict(self.management()?.create_cache(&cache).await)
    }

    async fn create_kvm(&self, report: &mut ProvisionReport) -> Result<StepStatus> {
        let key = SigningKey::generate(default_kid())?;
        let kvm = match self.ctx.mode {
            Mode::Legacy | Mode::Opdk => {
                let keys = JwkSet {
                    keys: vec![key.public_jwk()],
                };
                KeyValueMap::encrypted(RESOURCE_NAME)
                    .with_entry(KVM_PRIVATE_KEY, key.private_key_pem()?)
                    .with_entry(KVM_CERTS, keys.to_json()?)
                    .with_entry(KVM_KID, key.kid())
            }
            Mode::Hybrid => KeyValueMap::encrypted(RESOURCE_NAME),
        };

        let status = tolerate_conflict(self.management()?.create_kvm(&kvm).await)?;
        if self.ctx.mode == Mode::Hybrid {
            report.signing_key = Some(key);
        } else if status == StepStatus::AlreadyExists {
            warn!("existing key-value map kept, its signing key was not replaced");
        }
        Ok(status)
    }

    async fn create_api_product(&self) -> Result<StepStatus> {
        let product = ApiProduct {
            name: RESOURCE_NAME.to_string(),
            display_name: RESOURCE_NAME.to_string(),
            approval_type: "auto".to_string(),
            description: "Access to the remote-service proxy".to_string(),
            api_resources: vec!["/**".to_string()],
            environments: vec![self.ctx.env.clone()],
            proxies: vec![ProxyKind::RemoteService.name().to_string()],
            attributes: vec![Attribute {
                name: "access".to_string(),
                value: "internal".to_string(),
            }],
        };
        tolerate_conflict(self.management()?.create_api_product(&product).await)
    }

    async fn create_developer(&self) -> Result<StepStatus> {
        let email = self.developer_email()?;
        let developer = Developer {
            email: email.to_string(),
            first_name: "Remote".to_string(),
            last_name: "Service".to_string(),
            user_name: "remote-service".to_string(),
            attributes: Vec::new(),
        };
        tolerate_conflict(self.management()?.create_developer(&developer).await)
    }

    async fn create_app(&self) -> Result<(ProxyCredential, StepStatus)> {
        let mgmt = self.management()?;
        let email = self.developer_email()?;
        let app = App::new(RESOURCE_NAME, vec![RESOURCE_NAME.to_string()]);

        let (app, status) = match mgmt.create_app(email, &app).await {
            Ok(app) => (app, StepStatus::Done),
            Err(e) if e.is_conflict() => {
                info!("app already exists, using its credentials");
                (mgmt.get_app(email, RESOURCE_NAME).await?, StepStatus::AlreadyExists)
            }
            Err(e) => return Err(e.into()),
        };

        let credential = app.credentials.into_iter().next().ok_or_else(|| {
            ClientError::UnexpectedResponse(format!("app {} has no credentials", RESOURCE_NAME))
        })?;
        Ok((
            ProxyCredential {
                key: credential.consumer_key,
                secret: credential.consumer_secret,
            },
            status,
        ))
    }

    async fn create_legacy_credential(&self) -> Result<ProxyCredential> {
        let internal_url = self
            .ctx
            .internal_url
            .as_deref()
            .ok_or_else(|| CliError::Config("internal proxy URL is not set".to_string()))?;
        let credential = self
            .management()?
            .create_legacy_credential(internal_url)
            .await?;
        if credential.key.is_empty() || credential.secret.is_empty() {
            warn!("internal proxy returned an empty credential");
        }
        Ok(ProxyCredential {
            key: credential.key,
            secret: credential.secret,
        })
    }

    /// Call every endpoint of the deployed proxy; all checks run even after
    /// one fails. Without a credential the checks go out unauthenticated.
    #[instrument(skip(self, credential))]
    async fn verify(&self, credential: Option<&ProxyCredential>) -> Result<()> {
        let client = self.ctx.remote_service_client(credential)?;
        let api_key = credential.map(|c| c.key.as_str()).unwrap_or_default();
        let quota = QuotaRequest {
            identifier: VERIFY_QUOTA_IDENTIFIER.to_string(),
            weight: 1,
            interval: 1,
            allow: 1,
            time_unit: "minute".to_string(),
        };

        let checks = [
            ("certs", client.certs().await.map(drop)),
            ("products", client.products().await.map(drop)),
            (
                "verifyApiKey",
                client.verify_api_key(api_key).await.map(drop),
            ),
            ("quotas", client.quotas(&quota).await.map(drop)),
        ];

        let failures: Vec<String> = checks
            .into_iter()
            .filter_map(|(check, result)| result.err().map(|e| format!("{}: {}", check, e)))
            .collect();
        if failures.is_empty() {
            info!("remote-service proxy answered every check");
            Ok(())
        } else {
            Err(CliError::Verification(failures))
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    fn render(&self, report: &ProvisionReport) -> Result<Option<String>> {
        let Some(credential) = &report.credential else {
            return Ok(None);
        };

        let mut documents = vec![manifest::config_map(
            &self.options.namespace,
            &self.ctx.tenant_config(credential),
        )?];
        if let Some(key) = &report.signing_key {
            let keys = JwkSet {
                keys: vec![key.public_jwk()],
            };
            documents.push(manifest::policy_secret(
                &self.ctx.org,
                &self.ctx.env,
                &self.options.namespace,
                key,
                &keys,
            )?);
        }
        Ok(Some(manifest::stream(&documents)))
    }
}

fn tolerate_conflict(result: edgectl_client::Result<()>) -> Result<StepStatus> {
    match result {
        Ok(()) => Ok(StepStatus::Done),
        Err(e) if e.is_conflict() => Ok(StepStatus::AlreadyExists),
        Err(e) => Err(e.into()),
    }
}

/// `edgectl provision`.
pub async fn provision(
    root: &RootArgs,
    args: &ProvisionArgs,
    out: &mut dyn Write,
) -> Result<ProvisionReport> {
    let resolve = if args.verify_only {
        ResolveOptions::runtime_only()
    } else {
        ResolveOptions::provisioning()
    };
    let ctx = root.resolve(resolve)?;
    Provisioner::new(ctx, ProvisionOptions::from(args))?
        .run(out)
        .await
}
