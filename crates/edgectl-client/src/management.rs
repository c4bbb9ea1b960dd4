// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Client for the management control plane.

use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::transport::Transport;
use crate::types::{
    ApiProduct, ApiProxy, App, Cache, Developer, ImportedRevision, KeyValueMap, LegacyCredential,
    ProxyDeployments,
};

/// Management API client bound to one organization and environment.
///
/// Every path is resolved under `{base}/v1/organizations/{org}`. Non-success
/// statuses surface as [`ClientError::Status`]; callers decide which of them
/// (e.g. 409 on create) are acceptable.
pub struct ManagementClient {
    transport: Transport,
    org: String,
    env: String,
}

impl ManagementClient {
    /// Create a client for `org`/`env` against the management base URL in `config`.
    pub fn new(config: ClientConfig, org: impl Into<String>, env: impl Into<String>) -> Result<Self> {
        let org = org.into();
        let env = env.into();
        if org.is_empty() || env.is_empty() {
            return Err(ClientError::Config(
                "organization and environment are required".to_string(),
            ));
        }
        Ok(Self {
            transport: Transport::new(config)?,
            org,
            env,
        })
    }

    fn org_path(&self, rest: &str) -> String {
        format!("v1/organizations/{}/{}", self.org, rest)
    }

    fn env_path(&self, rest: &str) -> String {
        format!("v1/organizations/{}/environments/{}/{}", self.org, self.env, rest)
    }

    // =========================================================================
    // Proxies
    // =========================================================================

    /// Fetch a proxy and its revisions; `None` if it was never imported.
    #[instrument(skip(self))]
    pub async fn get_proxy(&self, name: &str) -> Result<Option<ApiProxy>> {
        let builder = self
            .transport
            .request(Method::GET, &self.org_path(&format!("apis/{}", name)));
        match self.transport.send_json(builder).await {
            Ok(proxy) => Ok(Some(proxy)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch the proxy's deployments in this environment; `None` if there are none.
    #[instrument(skip(self))]
    pub async fn get_deployments(&self, name: &str) -> Result<Option<ProxyDeployments>> {
        let builder = self.transport.request(
            Method::GET,
            &self.env_path(&format!("apis/{}/deployments", name)),
        );
        match self.transport.send_json(builder).await {
            Ok(deployments) => Ok(Some(deployments)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Import a zipped proxy bundle as a new revision.
    #[instrument(skip(self, bundle), fields(bundle_len = bundle.len()))]
    pub async fn import_proxy(&self, name: &str, bundle: Vec<u8>) -> Result<ImportedRevision> {
        let part = Part::bytes(bundle)
            .file_name(format!("{}.zip", name))
            .mime_str("application/octet-stream")
            .map_err(|e| ClientError::InvalidInput(e.to_string()))?;
        let builder = self
            .transport
            .request(Method::POST, &self.org_path("apis"))
            .query(&[("action", "import"), ("name", name), ("validate", "false")])
            .multipart(Form::new().part("file", part));

        let imported: ImportedRevision = self.transport.send_json(builder).await?;
        debug!(revision = ?imported.revision, "bundle imported");
        Ok(imported)
    }

    /// Deploy `revision` of the proxy to this environment, replacing any other.
    #[instrument(skip(self))]
    pub async fn deploy_proxy(&self, name: &str, revision: u32) -> Result<()> {
        let builder = self
            .transport
            .request(
                Method::POST,
                &self.env_path(&format!("apis/{}/revisions/{}/deployments", name, revision)),
            )
            .query(&[("override", "true")])
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.transport.send_unit(builder).await
    }

    // =========================================================================
    // Environment resources
    // =========================================================================

    #[instrument(skip(self, cache), fields(cache = %cache.name))]
    pub async fn create_cache(&self, cache: &Cache) -> Result<()> {
        let builder = self
            .transport
            .request(Method::POST, &self.env_path("caches"))
            .query(&[("name", cache.name.as_str())])
            .json(cache);
        self.transport.send_unit(builder).await
    }

    #[instrument(skip(self, kvm), fields(kvm = %kvm.name, entries = kvm.entry.len()))]
    pub async fn create_kvm(&self, kvm: &KeyValueMap) -> Result<()> {
        let builder = self
            .transport
            .request(Method::POST, &self.env_path("keyvaluemaps"))
            .json(kvm);
        self.transport.send_unit(builder).await
    }

    // =========================================================================
    // Products, developers, apps
    // =========================================================================

    #[instrument(skip(self, product), fields(product = %product.name))]
    pub async fn create_api_product(&self, product: &ApiProduct) -> Result<()> {
        let builder = self
            .transport
            .request(Method::POST, &self.org_path("apiproducts"))
            .json(product);
        self.transport.send_unit(builder).await
    }

    #[instrument(skip(self, developer), fields(developer = %developer.email))]
    pub async fn create_developer(&self, developer: &Developer) -> Result<()> {
        let builder = self
            .transport
            .request(Method::POST, &self.org_path("developers"))
            .json(developer);
        self.transport.send_unit(builder).await
    }

    /// Create an app; the response carries the generated credentials.
    #[instrument(skip(self, app), fields(app = %app.name))]
    pub async fn create_app(&self, developer_email: &str, app: &App) -> Result<App> {
        let builder = self
            .transport
            .request(
                Method::POST,
                &self.org_path(&format!("developers/{}/apps", developer_email)),
            )
            .json(app);
        self.transport.send_json(builder).await
    }

    #[instrument(skip(self))]
    pub async fn get_app(&self, developer_email: &str, name: &str) -> Result<App> {
        let builder = self.transport.request(
            Method::GET,
            &self.org_path(&format!("developers/{}/apps/{}", developer_email, name)),
        );
        self.transport.send_json(builder).await
    }

    // =========================================================================
    // Internal proxy
    // =========================================================================

    /// Ask the internal proxy (legacy/OPDK) to issue a credential for this org/env.
    #[instrument(skip(self))]
    pub async fn create_legacy_credential(&self, internal_url: &str) -> Result<LegacyCredential> {
        let url = format!(
            "{}/credential/organization/{}/environment/{}",
            internal_url.trim_end_matches('/'),
            self.org,
            self.env
        );
        let builder = self
            .transport
            .request_url(Method::POST, &url)
            .json(&serde_json::json!({}));
        self.transport.send_json(builder).await
    }
}
