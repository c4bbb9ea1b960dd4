// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! edgectl client
//!
//! HTTP clients for the two remote parties `edgectl` talks to:
//!
//! - [`ManagementClient`]: the management control plane (proxies, deployments,
//!   caches, key-value maps, API products, developers, apps).
//! - [`RemoteServiceClient`]: the deployed remote-service proxy (JWKS, token
//!   issuance, key rotation, API key and quota checks).
//!
//! # Example
//!
//! ```no_run
//! use edgectl_client::{Auth, ClientConfig, ManagementClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("https://apigee.googleapis.com")
//!     .with_auth(Auth::bearer("ya29.token"));
//! let client = ManagementClient::new(config, "my-org", "test")?;
//!
//! if let Some(deployments) = client.get_deployments("remote-service").await? {
//!     println!("deployed: {:?}", deployments.deployed_revisions());
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod management;
mod remote;
mod transport;
mod types;

pub use config::{Auth, ClientConfig, build_http_client};
pub use error::{ClientError, Result};
pub use management::ManagementClient;
pub use remote::RemoteServiceClient;
pub use types::{
    ApiProduct, ApiProxy, App, AppCredential, Attribute, Cache, DeployedRevision, Developer,
    EnvironmentDeployment, ImportedRevision, KeyValueMap, KvmEntry, LegacyCredential,
    ProxyDeployments, QuotaRequest, RotateRequest, TokenRequest, TokenResponse,
    VerifyApiKeyRequest,
};
