// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tenant config file shared with the envoy adapter.
//!
//! ```yaml
//! tenant:
//!   internal_api: https://istioservices.apigee.net/edgemicro
//!   remote_service_api: https://org-env.apigee.net/remote-service
//!   org_name: org
//!   env_name: env
//!   key: ...
//!   secret: ...
//! ```
//!
//! The ConfigMap printed by `provision` is accepted as well; the tenant
//! block is then read from its `config.yaml` data entry.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

/// Key of the ConfigMap data entry holding the tenant document.
pub const CONFIG_MAP_ENTRY: &str = "config.yaml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub internal_api: String,
    #[serde(default)]
    pub remote_service_api: String,
    #[serde(default)]
    pub org_name: String,
    #[serde(default)]
    pub env_name: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_unverified_ssl_cert: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    tenant: TenantConfig,
}

impl TenantConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
            .map_err(|e| CliError::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Parse a tenant document or a YAML stream containing the ConfigMap.
    pub fn parse(text: &str) -> Result<Self> {
        for document in serde_yaml::Deserializer::from_str(text) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.get("tenant").is_some() {
                return Ok(serde_yaml::from_value::<ConfigFile>(value)?.tenant);
            }
            if let Some(inner) = value
                .get("data")
                .and_then(|data| data.get(CONFIG_MAP_ENTRY))
                .and_then(|entry| entry.as_str())
            {
                return Ok(serde_yaml::from_str::<ConfigFile>(inner)?.tenant);
            }
        }
        Err(CliError::Config("no tenant section found".to_string()))
    }

    /// Render as a standalone tenant document.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&ConfigFile {
            tenant: self.clone(),
        })?)
    }

    pub(crate) fn non_empty(value: &str) -> Option<String> {
        (!value.is_empty()).then(|| value.to_string())
    }
}
