// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kubernetes manifests consumed by the envoy adapter.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::tenant::{CONFIG_MAP_ENTRY, TenantConfig};
use crate::token::{JwkSet, SigningKey};

/// Name of the adapter the manifests configure.
pub const ADAPTER_NAME: &str = "apigee-remote-service-envoy";

pub const SECRET_JWKS_ENTRY: &str = "remote-service.crt";
pub const SECRET_PRIVATE_KEY_ENTRY: &str = "remote-service.key";
pub const SECRET_PROPERTIES_ENTRY: &str = "remote-service.properties";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    api_version: &'static str,
    kind: &'static str,
    metadata: Metadata,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    secret_type: Option<&'static str>,
    data: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct Metadata {
    name: String,
    namespace: String,
}

fn generated_on() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn policy_secret_name(org: &str, env: &str) -> String {
    format!("{}-{}-policy-secret", org, env)
}

/// Secret holding the signing key the adapter issues tokens with.
pub fn policy_secret(
    org: &str,
    env: &str,
    namespace: &str,
    key: &SigningKey,
    keys: &JwkSet,
) -> Result<String> {
    let mut data = BTreeMap::new();
    data.insert(
        SECRET_JWKS_ENTRY.to_string(),
        STANDARD.encode(keys.to_json()?),
    );
    data.insert(
        SECRET_PRIVATE_KEY_ENTRY.to_string(),
        STANDARD.encode(key.private_key_pem()?),
    );
    data.insert(
        SECRET_PROPERTIES_ENTRY.to_string(),
        STANDARD.encode(format!("kid={}", key.kid())),
    );

    let manifest = Manifest {
        api_version: "v1",
        kind: "Secret",
        metadata: Metadata {
            name: policy_secret_name(org, env),
            namespace: namespace.to_string(),
        },
        secret_type: Some("Opaque"),
        data,
    };
    Ok(format!(
        "# Secret for {}\n# generated by edgectl on {}\n{}",
        ADAPTER_NAME,
        generated_on(),
        serde_yaml::to_string(&manifest)?
    ))
}

/// ConfigMap carrying the tenant config.
pub fn config_map(namespace: &str, tenant: &TenantConfig) -> Result<String> {
    let mut data = BTreeMap::new();
    data.insert(CONFIG_MAP_ENTRY.to_string(), tenant.to_yaml()?);

    let manifest = Manifest {
        api_version: "v1",
        kind: "ConfigMap",
        metadata: Metadata {
            name: ADAPTER_NAME.to_string(),
            namespace: namespace.to_string(),
        },
        secret_type: None,
        data,
    };
    Ok(format!(
        "# Configuration for {}\n# generated by edgectl provision on {}\n{}",
        ADAPTER_NAME,
        generated_on(),
        serde_yaml::to_string(&manifest)?
    ))
}

/// Join documents into one YAML stream.
pub fn stream(documents: &[String]) -> String {
    documents.join("---\n")
}
