// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire types for the management API and the remote-service proxy.

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Proxies & deployments
// =============================================================================

/// An API proxy and its imported revisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiProxy {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub revision: Vec<String>,
}

impl ApiProxy {
    /// Highest numeric revision, if any.
    pub fn latest_revision(&self) -> Option<u32> {
        self.revision.iter().filter_map(|r| r.parse().ok()).max()
    }
}

/// Deployment status of a proxy in one environment.
///
/// Legacy and OPDK report `revision: [{name, state}]`; hybrid reports
/// `deployments: [{revision}]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyDeployments {
    #[serde(default)]
    pub revision: Vec<DeployedRevision>,
    #[serde(default)]
    pub deployments: Vec<EnvironmentDeployment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployedRevision {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentDeployment {
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub revision: String,
}

impl ProxyDeployments {
    /// Revisions currently deployed, in the order reported.
    pub fn deployed_revisions(&self) -> Vec<u32> {
        let legacy = self
            .revision
            .iter()
            .filter(|r| r.state.is_empty() || r.state.eq_ignore_ascii_case("deployed"))
            .filter_map(|r| r.name.parse().ok());
        let hybrid = self.deployments.iter().filter_map(|d| d.revision.parse().ok());
        legacy.chain(hybrid).collect()
    }
}

/// Response to a bundle import.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportedRevision {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_revision")]
    pub revision: Option<u32>,
}

// The control plane reports revisions as strings, older releases as numbers.
fn de_revision<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

// =============================================================================
// Environment resources
// =============================================================================

/// Environment cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cache {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_settings: Option<ExpirySettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirySettings {
    pub timeout_in_sec: ExpiryValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiryValue {
    pub value: String,
}

impl Cache {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            expiry_settings: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.expiry_settings = Some(ExpirySettings {
            timeout_in_sec: ExpiryValue {
                value: secs.to_string(),
            },
        });
        self
    }
}

/// Environment key-value map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValueMap {
    pub name: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<KvmEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvmEntry {
    pub name: String,
    pub value: String,
}

impl KeyValueMap {
    pub fn encrypted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            encrypted: true,
            entry: Vec::new(),
        }
    }

    pub fn with_entry(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entry.push(KvmEntry {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

// =============================================================================
// Products, developers, apps
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// API product granting access to the remote-service proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProduct {
    pub name: String,
    pub display_name: String,
    pub approval_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub api_resources: Vec<String>,
    #[serde(default)]
    pub environments: Vec<String>,
    #[serde(default)]
    pub proxies: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// Developer owning the remote-service app.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Developer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// Developer app; the management API returns its credentials on create/get.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub api_products: Vec<String>,
    #[serde(default, skip_serializing)]
    pub credentials: Vec<AppCredential>,
}

impl App {
    pub fn new(name: impl Into<String>, products: Vec<String>) -> Self {
        Self {
            name: name.into(),
            api_products: products,
            credentials: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppCredential {
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
}

/// Credential issued by the internal proxy (legacy and OPDK).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCredential {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub secret: String,
}

// =============================================================================
// Remote-service proxy
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest {
    pub client_id: String,
    pub client_secret: String,
    pub grant_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: String,
}

/// New signing material for the proxy.
#[derive(Debug, Clone, Serialize)]
pub struct RotateRequest {
    pub kid: String,
    pub private_key: String,
    /// Serialized JWKS the proxy publishes after the rotation.
    pub certificate: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyApiKeyRequest {
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRequest {
    pub identifier: String,
    pub weight: i64,
    pub interval: i64,
    pub allow: i64,
    pub time_unit: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_deployments_shape() {
        let deployments: ProxyDeployments = serde_json::from_str(
            r#"{"name":"remote-service","revision":[
                {"name":"3","state":"deployed"},
                {"name":"2","state":"undeployed"}]}"#,
        )
        .unwrap();
        assert_eq!(deployments.deployed_revisions(), vec![3]);
    }

    #[test]
    fn test_hybrid_deployments_shape() {
        let deployments: ProxyDeployments = serde_json::from_str(
            r#"{"deployments":[{"environment":"test","apiProxy":"remote-service","revision":"7"}]}"#,
        )
        .unwrap();
        assert_eq!(deployments.deployed_revisions(), vec![7]);
    }

    #[test]
    fn test_empty_deployments() {
        let deployments: ProxyDeployments = serde_json::from_str("{}").unwrap();
        assert!(deployments.deployed_revisions().is_empty());
    }

    #[test]
    fn test_imported_revision_string_or_number() {
        let r: ImportedRevision = serde_json::from_str(r#"{"revision":"4"}"#).unwrap();
        assert_eq!(r.revision, Some(4));
        let r: ImportedRevision = serde_json::from_str(r#"{"revision":5}"#).unwrap();
        assert_eq!(r.revision, Some(5));
        let r: ImportedRevision = serde_json::from_str("{}").unwrap();
        assert_eq!(r.revision, None);
    }

    #[test]
    fn test_latest_revision() {
        let proxy = ApiProxy {
            name: "remote-service".into(),
            revision: vec!["1".into(), "10".into(), "2".into()],
        };
        assert_eq!(proxy.latest_revision(), Some(10));
        assert_eq!(ApiProxy::default().latest_revision(), None);
    }

    #[test]
    fn test_app_credentials_not_serialized() {
        let mut app = App::new("remote-service", vec!["remote-service".into()]);
        app.credentials.push(AppCredential {
            consumer_key: "k".into(),
            consumer_secret: "s".into(),
        });
        let json = serde_json::to_value(&app).unwrap();
        assert_eq!(json["apiProducts"][0], "remote-service");
        assert!(json.get("credentials").is_none());
    }

    #[test]
    fn test_cache_expiry_shape() {
        let cache = Cache::new("remote-service").with_timeout_secs(300);
        let json = serde_json::to_value(&cache).unwrap();
        assert_eq!(json["expirySettings"]["timeoutInSec"]["value"], "300");
    }
}
