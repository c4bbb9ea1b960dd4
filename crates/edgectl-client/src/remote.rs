// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Client for the deployed remote-service proxy.

use reqwest::Method;
use tracing::instrument;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{
    QuotaRequest, RotateRequest, TokenRequest, TokenResponse, VerifyApiKeyRequest,
};

/// Client for `{runtime}/remote-service`.
///
/// Authentication is the app key/secret as HTTP Basic, set through
/// [`ClientConfig::auth`].
pub struct RemoteServiceClient {
    transport: Transport,
}

impl RemoteServiceClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(config)?,
        })
    }

    /// Raw JWKS document published by the proxy.
    #[instrument(skip(self))]
    pub async fn certs(&self) -> Result<Vec<u8>> {
        let response = self
            .transport
            .send(self.transport.request(Method::GET, "certs"))
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    #[instrument(skip(self))]
    pub async fn products(&self) -> Result<serde_json::Value> {
        self.transport
            .send_json(self.transport.request(Method::GET, "products"))
            .await
    }

    #[instrument(skip(self, api_key))]
    pub async fn verify_api_key(&self, api_key: &str) -> Result<serde_json::Value> {
        let request = VerifyApiKeyRequest {
            api_key: api_key.to_string(),
        };
        self.transport
            .send_json(self.transport.request(Method::POST, "verifyApiKey").json(&request))
            .await
    }

    #[instrument(skip(self, request), fields(identifier = %request.identifier))]
    pub async fn quotas(&self, request: &QuotaRequest) -> Result<serde_json::Value> {
        self.transport
            .send_json(self.transport.request(Method::POST, "quotas").json(request))
            .await
    }

    /// Exchange client credentials for a signed token.
    #[instrument(skip(self, client_secret))]
    pub async fn create_token(&self, client_id: &str, client_secret: &str) -> Result<String> {
        let request = TokenRequest {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            grant_type: "client_credentials".to_string(),
        };
        let response: TokenResponse = self
            .transport
            .send_json(self.transport.request(Method::POST, "token").json(&request))
            .await?;
        Ok(response.token)
    }

    /// Publish new signing material.
    #[instrument(skip(self, request), fields(kid = %request.kid))]
    pub async fn rotate(&self, request: &RotateRequest) -> Result<()> {
        self.transport
            .send_unit(self.transport.request(Method::POST, "rotate").json(request))
            .await
    }
}
