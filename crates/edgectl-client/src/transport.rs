// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request plumbing shared by both clients.

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{ClientConfig, build_http_client};
use crate::error::{ClientError, Result};

pub(crate) struct Transport {
    http: reqwest::Client,
    config: ClientConfig,
}

impl Transport {
    pub(crate) fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let http = build_http_client(&config)?;
        Ok(Self { http, config })
    }

    /// Request against the configured base URL.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, &self.config.url(path))
    }

    /// Request against an absolute URL, still using the configured credentials.
    pub(crate) fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        self.config.auth.apply(self.http.request(method, url))
    }

    /// Send and fail on non-success statuses.
    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder
            .build()
            .map_err(|e| ClientError::InvalidInput(e.to_string()))?;
        let method = request.method().clone();
        let url = request.url().to_string();

        debug!(%method, %url, "sending request");
        let response = self.http.execute(request).await?;
        let status = response.status();
        debug!(%method, %url, status = status.as_u16(), "received response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            url,
            body,
        })
    }

    /// Send and decode a JSON body. An empty body decodes as `{}`.
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder).await?;
        let url = response.url().to_string();
        let bytes = response.bytes().await?;
        let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };
        serde_json::from_slice(body)
            .map_err(|e| ClientError::UnexpectedResponse(format!("{}: {}", url, e)))
    }

    /// Send and discard the body.
    pub(crate) async fn send_unit(&self, builder: RequestBuilder) -> Result<()> {
        self.send(builder).await.map(drop)
    }
}
