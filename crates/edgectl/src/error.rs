// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for edgectl.

use edgectl_client::ClientError;
use thiserror::Error;

use crate::provision::Step;

/// Result type using CliError.
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Missing or contradictory flags / config file values.
    #[error("configuration error: {0}")]
    Config(String),

    /// A remote call failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A provisioning step failed; later steps were not attempted.
    #[error("{step} failed: {source}")]
    Step {
        step: Step,
        #[source]
        source: Box<CliError>,
    },

    /// The deployed proxy did not answer one or more checks.
    #[error("remote-service proxy verification failed:\n  {}", .0.join("\n  "))]
    Verification(Vec<String>),

    /// Key generation or encoding failed.
    #[error("key error: {0}")]
    Key(String),

    /// Token could not be decoded or signed.
    #[error("token error: {0}")]
    Token(String),

    /// Proxy bundle could not be packaged or read.
    #[error("bundle error: {0}")]
    Bundle(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub(crate) fn at(step: Step) -> impl FnOnce(CliError) -> CliError {
        move |source| CliError::Step {
            step,
            source: Box::new(source),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for CliError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        CliError::Token(err.to_string())
    }
}

impl From<zip::result::ZipError> for CliError {
    fn from(err: zip::result::ZipError) -> Self {
        CliError::Bundle(err.to_string())
    }
}
