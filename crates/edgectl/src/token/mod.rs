// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tokens issued by the remote-service proxy and the keys that sign them.

mod commands;
pub mod jwks;
pub mod jwt;
pub mod keys;

pub use commands::{create, create_secret, inspect, rotate_cert};
pub use jwks::{Jwk, JwkSet};
pub use jwt::{AUDIENCE, Inspection, Verdict};
pub use keys::{SigningKey, default_kid};
