// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Proxy bundle packaging.
//!
//! A bundle is a zip archive holding an `apiproxy/` tree. The generated
//! bundles carry the proxy descriptor and its default proxy endpoint; legacy
//! and OPDK endpoints list the virtual hosts they listen on, hybrid endpoints
//! are bound through environment groups and list none.

use std::fmt::Write as _;
use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::context::{INTERNAL_BASE_PATH, Mode, REMOTE_SERVICE_BASE_PATH};
use crate::error::{CliError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// The remote-service proxy every mode deploys.
    RemoteService,
    /// The OPDK internal proxy issuing credentials.
    Internal,
}

impl ProxyKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProxyKind::RemoteService => "remote-service",
            ProxyKind::Internal => "edgemicro-internal",
        }
    }

    pub fn base_path(&self) -> &'static str {
        match self {
            ProxyKind::RemoteService => REMOTE_SERVICE_BASE_PATH,
            ProxyKind::Internal => INTERNAL_BASE_PATH,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ProxyKind::RemoteService => "Remote service for API key, quota and token checks",
            ProxyKind::Internal => "Internal credential service",
        }
    }
}

/// Build the bundle for `kind` as deployed in `mode`.
pub fn build(kind: ProxyKind, mode: Mode, virtual_hosts: &[String]) -> Result<Vec<u8>> {
    let hosts: &[String] = match mode {
        Mode::Hybrid => &[],
        Mode::Legacy | Mode::Opdk => virtual_hosts,
    };
    if let Some(bad) = hosts.iter().find(|h| !is_valid_host_name(h)) {
        return Err(CliError::Bundle(format!("invalid virtual host name {:?}", bad)));
    }

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buffer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(format!("apiproxy/{}.xml", kind.name()), options)?;
        zip.write_all(descriptor(kind).as_bytes())?;

        zip.start_file("apiproxy/proxies/default.xml", options)?;
        zip.write_all(proxy_endpoint(kind, hosts).as_bytes())?;

        zip.finish()?;
    }
    Ok(buffer.into_inner())
}

/// Read a bundle zip from disk, checking it holds an `apiproxy/` tree.
pub fn load(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)
        .map_err(|e| CliError::Bundle(format!("cannot read {}: {}", path.display(), e)))?;
    let archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;
    if !archive.file_names().any(|name| name.starts_with("apiproxy/")) {
        return Err(CliError::Bundle(format!(
            "{} has no apiproxy/ directory",
            path.display()
        )));
    }
    Ok(bytes)
}

fn is_valid_host_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn descriptor(kind: ProxyKind) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<APIProxy name="{name}">
    <Description>{description}</Description>
    <DisplayName>{name}</DisplayName>
    <ProxyEndpoints>
        <ProxyEndpoint>default</ProxyEndpoint>
    </ProxyEndpoints>
</APIProxy>
"#,
        name = kind.name(),
        description = kind.description(),
    )
}

fn proxy_endpoint(kind: ProxyKind, virtual_hosts: &[String]) -> String {
    let mut hosts = String::new();
    for host in virtual_hosts {
        let _ = writeln!(hosts, "        <VirtualHost>{}</VirtualHost>", host);
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<ProxyEndpoint name="default">
    <HTTPProxyConnection>
        <BasePath>{base_path}</BasePath>
{hosts}    </HTTPProxyConnection>
    <RouteRule name="noroute"/>
</ProxyEndpoint>
"#,
        base_path = kind.base_path(),
        hosts = hosts,
    )
}
