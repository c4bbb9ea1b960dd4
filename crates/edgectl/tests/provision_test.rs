// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end provisioning runs against a mock management plane and proxy.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use edgectl::{Cli, CliError, TenantConfig};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn run(args: &[&str]) -> (edgectl::Result<()>, String) {
    let cli = Cli::try_parse_from(args).unwrap();
    let mut out = Vec::new();
    let result = edgectl::run(cli, &mut std::io::empty(), &mut out).await;
    (result, String::from_utf8(out).unwrap())
}

async fn requests(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect()
}

fn authorization(server_requests: &[wiremock::Request], request_path: &str) -> Option<String> {
    server_requests
        .iter()
        .find(|r| r.url.path() == request_path)
        .and_then(|r| r.headers.get("authorization"))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

async fn mount_ok_fallback(server: &MockServer) {
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .with_priority(10)
        .mount(server)
        .await;
}

async fn mount_legacy_credential(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/edgemicro/credential/organization/org/environment/env"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"key": "k", "secret": "s"})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_legacy_provision() {
    let server = MockServer::start().await;
    mount_legacy_credential(&server).await;
    mount_ok_fallback(&server).await;

    let uri = server.uri();
    let internal = format!("{}/edgemicro", uri);
    let (result, out) = run(&[
        "edgectl", "provision", "--legacy", "-o", "org", "-e", "env", "-u", "user", "-p", "pw",
        "-m", &uri, "-r", &uri, "--internal-api", &internal,
    ])
    .await;
    result.unwrap();

    assert_eq!(
        requests(&server).await,
        vec![
            "GET /v1/organizations/org/environments/env/apis/remote-service/deployments",
            "GET /v1/organizations/org/apis/remote-service",
            "POST /v1/organizations/org/apis",
            "POST /v1/organizations/org/environments/env/apis/remote-service/revisions/1/deployments",
            "POST /v1/organizations/org/environments/env/caches",
            "POST /v1/organizations/org/environments/env/keyvaluemaps",
            "POST /edgemicro/credential/organization/org/environment/env",
            "GET /remote-service/certs",
            "GET /remote-service/products",
            "POST /remote-service/verifyApiKey",
            "POST /remote-service/quotas",
        ]
    );

    let received = server.received_requests().await.unwrap();
    assert_eq!(
        authorization(&received, "/v1/organizations/org/environments/env/caches"),
        Some(basic("user", "pw"))
    );
    assert_eq!(
        authorization(&received, "/remote-service/certs"),
        Some(basic("k", "s"))
    );

    let kvm = received
        .iter()
        .find(|r| r.url.path().ends_with("/keyvaluemaps"))
        .unwrap();
    let kvm: serde_json::Value = serde_json::from_slice(&kvm.body).unwrap();
    assert_eq!(kvm["name"], "remote-service");
    assert_eq!(kvm["encrypted"], true);
    let entries: Vec<_> = kvm["entry"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(entries, vec!["private_key", "certs", "kid"]);

    assert!(out.contains("kind: ConfigMap"));
    assert!(!out.contains("kind: Secret"));
    let tenant = TenantConfig::parse(&out).unwrap();
    assert_eq!(tenant.key, "k");
    assert_eq!(tenant.secret, "s");
    assert_eq!(tenant.org_name, "org");
    assert_eq!(tenant.internal_api, internal);
    assert_eq!(tenant.remote_service_api, format!("{}/remote-service", uri));
}

#[tokio::test]
async fn test_opdk_provision_deploys_internal_proxy_first() {
    let server = MockServer::start().await;
    mount_legacy_credential(&server).await;
    mount_ok_fallback(&server).await;

    let uri = server.uri();
    let (result, _) = run(&[
        "edgectl", "provision", "--opdk", "-o", "org", "-e", "env", "-u", "user", "-p", "pw",
        "-m", &uri, "-r", &uri,
    ])
    .await;
    result.unwrap();

    assert_eq!(
        requests(&server).await,
        vec![
            "GET /v1/organizations/org/environments/env/apis/edgemicro-internal/deployments",
            "GET /v1/organizations/org/apis/edgemicro-internal",
            "POST /v1/organizations/org/apis",
            "POST /v1/organizations/org/environments/env/apis/edgemicro-internal/revisions/1/deployments",
            "GET /v1/organizations/org/environments/env/apis/remote-service/deployments",
            "GET /v1/organizations/org/apis/remote-service",
            "POST /v1/organizations/org/apis",
            "POST /v1/organizations/org/environments/env/apis/remote-service/revisions/1/deployments",
            "POST /v1/organizations/org/environments/env/caches",
            "POST /v1/organizations/org/environments/env/keyvaluemaps",
            "POST /edgemicro/credential/organization/org/environment/env",
            "GET /remote-service/certs",
            "GET /remote-service/products",
            "POST /remote-service/verifyApiKey",
            "POST /remote-service/quotas",
        ]
    );
}

async fn mount_hybrid_app(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/organizations/org/developers/dev@example.com/apps"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "name": "remote-service",
            "credentials": [{"consumerKey": "app-key", "consumerSecret": "app-secret"}]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_hybrid_provision() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/organizations/org/apis/remote-service"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "remote-service", "revision": ["1", "2"]})),
        )
        .mount(&server)
        .await;
    mount_hybrid_app(&server).await;
    mount_ok_fallback(&server).await;

    let uri = server.uri();
    let (result, out) = run(&[
        "edgectl", "provision", "-o", "org", "-e", "env", "-t", "tok", "-m", &uri, "-r", &uri,
        "-d", "dev@example.com", "-n", "istio-system",
    ])
    .await;
    result.unwrap();

    assert_eq!(
        requests(&server).await,
        vec![
            "GET /v1/organizations/org/environments/env/apis/remote-service/deployments",
            "GET /v1/organizations/org/apis/remote-service",
            "POST /v1/organizations/org/apis",
            "POST /v1/organizations/org/environments/env/apis/remote-service/revisions/3/deployments",
            "POST /v1/organizations/org/environments/env/caches",
            "POST /v1/organizations/org/environments/env/keyvaluemaps",
            "POST /v1/organizations/org/apiproducts",
            "POST /v1/organizations/org/developers",
            "POST /v1/organizations/org/developers/dev@example.com/apps",
            "GET /remote-service/certs",
            "GET /remote-service/products",
            "POST /remote-service/verifyApiKey",
            "POST /remote-service/quotas",
        ]
    );

    let received = server.received_requests().await.unwrap();
    assert_eq!(
        authorization(&received, "/v1/organizations/org/apiproducts"),
        Some("Bearer tok".to_string())
    );
    assert_eq!(
        authorization(&received, "/remote-service/quotas"),
        Some(basic("app-key", "app-secret"))
    );

    let tenant = TenantConfig::parse(&out).unwrap();
    assert_eq!(tenant.key, "app-key");
    assert_eq!(tenant.internal_api, "");
    assert!(out.contains("namespace: istio-system"));
    assert!(out.contains("# Secret for apigee-remote-service-envoy"));
    assert!(out.contains("name: org-env-policy-secret"));
}

#[tokio::test]
async fn test_deployed_proxy_is_kept_unless_forced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/v1/organizations/org/environments/env/apis/remote-service/deployments",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "remote-service",
            "revision": [{"name": "4", "state": "deployed"}]
        })))
        .mount(&server)
        .await;
    mount_legacy_credential(&server).await;
    mount_ok_fallback(&server).await;

    let uri = server.uri();
    let internal = format!("{}/edgemicro", uri);
    let base: Vec<&str> = vec![
        "edgectl", "provision", "--legacy", "-o", "org", "-e", "env", "-u", "user", "-p", "pw",
        "-m", uri.as_str(), "-r", uri.as_str(), "--internal-api", internal.as_str(),
    ];

    let (result, _) = run(&base).await;
    result.unwrap();
    let seen = requests(&server).await;
    assert!(!seen.iter().any(|r| r == "POST /v1/organizations/org/apis"));

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/v1/organizations/org/apis/remote-service"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "remote-service", "revision": ["4"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/organizations/org/apis"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"name": "remote-service", "revision": "9"})),
        )
        .mount(&server)
        .await;
    mount_legacy_credential(&server).await;
    mount_ok_fallback(&server).await;

    let mut forced = base.clone();
    forced.push("--force-proxy-install");
    let (result, _) = run(&forced).await;
    result.unwrap();
    let seen = requests(&server).await;
    assert!(seen.iter().any(|r| {
        r == "POST /v1/organizations/org/environments/env/apis/remote-service/revisions/9/deployments"
    }));
}

#[tokio::test]
async fn test_existing_resources_do_not_fail_the_run() {
    let server = MockServer::start().await;
    for resource in ["caches", "keyvaluemaps"] {
        Mock::given(method("POST"))
            .and(path(format!(
                "/v1/organizations/org/environments/env/{}",
                resource
            )))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;
    }
    for resource in ["apiproducts", "developers"] {
        Mock::given(method("POST"))
            .and(path(format!("/v1/organizations/org/{}", resource)))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;
    }
    mount_hybrid_app(&server).await;
    mount_ok_fallback(&server).await;

    let uri = server.uri();
    let (result, _) = run(&[
        "edgectl", "provision", "-o", "org", "-e", "env", "-t", "tok", "-m", &uri, "-r", &uri,
        "-d", "dev@example.com",
    ])
    .await;
    result.unwrap();
}

#[tokio::test]
async fn test_app_conflict_uses_existing_credentials() {
    let server = MockServer::start().await;
    let apps = "/v1/organizations/org/developers/dev@example.com/apps";
    Mock::given(method("POST"))
        .and(path(apps))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "name": "remote-service",
            "credentials": [{"consumerKey": "first-key", "consumerSecret": "first-secret"}]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(apps))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/remote-service", apps)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "remote-service",
            "credentials": [{"consumerKey": "first-key", "consumerSecret": "first-secret"}]
        })))
        .mount(&server)
        .await;
    mount_ok_fallback(&server).await;

    let uri = server.uri();
    let args = [
        "edgectl", "provision", "-o", "org", "-e", "env", "-t", "tok", "-m", uri.as_str(), "-r",
        uri.as_str(), "-d", "dev@example.com",
    ];

    let (first, first_out) = run(&args).await;
    first.unwrap();
    let (second, second_out) = run(&args).await;
    second.unwrap();

    assert_eq!(TenantConfig::parse(&first_out).unwrap().key, "first-key");
    assert_eq!(TenantConfig::parse(&second_out).unwrap().key, "first-key");
    assert!(
        requests(&server)
            .await
            .contains(&format!("GET {}/remote-service", apps))
    );
}

#[tokio::test]
async fn test_failing_proxy_fails_verification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/remote-service/certs"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/remote-service/quotas"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_legacy_credential(&server).await;
    mount_ok_fallback(&server).await;

    let uri = server.uri();
    let internal = format!("{}/edgemicro", uri);
    let (result, out) = run(&[
        "edgectl", "provision", "--legacy", "-o", "org", "-e", "env", "-u", "user", "-p", "pw",
        "-m", &uri, "-r", &uri, "--internal-api", &internal,
    ])
    .await;

    match result.unwrap_err() {
        CliError::Step { step, source } => {
            assert_eq!(step, edgectl::Step::VerifyProxy);
            match *source {
                CliError::Verification(failures) => {
                    assert_eq!(failures.len(), 2);
                    assert!(failures[0].starts_with("certs"));
                    assert!(failures[1].starts_with("quotas"));
                }
                other => panic!("unexpected error {other}"),
            }
        }
        other => panic!("unexpected error {other}"),
    }
    // every check ran
    assert!(
        requests(&server)
            .await
            .contains(&"POST /remote-service/verifyApiKey".to_string())
    );
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_unreachable_management_stops_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/organizations/org/environments/env/caches"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    mount_ok_fallback(&server).await;

    let uri = server.uri();
    let internal = format!("{}/edgemicro", uri);
    let (result, _) = run(&[
        "edgectl", "provision", "--legacy", "-o", "org", "-e", "env", "-u", "user", "-p", "pw",
        "-m", &uri, "-r", &uri, "--internal-api", &internal,
    ])
    .await;

    let err = result.unwrap_err();
    assert!(err.to_string().starts_with("create cache failed"));
    assert!(
        !requests(&server)
            .await
            .iter()
            .any(|r| r.ends_with("/keyvaluemaps"))
    );
}

#[tokio::test]
async fn test_verify_only_uses_config_credentials() {
    let server = MockServer::start().await;
    mount_ok_fallback(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(
        &config,
        format!(
            "tenant:
  remote_service_api: {}/remote-service
  org_name: org
  env_name: env
  key: cfg-key
  secret: cfg-secret
",
            server.uri()
        ),
    )
    .unwrap();
    let out_file = dir.path().join("manifests.yaml");

    let (result, out) = run(&[
        "edgectl",
        "provision",
        "--verify-only",
        "-c",
        config.to_str().unwrap(),
        "--out",
        out_file.to_str().unwrap(),
    ])
    .await;
    result.unwrap();

    assert_eq!(
        requests(&server).await,
        vec![
            "GET /remote-service/certs",
            "GET /remote-service/products",
            "POST /remote-service/verifyApiKey",
            "POST /remote-service/quotas",
        ]
    );
    let received = server.received_requests().await.unwrap();
    assert_eq!(
        authorization(&received, "/remote-service/products"),
        Some(basic("cfg-key", "cfg-secret"))
    );
    assert_eq!(std::fs::read_to_string(&out_file).unwrap(), out);
    assert_eq!(TenantConfig::parse(&out).unwrap().key, "cfg-key");
}

#[tokio::test]
async fn test_custom_bundle_is_uploaded() {
    let server = MockServer::start().await;
    mount_legacy_credential(&server).await;
    mount_ok_fallback(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let bundle_path = dir.path().join("bundle.zip");
    let bundle = edgectl::bundle::build(
        edgectl::bundle::ProxyKind::RemoteService,
        edgectl::Mode::Legacy,
        &["only-this-host".to_string()],
    )
    .unwrap();
    std::fs::write(&bundle_path, &bundle).unwrap();

    let uri = server.uri();
    let internal = format!("{}/edgemicro", uri);
    let (result, _) = run(&[
        "edgectl", "provision", "--legacy", "-o", "org", "-e", "env", "-u", "user", "-p", "pw",
        "-m", &uri, "-r", &uri, "--internal-api", &internal, "--bundle",
        bundle_path.to_str().unwrap(),
    ])
    .await;
    result.unwrap();

    let received = server.received_requests().await.unwrap();
    let import = received
        .iter()
        .find(|r| r.method.as_str() == "POST" && r.url.path() == "/v1/organizations/org/apis")
        .unwrap();
    let body = &import.body;
    assert!(body.windows(bundle.len()).any(|w| w == bundle.as_slice()));
}

#[tokio::test]
async fn test_empty_internal_credential_is_accepted() {
    let server = MockServer::start().await;
    mount_ok_fallback(&server).await;

    let uri = server.uri();
    let internal = format!("{}/edgemicro", uri);
    let (result, out) = run(&[
        "edgectl", "provision", "--legacy", "-o", "org", "-e", "env", "-u", "user", "-p", "pw",
        "-m", &uri, "-r", &uri, "--internal-api", &internal,
    ])
    .await;
    result.unwrap();

    assert!(
        requests(&server)
            .await
            .contains(&"POST /remote-service/quotas".to_string())
    );
    let tenant = TenantConfig::parse(&out).unwrap();
    assert_eq!(tenant.key, "");
    assert_eq!(tenant.secret, "");
}

#[tokio::test]
async fn test_verify_only_without_credentials_is_unauthenticated() {
    let server = MockServer::start().await;
    mount_ok_fallback(&server).await;

    let (result, out) = run(&["edgectl", "provision", "--verify-only", "-r", &server.uri()]).await;
    result.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 4);
    assert!(received.iter().all(|r| !r.headers.contains_key("authorization")));
    let verify = received
        .iter()
        .find(|r| r.url.path() == "/remote-service/verifyApiKey")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&verify.body).unwrap();
    assert_eq!(body["apiKey"], "");
    assert!(out.is_empty());
}

/// HTTPS endpoint with a self-signed certificate answering `{}` to every
/// request. Returns its base URL and the number of requests it served.
async fn start_self_signed_server() -> (String, Arc<AtomicUsize>) {
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

    let certified =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
            .unwrap();
    let cert: CertificateDer<'static> = certified.cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));
    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(vec![cert], key)
    .unwrap();
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let served = Arc::new(AtomicUsize::new(0));

    let counter = served.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                // Handshakes rejected by the client end here.
                let Ok(mut tls) = acceptor.accept(stream).await else {
                    return;
                };
                if read_request(&mut tls).await.is_none() {
                    return;
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let response = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}";
                let _ = tls.write_all(response.as_bytes()).await;
                let _ = tls.shutdown().await;
            });
        }
    });

    (format!("https://127.0.0.1:{}", port), served)
}

/// Read one HTTP/1.1 request: headers, then `content-length` bytes of body.
async fn read_request<S: AsyncReadExt + Unpin>(stream: &mut S) -> Option<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let length: usize = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(())
}

#[tokio::test]
async fn test_self_signed_proxy_requires_insecure() {
    let (uri, served) = start_self_signed_server().await;

    let (result, out) = run(&["edgectl", "provision", "--verify-only", "-r", &uri]).await;
    match result.unwrap_err() {
        CliError::Step { step, source } => {
            assert_eq!(step, edgectl::Step::VerifyProxy);
            match *source {
                CliError::Verification(failures) => {
                    assert_eq!(failures.len(), 4);
                    for failure in &failures {
                        assert!(failure.contains("connection error"), "{failure}");
                    }
                }
                other => panic!("unexpected error {other}"),
            }
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(served.load(Ordering::SeqCst), 0);
    assert!(out.is_empty());

    let (result, out) = run(&["edgectl", "provision", "--verify-only", "--insecure", "-r", &uri])
        .await;
    result.unwrap();
    assert_eq!(served.load(Ordering::SeqCst), 4);
    assert!(out.is_empty());
}
