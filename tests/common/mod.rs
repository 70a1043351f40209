#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Request};
use reqwest::StatusCode;

use remco_cms::app::{app, AppState};
use remco_cms::config::{CommissionConfig, SecurityConfig, TierWriteMode};
use remco_cms::services::{Backends, CommissionService, MemoryBackend};

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // In-memory backends so the binary runs without the gateway
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_remco-cms"));
        cmd.env("APP_ENV", "development")
            .env("REMCO_CMS_PORT", port.to_string())
            .env("SERVER_BIND_HOST", "127.0.0.1")
            .env("BACKEND_MODE", "memory")
            .env("BACKEND_MEMORY_PARTNERS", "WU:Western Union,MG:MoneyGram")
            .env("SECURITY_REQUIRE_AUTH", "false")
            .env_remove("SECURITY_JWT_SECRET")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Router over a fresh memory backend seeded with WU and MG
pub fn test_app(security: SecurityConfig) -> (axum::Router, Arc<MemoryBackend>) {
    let partners = MemoryBackend::parse_partner_seeds(&["WU:Western Union".to_string(), "MG:MoneyGram".to_string()])
        .expect("partner seeds");
    let backend = Arc::new(MemoryBackend::with_partners(partners));

    let state = AppState {
        service: CommissionService::new(
            Backends::shared(backend.clone()),
            CommissionConfig {
                write_concurrency: 2,
                tier_write_mode: TierWriteMode::Replace,
                strict_parsing: false,
            },
        ),
        security,
        request_timeout_ms: 5_000,
    };
    (app(state), backend)
}

pub fn open_security() -> SecurityConfig {
    SecurityConfig {
        require_auth: false,
        jwt_secret: String::new(),
        cors_origins: Vec::new(),
    }
}

pub fn form_request(uri: &str, pairs: &[(&str, &str)], token: Option<&str>) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().copied())
        .finish();
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).expect("request")
}

pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}
