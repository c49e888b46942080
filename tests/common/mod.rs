#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;

pub const JWT_SECRET: &str = "integration-secret";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
    _uploads: tempfile::TempDir,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let uploads = tempfile::tempdir().context("failed to create upload dir")?;

        // In-memory store so every test binary starts from an empty database
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_academy-api"));
        cmd.env("ACADEMY_API_PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("DATABASE_BACKEND", "memory")
            .env("JWT_SECRET", JWT_SECRET)
            .env("UPLOAD_LOCAL_DIR", uploads.path())
            .env("UPLOAD_PUBLIC_BASE_URL", format!("{}/uploads", base_url))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            child,
            _uploads: uploads,
        })
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
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Signs up a fresh account and returns its token
pub async fn sign_up(server: &TestServer, tag: &str) -> Result<String> {
    let unique = format!("{}-{}", tag, std::process::id());
    let res = reqwest::Client::new()
        .post(server.url("/api/v1/sign-up"))
        .json(&serde_json::json!({
            "userName": unique,
            "email": format!("{}@example.com", unique),
            "password": "integration-pass",
        }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "sign-up failed: {}", res.status());
    let body = res.json::<Value>().await?;
    body["token"]
        .as_str()
        .map(str::to_string)
        .context("sign-up response has no token")
}
