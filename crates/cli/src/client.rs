//! HTTP client for talking to a running launchdeck control server.

use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 5;
const STOP_TIMEOUT_SECS: u64 = 10;
/// Cleanup shells out to lsof per port, give it room.
const CLEANUP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub apps: usize,
    pub running: usize,
}

#[derive(Debug, Deserialize)]
pub struct AppStatus {
    pub id: String,
    pub name: String,
    pub path: String,
    pub kind: String,
    pub description: String,
    pub preferred_port: Option<u16>,
    pub is_running: bool,
    pub port: Option<u16>,
    pub pid: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StartOutcome {
    pub app_id: String,
    pub name: String,
    pub port: Option<u16>,
    pub pid: Option<u32>,
    pub terminal: bool,
}

#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub apps: usize,
}

#[derive(Debug, Deserialize)]
pub struct CleanupResponse {
    pub freed: Vec<u16>,
}

#[derive(Debug, Deserialize)]
pub struct ValidationReport {
    pub id: String,
    pub name: String,
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[allow(dead_code)]
    error: String,
    message: String,
}

fn build_client() -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .no_gzip()
        .no_brotli()
        .no_deflate()
        .build()
        .map_err(|err| {
            warn!(error = %err, "Failed to build HTTP client.");
            format!("Failed to build HTTP client: {err}")
        })
}

fn build_url(host: &str, port: u16, path: &str) -> String {
    format!("http://{host}:{port}{path}")
}

/// Extract the server's error message from a non-OK response, falling back
/// to the raw status code when the body is not our JSON shape.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorResponse>().await {
        Ok(body) => body.message,
        Err(_) => format!("server responded with status {status}"),
    }
}

/// Check whether a control server is listening and healthy.
pub async fn health(host: &str, port: u16) -> Result<HealthResponse, String> {
    let client = build_client()?;
    let url = build_url(host, port, "/health");
    debug!(%url, "Sending health request.");
    let response = client
        .get(&url)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|err| format!("Is the control server running? {err}"))?;
    if response.status() != StatusCode::OK {
        return Err(error_message(response).await);
    }
    response
        .json()
        .await
        .map_err(|err| format!("Failed to parse health response: {err}"))
}

pub async fn list_apps(host: &str, port: u16) -> Result<Vec<AppStatus>, String> {
    let client = build_client()?;
    let url = build_url(host, port, "/api/apps");
    let response = client
        .get(&url)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|err| format!("Is the control server running? {err}"))?;
    if response.status() != StatusCode::OK {
        return Err(error_message(response).await);
    }
    response
        .json()
        .await
        .map_err(|err| format!("Failed to parse app list: {err}"))
}

pub async fn app_status(host: &str, port: u16, id: &str) -> Result<AppStatus, String> {
    let client = build_client()?;
    let url = build_url(host, port, &format!("/api/apps/{id}/status"));
    let response = client
        .get(&url)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|err| format!("Is the control server running? {err}"))?;
    if response.status() != StatusCode::OK {
        return Err(error_message(response).await);
    }
    response
        .json()
        .await
        .map_err(|err| format!("Failed to parse status response: {err}"))
}

pub async fn start_app(host: &str, port: u16, id: &str) -> Result<StartOutcome, String> {
    let client = build_client()?;
    let url = build_url(host, port, &format!("/api/apps/{id}/start"));
    debug!(%url, "Sending start request.");
    let response = client
        .post(&url)
        .timeout(Duration::from_secs(STOP_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|err| format!("Is the control server running? {err}"))?;
    if response.status() != StatusCode::OK {
        return Err(error_message(response).await);
    }
    response
        .json()
        .await
        .map_err(|err| format!("Failed to parse start response: {err}"))
}

pub async fn stop_app(host: &str, port: u16, id: &str) -> Result<(), String> {
    let client = build_client()?;
    let url = build_url(host, port, &format!("/api/apps/{id}/stop"));
    debug!(%url, "Sending stop request.");
    let response = client
        .post(&url)
        .timeout(Duration::from_secs(STOP_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|err| format!("Is the control server running? {err}"))?;
    if response.status() != StatusCode::OK {
        return Err(error_message(response).await);
    }
    Ok(())
}

pub async fn refresh_config(host: &str, port: u16) -> Result<RefreshResponse, String> {
    let client = build_client()?;
    let url = build_url(host, port, "/api/config/refresh");
    let response = client
        .post(&url)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|err| format!("Is the control server running? {err}"))?;
    if response.status() != StatusCode::OK {
        return Err(error_message(response).await);
    }
    response
        .json()
        .await
        .map_err(|err| format!("Failed to parse refresh response: {err}"))
}

pub async fn validate_config(host: &str, port: u16) -> Result<Vec<ValidationReport>, String> {
    let client = build_client()?;
    let url = build_url(host, port, "/api/config/validate");
    let response = client
        .get(&url)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|err| format!("Is the control server running? {err}"))?;
    if response.status() != StatusCode::OK {
        return Err(error_message(response).await);
    }
    response
        .json()
        .await
        .map_err(|err| format!("Failed to parse validation response: {err}"))
}

pub async fn cleanup_ports(host: &str, port: u16) -> Result<CleanupResponse, String> {
    let client = build_client()?;
    let url = build_url(host, port, "/api/cleanup-ports");
    let response = client
        .post(&url)
        .timeout(Duration::from_secs(CLEANUP_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|err| format!("Is the control server running? {err}"))?;
    if response.status() != StatusCode::OK {
        return Err(error_message(response).await);
    }
    response
        .json()
        .await
        .map_err(|err| format!("Failed to parse cleanup response: {err}"))
}

/// Ask the control server to shut down gracefully.
pub async fn stop_server(host: &str, port: u16) -> Result<(), String> {
    let client = build_client()?;
    let url = build_url(host, port, "/_launchdeck/stop");
    debug!(%url, "Sending server stop request.");
    let response = client
        .get(&url)
        .timeout(Duration::from_secs(STOP_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|err| format!("Is the control server running? {err}"))?;
    if response.status() == StatusCode::OK {
        Ok(())
    } else {
        Err(error_message(response).await)
    }
}
