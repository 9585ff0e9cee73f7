// Hand-crafted async client for the turnstile controller HTTP API.
//
// Auth: POST /api/system/auth {login, password} -> {token}
// Pass: POST /api/devices/{id}/pass {user_id, direction, event_description}
// Staff: GET /api/users/staff/list?withPhone=true
// All authenticated calls carry a Bearer token header.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum DoorError {
    /// The controller rejected the token or the login credentials.
    /// Distinguished from other failures to drive the single-retry rule.
    #[error("controller rejected authorization")]
    Unauthorized,
    /// The pass request went through but the controller declined it.
    #[error("pass rejected by controller: {0}")]
    Rejected(String),
    #[error("unexpected controller response ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid controller URL: {0}")]
    Url(#[from] url::ParseError),
}

/// One staff roster entry as the controller reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct StaffUser {
    pub id: u32,
    pub name: String,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Deserialize)]
struct PassResponse {
    #[serde(default)]
    result: Option<String>,
}

/// Async client for the turnstile controller.
///
/// Holds the current bearer token; [`authenticate`](Self::authenticate)
/// replaces it atomically and is safe to call at startup and after any
/// authorization failure.
pub struct DoorClient {
    http: reqwest::Client,
    base_url: Url,
    device_id: u32,
    login: String,
    password: SecretString,
    token: RwLock<Option<String>>,
}

impl DoorClient {
    /// Build a client with a bounded per-request timeout, so an
    /// unreachable controller cannot stall the caller indefinitely.
    pub fn new(
        base_url: &str,
        device_id: u32,
        login: impl Into<String>,
        password: SecretString,
        timeout: Duration,
    ) -> Result<Self, DoorError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            device_id,
            login: login.into(),
            password,
            token: RwLock::new(None),
        })
    }

    /// Join a relative path (e.g. `"api/system/auth"`) onto the base URL.
    fn url(&self, path: &str) -> Url {
        // base_url always ends with `/`, so joining relative paths works.
        self.base_url
            .join(path)
            .expect("path should be valid relative URL")
    }

    /// Fetch a fresh token and replace the stored credential.
    ///
    /// Idempotent: each call performs one login exchange and atomically
    /// swaps in the returned token.
    pub async fn authenticate(&self) -> Result<(), DoorError> {
        let url = self.url("api/system/auth");
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .json(&json!({
                "login": self.login,
                "password": self.password.expose_secret(),
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_failure(status, resp.text().await.unwrap_or_default()));
        }

        let body: AuthResponse = resp.json().await?;
        *self.token.write().await = Some(body.token);
        tracing::info!("controller token refreshed");
        Ok(())
    }

    /// Request a turnstile opening for `user_id` in wire `direction`
    /// (1 = entrance, 2 = exit).
    ///
    /// An authorization failure triggers exactly one token refresh and
    /// one retry; a second authorization failure is returned as-is.
    pub async fn open_pass(
        &self,
        user_id: u32,
        direction: u8,
        description: &str,
    ) -> Result<(), DoorError> {
        match self.try_pass(user_id, direction, description).await {
            Err(DoorError::Unauthorized) => {
                debug!(user_id, "pass unauthorized; refreshing token and retrying once");
                self.authenticate().await?;
                self.try_pass(user_id, direction, description).await
            }
            other => other,
        }
    }

    async fn try_pass(
        &self,
        user_id: u32,
        direction: u8,
        description: &str,
    ) -> Result<(), DoorError> {
        let url = self.url(&format!("api/devices/{}/pass", self.device_id));
        debug!(user_id, direction, "POST {url}");

        let request = self.http.post(url).json(&json!({
            "user_id": user_id,
            "direction": direction,
            "event_description": description,
        }));
        let resp = self.authorized(request).await.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_failure(status, resp.text().await.unwrap_or_default()));
        }

        let body: PassResponse = resp.json().await?;
        match body.result.as_deref() {
            Some("ok") => Ok(()),
            other => Err(DoorError::Rejected(
                other.unwrap_or("<no result>").to_string(),
            )),
        }
    }

    /// Fetch the staff roster, with the same single-retry rule as
    /// [`open_pass`](Self::open_pass).
    pub async fn staff_list(&self) -> Result<Vec<StaffUser>, DoorError> {
        match self.try_staff_list().await {
            Err(DoorError::Unauthorized) => {
                debug!("staff list unauthorized; refreshing token and retrying once");
                self.authenticate().await?;
                self.try_staff_list().await
            }
            other => other,
        }
    }

    async fn try_staff_list(&self) -> Result<Vec<StaffUser>, DoorError> {
        let url = self.url("api/users/staff/list");
        debug!("GET {url}");

        let request = self.http.get(url).query(&[("withPhone", "true")]);
        let resp = self.authorized(request).await.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_failure(status, resp.text().await.unwrap_or_default()));
        }

        Ok(resp.json().await?)
    }

    async fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn classify_failure(status: StatusCode, body: String) -> DoorError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        DoorError::Unauthorized
    } else {
        DoorError::Api {
            status: status.as_u16(),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
        }
    }
}
