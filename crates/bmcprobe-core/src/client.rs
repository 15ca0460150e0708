//! Remote telemetry client.
//!
//! The sampling engine only ever sees [`TelemetryClient`]: an authenticated
//! `GET` of a resource path returning a status code and a JSON body. One
//! handle is shared by reference across all fetch workers, so implementations
//! must be safe for concurrent reads.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{Value, json};
use url::Url;

use crate::error::{AuthError, TransportError};

pub const REDFISH_BASE: &str = "/redfish/v1";
const SESSIONS_PATH: &str = "/redfish/v1/SessionService/Sessions";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Status code and decoded body of one `GET`.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Value,
}

impl RemoteResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Authenticated read access to a Redfish service.
pub trait TelemetryClient: Send + Sync {
    /// Fetch `path` (absolute, e.g. `/redfish/v1/Chassis`).
    fn get(&self, path: &str) -> Result<RemoteResponse, TransportError>;

    /// Fetch `path` and treat any non-2xx status as a transport failure.
    fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let response = self.get(path)?;
        if !response.is_success() {
            return Err(TransportError::Status {
                path: path.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }
}

/// BMC login. The password never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

enum Auth {
    None,
    Session {
        token: String,
        location: Option<String>,
    },
    Basic(Credentials),
}

/// [`TelemetryClient`] over HTTPS using a blocking `reqwest` client.
pub struct RedfishClient {
    base_url: Url,
    client: Client,
    auth: Auth,
}

impl RedfishClient {
    /// `host` is a bare hostname (`https://` is assumed) or a full base URL.
    pub fn new(host: &str, request_timeout: Duration, verify_tls: bool) -> Result<Self, AuthError> {
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        let base_url = Url::parse(&base).map_err(|e| AuthError::InvalidAddress(format!("{base}: {e}")))?;

        let mut builder = Client::builder().timeout(request_timeout);
        if !verify_tls {
            // BMCs ship with self-signed certificates.
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| AuthError::Client(e.to_string()))?;

        Ok(Self {
            base_url,
            client,
            auth: Auth::None,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Open a Redfish session. Services without a session service are
    /// accessed with HTTP basic auth instead, after one verifying request.
    pub fn login(&mut self, credentials: &Credentials) -> Result<(), AuthError> {
        let url = self.join(SESSIONS_PATH).map_err(|e| AuthError::Request(e.to_string()))?;
        let response = self
            .client
            .post(url)
            .json(&json!({
                "UserName": credentials.username,
                "Password": credentials.password,
            }))
            .send()
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let token = response
                .headers()
                .get(AUTH_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| AuthError::Session(format!("no {AUTH_TOKEN_HEADER} header in login response")))?;
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            log::info!("Opened Redfish session on {}", self.base_url);
            self.auth = Auth::Session { token, location };
            return Ok(());
        }

        if matches!(
            status,
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
        ) {
            log::warn!("Session service unavailable (HTTP {status}), falling back to basic auth");
            return self.login_basic(credentials);
        }

        Err(AuthError::Rejected(status.as_u16()))
    }

    fn login_basic(&mut self, credentials: &Credentials) -> Result<(), AuthError> {
        let check = format!("{REDFISH_BASE}/Chassis");
        let url = self.join(&check).map_err(|e| AuthError::Request(e.to_string()))?;
        let response = self
            .client
            .get(url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .map_err(|e| AuthError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AuthError::Rejected(response.status().as_u16()));
        }
        self.auth = Auth::Basic(credentials.clone());
        Ok(())
    }

    /// Delete the session opened by [`login`](Self::login). Best effort.
    pub fn logout(&mut self) {
        let auth = std::mem::replace(&mut self.auth, Auth::None);
        let Auth::Session {
            token,
            location: Some(location),
        } = auth
        else {
            return;
        };

        let url = match self.join(&location) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("Could not close session: {e}");
                return;
            }
        };
        match self
            .client
            .delete(url)
            .header(AUTH_TOKEN_HEADER, token)
            .send()
        {
            Ok(r) if r.status().is_success() => log::debug!("Closed Redfish session {location}"),
            Ok(r) => log::warn!("Closing session {location} returned HTTP {}", r.status()),
            Err(e) => log::warn!("Closing session {location} failed: {e}"),
        }
    }

    fn join(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url.join(path).map_err(|e| TransportError::Request {
            path: path.to_string(),
            reason: format!("invalid path: {e}"),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::None => request,
            Auth::Session { token, .. } => request.header(AUTH_TOKEN_HEADER, token),
            Auth::Basic(c) => request.basic_auth(&c.username, Some(&c.password)),
        }
    }
}

impl TelemetryClient for RedfishClient {
    fn get(&self, path: &str) -> Result<RemoteResponse, TransportError> {
        let url = self.join(path)?;
        log::debug!("GET {url}");

        let request = self
            .authorize(self.client.get(url))
            .header(reqwest::header::ACCEPT, "application/json");
        let response = request.send().map_err(|e| TransportError::Request {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            // Error bodies are informational only.
            let body = response.json::<Value>().unwrap_or(Value::Null);
            return Ok(RemoteResponse { status, body });
        }

        let body = response.json::<Value>().map_err(|e| TransportError::Body {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(RemoteResponse { status, body })
    }
}

impl Drop for RedfishClient {
    fn drop(&mut self) {
        self.logout();
    }
}
