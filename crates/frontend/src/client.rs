//! HTTP client for the application's server and the credential renewal call

use crate::error::ClientError;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tenure_core::{Credential, RenewalError, ServerErrorBus, SessionRecord, TokenRenewer};
use tracing::{debug, warn};

/// Path of the renewal endpoint, relative to the base URL
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Body returned by the renewal endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    user_id: Option<String>,
}

impl From<RefreshResponse> for Credential {
    fn from(response: RefreshResponse) -> Self {
        Self {
            token: response.access_token,
            expires_in: response.expires_in,
            user_id: response.user_id,
        }
    }
}

/// Base URL of the current page, or relative URLs when there is no window
pub fn window_origin() -> String {
    web_sys::window()
        .and_then(|window| window.location().origin().ok())
        .unwrap_or_default()
}

/// Client for the application's server.
///
/// Failed responses from [`execute`](Self::execute) are published on the
/// server error bus, which is how a `401` from any request ends up in the
/// session's expiry handling.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    errors: ServerErrorBus,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, errors: ServerErrorBus) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            errors,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn errors(&self) -> &ServerErrorBus {
        &self.errors
    }

    /// Build a request, attaching the bearer token when one is given
    pub fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let request = self.http.request(method, format!("{}{path}", self.base_url));
        match token {
            Some(token) if !token.is_empty() => request.bearer_auth(token),
            _ => request,
        }
    }

    /// Send a request and decode a JSON body, without touching the error bus
    pub async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    /// Send a request and publish any server error on the bus
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        match self.send(request).await {
            Ok(value) => Ok(value),
            Err(error) => {
                if let Some(server_error) = error.to_server_error() {
                    debug!(status = server_error.status, "Publishing server error");
                    self.errors.notify(server_error);
                }
                Err(error)
            }
        }
    }
}

/// Renews the session credential with `POST {base}/auth/refresh`
#[derive(Clone)]
pub struct HttpTokenRenewer {
    client: ApiClient,
}

impl HttpTokenRenewer {
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait(?Send)]
impl TokenRenewer for HttpTokenRenewer {
    async fn renew(&self, record: &SessionRecord) -> Result<Credential, RenewalError> {
        let request = self.client.request(
            reqwest::Method::POST,
            REFRESH_PATH,
            Some(&record.access_token),
        );

        // Never published on the error bus: a 401 here would re-enter expiry handling
        match self.client.send::<RefreshResponse>(request).await {
            Ok(response) => Ok(response.into()),
            Err(error) => {
                warn!(error = %error, "Credential renewal failed");
                Err(error.into())
            }
        }
    }
}
