//! reqwest implementation of [`UserDirectory`]

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::token::{token_source_from_config, IdTokenSource};
use super::{UserDirectory, UsersApiError};
use crate::config::UsersApiConfig;
use crate::models::{NewUser, ProfileUpdate, UserRecord};

const NETWORK_ERROR: &str = "A network error occurred. Please try again.";

/// Users API operation, carrying its success rule and fallback messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Create,
    Update,
    Read,
    Slug,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Read => "read",
            Operation::Slug => "get_by_slug",
        }
    }

    /// Account creation only accepts 200 and 201.
    fn accepts(self, status: StatusCode) -> bool {
        match self {
            Operation::Create => status == StatusCode::OK || status == StatusCode::CREATED,
            _ => status.is_success(),
        }
    }

    fn default_message(self, status: StatusCode) -> String {
        match self {
            Operation::Create => format!(
                "An error occurred while syncing your account. Status: {}",
                status.as_u16()
            ),
            Operation::Update => "An error occurred while updating your profile.".to_string(),
            Operation::Read => "An error occurred while fetching your profile.".to_string(),
            Operation::Slug => "Could not find user.".to_string(),
        }
    }

    fn network_fallback(self) -> &'static str {
        match self {
            Operation::Slug => "A network error occurred.",
            _ => NETWORK_ERROR,
        }
    }
}

/// HTTP client for the remote users service
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn IdTokenSource>,
}

impl HttpUserDirectory {
    /// Build a client from configuration, including its token source
    pub fn new(config: &UsersApiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let tokens = token_source_from_config(config, client.clone());
        Ok(Self::with_token_source(client, &config.base_url, tokens))
    }

    pub fn with_token_source(client: reqwest::Client, base_url: &str, tokens: Arc<dyn IdTokenSource>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = format!("{}/users", self.base_url);
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    /// JSON content type, plus a bearer token for authenticated calls.
    ///
    /// A token failure is logged and the request goes out without one.
    async fn headers(&self, authenticated: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !authenticated {
            return headers;
        }

        match self.tokens.token().await {
            Ok(Some(token)) => match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(e) => tracing::error!("Identity token is not a valid header value: {}", e),
            },
            Ok(None) => {}
            Err(e) => tracing::error!("Could not get identity token: {:#}", e),
        }
        headers
    }

    async fn send(&self, op: Operation, request: RequestBuilder) -> Result<Response, UsersApiError> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(operation = op.name(), "Network error calling users API: {}", e);
            network_error(op, &e)
        })?;

        if op.accepts(response.status()) {
            Ok(response)
        } else {
            Err(error_from_response(op, response).await)
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, op: Operation, response: Response) -> Result<T, UsersApiError> {
        response.json::<T>().await.map_err(|e| {
            tracing::error!(operation = op.name(), "Invalid users API response: {}", e);
            UsersApiError::InvalidResponse(e.to_string())
        })
    }

    /// Write responses may legitimately carry an empty body.
    async fn read_value(&self, op: Operation, response: Response) -> Result<Value, UsersApiError> {
        let text = response.text().await.map_err(|e| network_error(op, &e))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(operation = op.name(), "Invalid users API response: {}", e);
            UsersApiError::InvalidResponse(e.to_string())
        })
    }
}

fn network_error(op: Operation, error: &reqwest::Error) -> UsersApiError {
    let message = error.to_string();
    if message.is_empty() {
        UsersApiError::Network(op.network_fallback().to_string())
    } else {
        UsersApiError::Network(message)
    }
}

/// Turn a rejected response into an error, preferring the body's `message`.
async fn error_from_response(op: Operation, response: Response) -> UsersApiError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<Value>(&text) {
        Ok(body) => {
            tracing::error!(operation = op.name(), status = status.as_u16(), body = %body, "Users API error");
            message_from_body(&body)
        }
        Err(_) => {
            tracing::error!(operation = op.name(), status = status.as_u16(), body = %text, "Users API error");
            None
        }
    };

    UsersApiError::Remote {
        status: status.as_u16(),
        message: message.unwrap_or_else(|| op.default_message(status)),
    }
}

fn message_from_body(body: &Value) -> Option<String> {
    body.as_object()?
        .get("message")?
        .as_str()
        .filter(|m| !m.is_empty())
        .map(String::from)
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn create_user(&self, user: &NewUser) -> Result<Value, UsersApiError> {
        tracing::info!(uid = %user.uid, "Creating user record");
        let op = Operation::Create;
        let request = self
            .client
            .put(self.url(&[]))
            .headers(self.headers(true).await)
            .json(user);
        let response = self.send(op, request).await?;
        self.read_value(op, response).await
    }

    async fn update_user(&self, uid: &str, update: &ProfileUpdate) -> Result<Value, UsersApiError> {
        let op = Operation::Update;
        let request = self
            .client
            .patch(self.url(&[uid]))
            .headers(self.headers(true).await)
            .json(update);
        let response = self.send(op, request).await?;
        self.read_value(op, response).await
    }

    async fn get_user(&self, uid: &str) -> Result<UserRecord, UsersApiError> {
        let op = Operation::Read;
        let request = self.client.get(self.url(&[uid])).headers(self.headers(true).await);
        let response = self.send(op, request).await?;
        self.read_json(op, response).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<UserRecord, UsersApiError> {
        let op = Operation::Slug;
        let request = self
            .client
            .get(self.url(&["slug", slug]))
            .headers(self.headers(false).await);
        let response = self.send(op, request).await?;
        self.read_json(op, response).await
    }
}
