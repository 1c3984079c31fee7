//! Typed HTTP client for the alerts backend

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::models::{Alert, Machine, User};

/// Client for the backend's alerts / machines / users endpoints
///
/// Endpoints are treated as an opaque collaborator: list responses are
/// accepted both as bare JSON arrays and wrapped in a `data` envelope.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new client from configuration
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;

        // A trailing slash keeps Url::join from clobbering the last path
        // segment of the base URL.
        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base = Url::parse(&base_url)
            .map_err(|e| Error::config(format!("invalid api.base_url '{}': {e}", config.base_url)))?;

        Ok(Self {
            http,
            base,
            token: config.token.clone(),
        })
    }

    /// List all alerts
    pub async fn alerts(&self) -> Result<Vec<Alert>> {
        self.get_list("alerts").await
    }

    /// List all machines
    pub async fn machines(&self) -> Result<Vec<Machine>> {
        self.get_list("machines").await
    }

    /// List all users
    pub async fn users(&self) -> Result<Vec<User>> {
        self.get_list("users").await
    }

    /// Fetch the full record for one user
    pub async fn user_detail(&self, user_id: i64) -> Result<User> {
        let envelope: ItemEnvelope<User> = self.get_json(&format!("users/{user_id}")).await?;
        Ok(envelope.into_item())
    }

    /// Acknowledge (resolve) an alert with a note
    ///
    /// An empty note is rejected locally; no request is made.
    pub async fn acknowledge_alert(&self, alert_id: i64, note: &str) -> Result<()> {
        let note = note.trim();
        if note.is_empty() {
            return Err(Error::validation("acknowledgment note must not be empty"));
        }

        let url = self.endpoint(&format!("alerts/{alert_id}/acknowledge"))?;
        debug!(alert_id, "acknowledging alert");

        let request = self
            .authorized(self.http.patch(url))
            .json(&AcknowledgeRequest { comments: note });
        let response = request.send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let envelope: ListEnvelope<T> = self.get_json(path).await?;
        Ok(envelope.into_items())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self.authorized(self.http.get(url)).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<T>().await?)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::config(format!("invalid endpoint path '{path}': {e}")))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api { status, body })
    }
}

/// List response, bare or wrapped in a `data` envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListEnvelope<T> {
    Plain(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListEnvelope<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Self::Plain(items) | Self::Wrapped { data: items } => items,
        }
    }
}

/// Single-item response, bare or wrapped
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ItemEnvelope<T> {
    Plain(T),
    Wrapped { data: T },
}

impl<T> ItemEnvelope<T> {
    fn into_item(self) -> T {
        match self {
            Self::Plain(item) | Self::Wrapped { data: item } => item,
        }
    }
}

#[derive(Serialize)]
struct AcknowledgeRequest<'a> {
    comments: &'a str,
}
