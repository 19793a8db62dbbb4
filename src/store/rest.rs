//! Hosted relational-table backend over a PostgREST-style HTTP API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::debug;

use crate::auth::AuthContext;
use crate::error::BackendError;
use crate::store::traits::DataBackend;

/// Table API client: `POST /rest/v1/{table}` and `PATCH /rest/v1/{table}?id=eq.{id}`.
pub struct RestBackend {
    base_url: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(
        &self,
        method: reqwest::Method,
        table: &str,
        auth: &AuthContext,
    ) -> Result<reqwest::RequestBuilder, BackendError> {
        let session = auth.session().ok_or(BackendError::Unauthorized)?;
        Ok(self
            .client
            .request(method, self.table_url(table))
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(session.access_token().expose_secret()))
    }
}

/// Turn a non-2xx response into `Rejected`, keeping the body as the message.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
    Err(BackendError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Pull the id out of a representation response (array or single object).
fn extract_id(body: &Value) -> Result<String, BackendError> {
    let row = match body {
        Value::Array(rows) => rows.first(),
        other => Some(other),
    };
    match row.and_then(|r| r.get("id")) {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(BackendError::InvalidResponse(format!(
            "no id in inserted row: {body}"
        ))),
    }
}

#[async_trait]
impl DataBackend for RestBackend {
    async fn insert(
        &self,
        table: &str,
        row: &Map<String, Value>,
        auth: &AuthContext,
    ) -> Result<String, BackendError> {
        let resp = self
            .request(reqwest::Method::POST, table, auth)?
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let body: Value = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let id = extract_id(&body)?;
        debug!(table, id = %id, "Row inserted");
        Ok(id)
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        patch: &Map<String, Value>,
        auth: &AuthContext,
    ) -> Result<(), BackendError> {
        let resp = self
            .request(reqwest::Method::PATCH, table, auth)?
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        check_status(resp).await?;
        debug!(table, id, "Row updated");
        Ok(())
    }
}
