//! PostgREST-style HTTP remote store.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{validate_collection, RemoteError, RemoteResult, RemoteStore};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const REST_PATH: &str = "/rest/v1";
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Talks to `{base_url}/rest/v1/{collection}` with row filters for id/owner.
#[derive(Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    client: Client,
}

impl fmt::Debug for HttpRemoteStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpRemoteStore")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let api_key = normalize_text_option(Some(api_key.into())).ok_or_else(|| {
            RemoteError::InvalidConfiguration("API key must not be empty".to_string())
        })?;

        Ok(Self {
            base_url,
            api_key,
            access_token: None,
            client: Client::builder()
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .build()?,
        })
    }

    /// Use a signed-in user's access token instead of the API key as bearer.
    #[must_use]
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = normalize_text_option(Some(access_token.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: &str) -> RemoteResult<String> {
        validate_collection(collection)?;
        Ok(format!("{}{REST_PATH}/{collection}", self.base_url))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        request
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<reqwest::Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Api {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }

    /// PATCH/DELETE answer with the affected rows; none means no match.
    async fn expect_rows(response: reqwest::Response) -> RemoteResult<()> {
        let rows = response.json::<Vec<Value>>().await?;
        if rows.is_empty() {
            Err(RemoteError::NotFound)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn insert(&self, collection: &str, owner_id: &str, record: &Value) -> RemoteResult<()> {
        let url = self.collection_url(collection)?;
        let mut body = record.clone();
        scope_to_owner(&mut body, owner_id)?;

        let request = self
            .client
            .post(url)
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body);
        self.send(request).await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        owner_id: &str,
        id: &str,
        fields: &Value,
    ) -> RemoteResult<()> {
        let url = self.collection_url(collection)?;
        let request = self
            .client
            .patch(url)
            .query(&row_filter(id, owner_id))
            .header("Prefer", "return=representation")
            .json(fields);
        let response = self.send(request).await?;
        Self::expect_rows(response).await
    }

    async fn delete(&self, collection: &str, owner_id: &str, id: &str) -> RemoteResult<()> {
        let url = self.collection_url(collection)?;
        let request = self
            .client
            .delete(url)
            .query(&row_filter(id, owner_id))
            .header("Prefer", "return=representation");
        let response = self.send(request).await?;
        Self::expect_rows(response).await
    }

    async fn list_by_owner(&self, collection: &str, owner_id: &str) -> RemoteResult<Vec<Value>> {
        let url = self.collection_url(collection)?;
        let request = self.client.get(url).query(&[
            ("owner_id", format!("eq.{owner_id}")),
            ("select", "*".to_string()),
        ]);
        let response = self.send(request).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }
}

fn row_filter(id: &str, owner_id: &str) -> [(&'static str, String); 2] {
    [
        ("id", format!("eq.{id}")),
        ("owner_id", format!("eq.{owner_id}")),
    ]
}

/// Refuse to write a record on behalf of another owner.
fn scope_to_owner(record: &mut Value, owner_id: &str) -> RemoteResult<()> {
    let Value::Object(fields) = record else {
        return Err(RemoteError::InvalidPayload(
            "record must be a JSON object".to_string(),
        ));
    };
    match fields.get("owner_id").and_then(Value::as_str) {
        Some(existing) if existing != owner_id => Err(RemoteError::InvalidPayload(format!(
            "record belongs to {existing}, not {owner_id}"
        ))),
        Some(_) => Ok(()),
        None => {
            fields.insert("owner_id".to_string(), Value::String(owner_id.to_string()));
            Ok(())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    error: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return match payload.hint {
                Some(hint) => format!("{} ({hint})", message.trim()),
                None => message.trim().to_string(),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let url = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("remote URL must not be empty".to_string())
    })?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "remote URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("db.example.com".to_string()).is_err());
        assert_eq!(
            normalize_base_url(" https://db.example.com/ ".to_string()).unwrap(),
            "https://db.example.com"
        );
    }

    #[test]
    fn test_collection_url_joins_rest_path() {
        let store = HttpRemoteStore::new("https://db.example.com", "anon").unwrap();
        assert_eq!(
            store.collection_url("notecards").unwrap(),
            "https://db.example.com/rest/v1/notecards"
        );
        assert!(store.collection_url("../auth").is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let store = HttpRemoteStore::new("https://db.example.com", "anon-secret")
            .unwrap()
            .with_access_token("jwt-secret");
        let debug = format!("{store:?}");
        assert!(!debug.contains("anon-secret"));
        assert!(!debug.contains("jwt-secret"));
    }

    #[test]
    fn test_scope_to_owner_fills_or_rejects() {
        let mut record = json!({"id": "n1"});
        scope_to_owner(&mut record, "u1").unwrap();
        assert_eq!(record["owner_id"], json!("u1"));

        let mut foreign = json!({"id": "n1", "owner_id": "u2"});
        assert!(scope_to_owner(&mut foreign, "u1").is_err());
        assert!(scope_to_owner(&mut json!("n1"), "u1").is_err());
    }

    #[test]
    fn test_parse_api_error_prefers_message_field() {
        let message = parse_api_error(
            StatusCode::CONFLICT,
            r#"{"message":" duplicate key ","hint":"use upsert"}"#,
        );
        assert_eq!(message, "duplicate key (use upsert)");
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }
}
