use async_trait::async_trait;
use contactbook_core::Document;
use serde_json::Value;

use crate::error::LegacyError;
use crate::traits::{LegacyConnector, LegacyCredentials, LegacySource};

/// Table the legacy provider kept contacts in.
pub const LEGACY_TABLE: &str = "contacts";

/// Opens PostgREST readers against a Supabase project.
#[derive(Clone, Default)]
pub struct SupabaseConnector {
    http: reqwest::Client,
}

impl SupabaseConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct SupabaseSource {
    http: reqwest::Client,
    endpoint: String,
    key: String,
}

pub(crate) fn table_endpoint(url: &str, table: &str) -> Result<String, LegacyError> {
    let url = url.trim().trim_end_matches('/');
    let has_scheme = url.starts_with("https://") || url.starts_with("http://");
    let has_host = url.split("://").nth(1).is_some_and(|rest| !rest.is_empty());
    if !has_scheme || !has_host {
        return Err(LegacyError::InvalidCredentials(format!("not an http(s) url: {url}")));
    }
    Ok(format!("{url}/rest/v1/{table}"))
}

impl LegacyConnector for SupabaseConnector {
    fn connect(&self, credentials: &LegacyCredentials) -> Result<Box<dyn LegacySource>, LegacyError> {
        let endpoint = table_endpoint(&credentials.url, LEGACY_TABLE)?;
        let key = credentials.key.trim();
        if key.is_empty() {
            return Err(LegacyError::InvalidCredentials("key is required".into()));
        }
        Ok(Box::new(SupabaseSource {
            http: self.http.clone(),
            endpoint,
            key: key.to_string(),
        }))
    }
}

pub(crate) fn rows_to_documents(rows: Vec<Value>) -> Result<Vec<Document>, LegacyError> {
    rows.into_iter()
        .map(|row| match row {
            Value::Object(map) => Ok(map),
            other => Err(LegacyError::Decode(format!("row is not an object: {other}"))),
        })
        .collect()
}

#[async_trait]
impl LegacySource for SupabaseSource {
    async fn fetch_all(&self) -> Result<Vec<Document>, LegacyError> {
        tracing::debug!(endpoint = %self.endpoint, "fetching legacy rows");
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("select", "*")])
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LegacyError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| LegacyError::Decode(e.to_string()))?;
        rows_to_documents(rows)
    }
}
