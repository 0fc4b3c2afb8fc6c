//! Supabase / PostgREST store

use super::{
    dedup_by_key, RetentionError, Store, StoreInitError, StoreReadError, StoreWriteError,
};
use crate::data::Record;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;

/// Connection settings for a PostgREST endpoint
#[derive(Debug, Clone)]
pub struct PostgrestConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Service key sent as `apikey` and bearer token
    pub key: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl PostgrestConfig {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LatestRow {
    event_time: DateTime<Utc>,
}

/// Store backed by PostgREST's REST interface
pub struct PostgrestStore {
    base: String,
    client: Client,
}

impl PostgrestStore {
    pub fn new(config: PostgrestConfig) -> Result<Self, StoreInitError> {
        let mut apikey =
            HeaderValue::from_str(&config.key).map_err(|_| StoreInitError::InvalidKey)?;
        apikey.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.key))
            .map_err(|_| StoreInitError::InvalidKey)?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("apikey", apikey);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base, table)
    }
}

/// Total row count from a `Content-Range` header such as `0-24/25` or `*/0`
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

async fn error_body(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}

#[async_trait]
impl Store for PostgrestStore {
    async fn upsert<R: Record>(&self, rows: &[R]) -> Result<(), StoreWriteError> {
        if rows.is_empty() {
            return Ok(());
        }

        let rows = dedup_by_key(rows);
        let body = serde_json::to_vec(&rows)?;

        let response = self
            .client
            .post(self.table_url(R::TABLE))
            .query(&[("on_conflict", R::CONFLICT_COLUMNS.join(","))])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(StoreWriteError::Rejected {
                table: R::TABLE,
                status,
                body,
            });
        }

        tracing::debug!(table = R::TABLE, rows = rows.len(), "Upserted batch");
        Ok(())
    }

    async fn delete_before(
        &self,
        table: &'static str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RetentionError> {
        let filter = format!("lt.{}", cutoff.to_rfc3339_opts(SecondsFormat::Millis, true));

        let response = self
            .client
            .delete(self.table_url(table))
            .query(&[("event_time", filter)])
            .header("Prefer", "count=exact,return=minimal")
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(RetentionError::Rejected {
                table,
                status,
                body,
            });
        }

        let deleted = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .unwrap_or(0);

        Ok(deleted)
    }

    async fn latest_event_time(
        &self,
        table: &'static str,
    ) -> Result<Option<DateTime<Utc>>, StoreReadError> {
        let response = self
            .client
            .get(self.table_url(table))
            .query(&[
                ("select", "event_time"),
                ("order", "event_time.desc"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(StoreReadError::Rejected {
                table,
                status,
                body,
            });
        }

        let body = response.text().await?;
        let rows: Vec<LatestRow> =
            serde_json::from_str(&body).map_err(|e| StoreReadError::Parse(e.to_string()))?;

        Ok(rows.into_iter().next().map(|r| r.event_time))
    }
}
