use crate::store::{CompanyStore, ResultSink, Selection};
use crate::{CompanyRecord, Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RANGE};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Connection settings for the Supabase project backing the dashboard.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Service-role key. Comes from the environment, never from config files.
    pub api_key: String,
    pub companies_table: String,
    pub extractions_table: String,
    pub documents_bucket: String,
}

impl SupabaseConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            companies_table: "companies".into(),
            extractions_table: "extractions".into(),
            documents_bucket: "documents".into(),
        }
    }
}

/// Supabase REST implementation of both store contracts: PostgREST for
/// table reads/patches, the storage API for document uploads.
pub struct SupabaseStore {
    http: reqwest::Client,
    config: SupabaseConfig,
}

#[derive(Debug, Deserialize)]
struct ExtractionRow {
    #[serde(default)]
    history: serde_json::Map<String, serde_json::Value>,
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, table)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let key = &self.config.api_key;
        if let Ok(value) = HeaderValue::from_str(key) {
            headers.insert("apikey", value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Existing date-keyed history for `(key, feature)`, empty if absent.
    async fn fetch_history(
        &self,
        key: &str,
        feature: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let url = format!(
            "{}?company_key=eq.{}&feature=eq.{}&select=history",
            self.rest_url(&self.config.extractions_table),
            key,
            feature
        );
        let response = self.http.get(&url).headers(self.headers()).send().await?;
        let rows: Vec<ExtractionRow> = Self::check(response).await?.json().await?;
        Ok(rows.into_iter().next().map(|r| r.history).unwrap_or_default())
    }
}

#[async_trait]
impl CompanyStore for SupabaseStore {
    async fn fetch(&self, selection: &Selection) -> Result<Vec<CompanyRecord>> {
        let mut url = format!(
            "{}?select=*&order=id.asc",
            self.rest_url(&self.config.companies_table)
        );
        let mut headers = self.headers();

        match selection {
            Selection::All => {}
            Selection::Ids(ids) => {
                let list = ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                url.push_str(&format!("&id=in.({})", list));
            }
            Selection::Window {
                start_index,
                batch_size,
            } => {
                // PostgREST windows by the Range header over the ordered set.
                let end = start_index + batch_size.saturating_sub(1);
                if let Ok(value) = HeaderValue::from_str(&format!("{}-{}", start_index, end)) {
                    headers.insert(RANGE, value);
                }
            }
        }

        debug!(%url, "fetching company slice");
        let response = self.http.get(&url).headers(headers).send().await?;
        let companies: Vec<CompanyRecord> = Self::check(response).await?.json().await?;
        Ok(companies)
    }

    async fn update_status(
        &self,
        id: i64,
        status: &str,
        last_checked: DateTime<Utc>,
    ) -> Result<()> {
        let url = format!(
            "{}?id=eq.{}",
            self.rest_url(&self.config.companies_table),
            id
        );
        let body = json!({
            "status": status,
            "last_checked": last_checked.to_rfc3339(),
        });
        let response = self
            .http
            .patch(&url)
            .headers(self.headers())
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        debug!(id, status, "company status updated");
        Ok(())
    }
}

#[async_trait]
impl ResultSink for SupabaseStore {
    async fn upsert_extraction(
        &self,
        key: &str,
        feature: &str,
        date: NaiveDate,
        payload: serde_json::Value,
    ) -> Result<()> {
        // Read-merge-write: the history map is small (one entry per run
        // date) and the orchestrator is the only writer for its shard.
        let mut history = match self.fetch_history(key, feature).await {
            Ok(history) => history,
            Err(e) => {
                warn!(key, feature, error = %e, "history read failed, starting fresh");
                serde_json::Map::new()
            }
        };
        history.insert(date.format("%Y-%m-%d").to_string(), payload);

        let url = format!(
            "{}?on_conflict=company_key,feature",
            self.rest_url(&self.config.extractions_table)
        );
        let body = json!({
            "company_key": key,
            "feature": feature,
            "history": history,
        });
        let response = self
            .http
            .post(&url)
            .headers(self.headers())
            .header("Prefer", "resolution=merge-duplicates")
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        debug!(key, feature, %date, "extraction history upserted");
        Ok(())
    }

    async fn upload_document(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url, self.config.documents_bucket, path
        );
        let response = self
            .http
            .post(&url)
            .headers(self.headers())
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await?;

        let public_url = format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base_url, self.config.documents_bucket, path
        );
        debug!(%public_url, "document uploaded");
        Ok(public_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_urls() {
        let store = SupabaseStore::new(SupabaseConfig::new("https://x.supabase.co", "key"));
        assert_eq!(
            store.rest_url("companies"),
            "https://x.supabase.co/rest/v1/companies"
        );
    }

    #[test]
    fn test_headers_carry_both_auth_forms() {
        let store = SupabaseStore::new(SupabaseConfig::new("https://x.supabase.co", "secret"));
        let headers = store.headers();
        assert_eq!(headers.get("apikey").unwrap(), "secret");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
    }

    #[test]
    fn test_extraction_row_defaults_to_empty_history() {
        let row: ExtractionRow = serde_json::from_str("{}").unwrap();
        assert!(row.history.is_empty());
    }
}
