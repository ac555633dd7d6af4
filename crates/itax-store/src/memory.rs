use crate::store::{CompanyStore, ResultSink, Selection};
use crate::{CompanyRecord, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory implementation of both store contracts, for orchestrator tests
/// and offline dry runs. Mirrors the REST store's semantics: id-ordered
/// fetches, date-keyed history overwrite on same-day reruns.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    companies: Vec<CompanyRecord>,
    extractions: HashMap<(String, String), HashMap<String, serde_json::Value>>,
    uploads: Vec<(String, usize)>,
}

impl MemoryStore {
    pub fn new(companies: Vec<CompanyRecord>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                companies,
                ..Default::default()
            }),
        }
    }

    /// The `(status, last_checked)` pair currently persisted for a company.
    pub fn status_of(&self, id: i64) -> Option<(String, DateTime<Utc>)> {
        let inner = self.inner.lock().unwrap();
        inner
            .companies
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| Some((c.status.clone()?, c.last_checked?)))
    }

    /// The history map persisted for `(key, feature)`.
    pub fn history_of(&self, key: &str, feature: &str) -> HashMap<String, serde_json::Value> {
        let inner = self.inner.lock().unwrap();
        inner
            .extractions
            .get(&(key.to_string(), feature.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Paths of uploaded documents, in upload order.
    pub fn uploaded_paths(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.uploads.iter().map(|(p, _)| p.clone()).collect()
    }
}

#[async_trait]
impl CompanyStore for MemoryStore {
    async fn fetch(&self, selection: &Selection) -> Result<Vec<CompanyRecord>> {
        let inner = self.inner.lock().unwrap();
        let mut companies = inner.companies.clone();
        companies.sort_by_key(|c| c.id);

        Ok(match selection {
            Selection::All => companies,
            Selection::Ids(ids) => companies
                .into_iter()
                .filter(|c| ids.contains(&c.id))
                .collect(),
            Selection::Window {
                start_index,
                batch_size,
            } => companies
                .into_iter()
                .skip(*start_index as usize)
                .take(*batch_size as usize)
                .collect(),
        })
    }

    async fn update_status(
        &self,
        id: i64,
        status: &str,
        last_checked: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(company) = inner.companies.iter_mut().find(|c| c.id == id) {
            company.status = Some(status.to_string());
            company.last_checked = Some(last_checked);
        }
        Ok(())
    }
}

#[async_trait]
impl ResultSink for MemoryStore {
    async fn upsert_extraction(
        &self,
        key: &str,
        feature: &str,
        date: NaiveDate,
        payload: serde_json::Value,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .extractions
            .entry((key.to_string(), feature.to_string()))
            .or_default()
            .insert(date.format("%Y-%m-%d").to_string(), payload);
        Ok(())
    }

    async fn upload_document(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.uploads.push((path.to_string(), bytes.len()));
        Ok(format!("memory://documents/{}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn company(id: i64, name: &str) -> CompanyRecord {
        CompanyRecord {
            id,
            company_name: name.into(),
            kra_pin: Some(format!("P{:010}", id)),
            kra_password: Some("pw".into()),
            status: None,
            last_checked: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_orders_by_id() {
        let store = MemoryStore::new(vec![company(3, "c"), company(1, "a"), company(2, "b")]);
        let all = store.fetch(&Selection::All).await.unwrap();
        let ids: Vec<i64> = all.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_by_ids() {
        let store = MemoryStore::new(vec![company(1, "a"), company(2, "b"), company(3, "c")]);
        let slice = store.fetch(&Selection::Ids(vec![3, 1])).await.unwrap();
        let ids: Vec<i64> = slice.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_fetch_window_is_disjoint() {
        let store = MemoryStore::new((1..=10).map(|i| company(i, "x")).collect());
        let first = store
            .fetch(&Selection::Window {
                start_index: 0,
                batch_size: 4,
            })
            .await
            .unwrap();
        let second = store
            .fetch(&Selection::Window {
                start_index: 4,
                batch_size: 4,
            })
            .await
            .unwrap();
        let first_ids: Vec<i64> = first.iter().map(|c| c.id).collect();
        let second_ids: Vec<i64> = second.iter().map(|c| c.id).collect();
        assert_eq!(first_ids, vec![1, 2, 3, 4]);
        assert_eq!(second_ids, vec![5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn test_update_status_persists() {
        let store = MemoryStore::new(vec![company(1, "a")]);
        let now = Utc::now();
        store.update_status(1, "Valid", now).await.unwrap();
        let (status, checked) = store.status_of(1).unwrap();
        assert_eq!(status, "Valid");
        assert_eq!(checked, now);
    }

    #[tokio::test]
    async fn test_same_day_rerun_overwrites_not_appends() {
        let store = MemoryStore::default();
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();

        store
            .upsert_extraction("P123", "obligations", date, json!({"v": 1}))
            .await
            .unwrap();
        store
            .upsert_extraction("P123", "obligations", date, json!({"v": 2}))
            .await
            .unwrap();

        let history = store.history_of("P123", "obligations");
        assert_eq!(history.len(), 1);
        assert_eq!(history["2026-08-07"], json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_distinct_dates_accumulate() {
        let store = MemoryStore::default();
        let d1 = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();

        store
            .upsert_extraction("P123", "certificate", d1, json!({"url": "a"}))
            .await
            .unwrap();
        store
            .upsert_extraction("P123", "certificate", d2, json!({"url": "b"}))
            .await
            .unwrap();

        assert_eq!(store.history_of("P123", "certificate").len(), 2);
    }

    #[tokio::test]
    async fn test_upload_returns_durable_url() {
        let store = MemoryStore::default();
        let url = store
            .upload_document("certificates/P1/doc.pdf", vec![1, 2, 3], "application/pdf")
            .await
            .unwrap();
        assert_eq!(url, "memory://documents/certificates/P1/doc.pdf");
        assert_eq!(store.uploaded_paths(), vec!["certificates/P1/doc.pdf"]);
    }
}
