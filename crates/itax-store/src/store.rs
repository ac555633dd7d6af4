use crate::{CompanyRecord, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Which slice of the company table a batch run covers.
///
/// `Window` is the sharded-worker variant: each worker process owns a
/// disjoint index range over the id-ordered table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Ids(Vec<i64>),
    Window { start_index: u32, batch_size: u32 },
}

/// Read side of the company table.
#[async_trait]
pub trait CompanyStore: Send + Sync {
    /// Fetch the selected companies in ascending id order.
    async fn fetch(&self, selection: &Selection) -> Result<Vec<CompanyRecord>>;

    /// Write back the terminal status and check timestamp for one company.
    async fn update_status(
        &self,
        id: i64,
        status: &str,
        last_checked: DateTime<Utc>,
    ) -> Result<()>;
}

/// Write side for structured extraction output and binary documents.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Upsert one extraction payload under `(key, feature)`, keyed by run
    /// date inside the history map. A rerun on the same date overwrites that
    /// date's entry; it never appends.
    async fn upsert_extraction(
        &self,
        key: &str,
        feature: &str,
        date: NaiveDate,
        payload: serde_json::Value,
    ) -> Result<()>;

    /// Upload a document and return its durable URL. Ownership of the bytes
    /// transfers to object storage; only the URL is kept.
    async fn upload_document(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String>;
}
