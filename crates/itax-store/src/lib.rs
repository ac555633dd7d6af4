//! # itax-store
//!
//! The automation core's view of the outside world: a company data source
//! (rows with PIN, credential and status fields) and a result sink (status
//! updates, date-keyed structured extraction history, binary document
//! uploads).
//!
//! `SupabaseStore` implements both contracts over the Supabase REST surface;
//! `MemoryStore` implements them in memory for tests and dry runs.

mod memory;
mod models;
mod store;
mod supabase;

pub use memory::MemoryStore;
pub use models::{
    CompanyRecord, CompanyStatus, ExtractionOutcome, ExtractionResult, LedgerRow,
    ObligationEntry, PayrollRow, KNOWN_OBLIGATIONS, NO_OBLIGATION,
};
pub use store::{CompanyStore, ResultSink, Selection};
pub use supabase::{SupabaseConfig, SupabaseStore};

/// Result type for itax-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the data source / result sink layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error: {status} {body}")]
    Api { status: u16, body: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}
