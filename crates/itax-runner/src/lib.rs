//! # itax-runner
//!
//! Runs extraction tasks over batches of companies: pulls a company slice
//! from the data source, processes each company sequentially (one browser
//! session per company, torn down before the next), persists every outcome,
//! and keeps an incremental CSV report on disk so partial progress survives
//! a crash.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use itax_runner::{BatchOrchestrator, Settings, TaskKind};
//! use itax_runner::tasks::PortalProcessor;
//! use itax_store::{ResultSink, Selection, SupabaseStore};
//!
//! # #[tokio::main]
//! # async fn main() -> itax_runner::Result<()> {
//! let settings = Settings::load("runner.yaml")?;
//! let store = Arc::new(SupabaseStore::new(settings.supabase_config()?));
//! let sink: Arc<dyn ResultSink> = store.clone();
//! let task = TaskKind::PasswordCheck;
//! let processor = Arc::new(PortalProcessor::new(Arc::new(settings), task, sink));
//! let orchestrator = BatchOrchestrator::new(store, processor, task.label(), None);
//! let report = orchestrator.run(Selection::All).await?;
//! println!("processed {}/{}", report.processed, report.total);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod control;
pub mod preflight;
pub mod report;
pub mod tasks;

pub use batch::{BatchOrchestrator, BatchProgress, BatchRunState, RunReport};
pub use config::Settings;
pub use control::Supervisor;
pub use tasks::TaskKind;

/// Result type for itax-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during configuration or orchestration.
///
/// Per-company failures never surface here — they are classified into the
/// company's terminal status and the batch continues.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("store error: {0}")]
    Store(#[from] itax_store::Error),

    #[error("a batch is already running")]
    AlreadyRunning,
}
