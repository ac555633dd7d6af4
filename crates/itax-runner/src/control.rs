//! The control surface the dashboard (or any embedding caller) depends on:
//! `start(selection)`, `stop()`, `progress()`, `reports()`. This is the only
//! interface exposed to the UI layer.

use crate::batch::{BatchOrchestrator, BatchProgress, RunReport};
use crate::{Error, Result};
use itax_store::Selection;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::error;

/// Owns an orchestrator and runs at most one batch at a time.
pub struct Supervisor {
    orchestrator: Arc<BatchOrchestrator>,
    reports: Arc<Mutex<Vec<RunReport>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    pub fn new(orchestrator: Arc<BatchOrchestrator>) -> Self {
        Self {
            orchestrator,
            reports: Arc::new(Mutex::new(Vec::new())),
            handle: Mutex::new(None),
        }
    }

    /// Start a batch over `selection`. Rejects a second start while one is
    /// still running.
    pub fn start(&self, selection: Selection) -> Result<()> {
        let mut handle = self.handle.lock().unwrap();
        if let Some(h) = handle.as_ref() {
            if !h.is_finished() {
                return Err(Error::AlreadyRunning);
            }
        }

        let orchestrator = self.orchestrator.clone();
        let reports = self.reports.clone();
        *handle = Some(tokio::spawn(async move {
            match orchestrator.run(selection).await {
                Ok(report) => reports.lock().unwrap().push(report),
                Err(e) => error!(error = %e, "batch run failed"),
            }
        }));
        Ok(())
    }

    /// Request a graceful stop at the next company boundary.
    pub fn stop(&self) {
        self.orchestrator.state().request_stop();
    }

    /// Live counters for the running (or last) batch.
    pub fn progress(&self) -> BatchProgress {
        self.orchestrator.state().snapshot()
    }

    /// Structured history of completed runs, oldest first.
    pub fn reports(&self) -> Vec<RunReport> {
        self.reports.lock().unwrap().clone()
    }

    /// Wait for the current batch (if any) to finish.
    pub async fn join(&self) {
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::CompanyProcessor;
    use async_trait::async_trait;
    use itax_store::{
        CompanyRecord, CompanyStatus, ExtractionOutcome, ExtractionResult, MemoryStore,
    };
    use std::time::Duration;

    struct SlowProcessor {
        delay_ms: u64,
    }

    #[async_trait]
    impl CompanyProcessor for SlowProcessor {
        async fn process(&self, company: &CompanyRecord) -> ExtractionResult {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            ExtractionResult::new(
                company,
                CompanyStatus::Valid,
                ExtractionOutcome::PasswordCheck,
            )
        }
    }

    fn companies(n: i64) -> Vec<CompanyRecord> {
        (1..=n)
            .map(|id| CompanyRecord {
                id,
                company_name: format!("Company {}", id),
                kra_pin: Some(format!("P{:09}X", id)),
                kra_password: Some("pw".into()),
                status: None,
                last_checked: None,
            })
            .collect()
    }

    fn supervisor(n: i64, delay_ms: u64) -> Supervisor {
        let store = Arc::new(MemoryStore::new(companies(n)));
        let processor = Arc::new(SlowProcessor { delay_ms });
        Supervisor::new(Arc::new(BatchOrchestrator::new(
            store,
            processor,
            "password-check",
            None,
        )))
    }

    #[tokio::test]
    async fn test_start_runs_to_completion_and_records_report() {
        let supervisor = supervisor(3, 1);
        supervisor.start(Selection::All).unwrap();
        supervisor.join().await;

        let reports = supervisor.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].processed, 3);
        assert!(!supervisor.progress().running);
    }

    #[tokio::test]
    async fn test_second_start_while_running_is_rejected() {
        let supervisor = supervisor(10, 20);
        supervisor.start(Selection::All).unwrap();
        let second = supervisor.start(Selection::All);
        assert!(matches!(second, Err(Error::AlreadyRunning)));

        supervisor.stop();
        supervisor.join().await;
    }

    #[tokio::test]
    async fn test_restart_after_completion_is_allowed() {
        let supervisor = supervisor(2, 1);
        supervisor.start(Selection::All).unwrap();
        supervisor.join().await;
        supervisor.start(Selection::Ids(vec![1])).unwrap();
        supervisor.join().await;

        let reports = supervisor.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].processed, 2);
        assert_eq!(reports[1].processed, 1);
    }

    #[tokio::test]
    async fn test_stop_ends_the_batch_early() {
        let supervisor = supervisor(20, 20);
        supervisor.start(Selection::All).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        supervisor.stop();
        supervisor.join().await;

        let reports = supervisor.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].stopped_early);
        assert!(reports[0].processed < 20);
    }
}
