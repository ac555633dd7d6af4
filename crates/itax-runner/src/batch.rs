//! Sequential batch orchestration. One company fully completes — browser
//! teardown included — before the next starts; the stop flag is honored at
//! company boundaries only, never mid-task.

use crate::report::{BatchReport, ReportRow};
use crate::tasks::CompanyProcessor;
use crate::Result;
use chrono::{DateTime, Utc};
use itax_store::{CompanyStore, Selection};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Snapshot of a run's live counters for the control surface.
#[derive(Debug, Clone, Default)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
    pub running: bool,
    pub current_company: Option<String>,
}

/// Run state owned by one orchestrator instance — explicitly not process
/// globals, so several orchestrators can coexist and tests stay clean.
/// Cloning shares the same underlying state.
#[derive(Clone, Default)]
pub struct BatchRunState {
    progress: Arc<Mutex<BatchProgress>>,
    stop: Arc<AtomicBool>,
}

impl BatchRunState {
    pub fn snapshot(&self) -> BatchProgress {
        self.progress.lock().unwrap().clone()
    }

    /// Ask the run to end at the next company boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn begin(&self, total: usize) {
        self.stop.store(false, Ordering::SeqCst);
        *self.progress.lock().unwrap() = BatchProgress {
            processed: 0,
            total,
            running: true,
            current_company: None,
        };
    }

    fn advance(&self, company: &str) {
        self.progress.lock().unwrap().current_company = Some(company.to_string());
    }

    fn mark_processed(&self) {
        self.progress.lock().unwrap().processed += 1;
    }

    fn finish(&self) {
        let mut progress = self.progress.lock().unwrap();
        progress.running = false;
        progress.current_company = None;
    }
}

/// Summary of one completed batch run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub processed: usize,
    pub stopped_early: bool,
    pub status_counts: BTreeMap<String, usize>,
    pub report_path: Option<PathBuf>,
}

/// Runs one extraction task over a company selection.
pub struct BatchOrchestrator {
    store: Arc<dyn CompanyStore>,
    processor: Arc<dyn CompanyProcessor>,
    state: BatchRunState,
    task_label: String,
    report_dir: Option<PathBuf>,
}

impl BatchOrchestrator {
    pub fn new(
        store: Arc<dyn CompanyStore>,
        processor: Arc<dyn CompanyProcessor>,
        task_label: impl Into<String>,
        report_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            store,
            processor,
            state: BatchRunState::default(),
            task_label: task_label.into(),
            report_dir,
        }
    }

    /// A shared handle onto this orchestrator's run state.
    pub fn state(&self) -> BatchRunState {
        self.state.clone()
    }

    /// Process the selection to completion (or to a requested stop).
    ///
    /// Every company yields exactly one persisted outcome; no failure below
    /// the company boundary aborts the remaining batch.
    pub async fn run(&self, selection: Selection) -> Result<RunReport> {
        let started_at = Utc::now();
        let companies = self.store.fetch(&selection).await?;
        info!(task = %self.task_label, total = companies.len(), "batch starting");
        self.state.begin(companies.len());

        let mut report = match &self.report_dir {
            Some(dir) => Some(BatchReport::create(dir, &self.task_label, started_at)?),
            None => None,
        };
        let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut processed = 0;
        let mut stopped_early = false;

        for company in &companies {
            if self.state.stop_requested() {
                info!("stop requested; ending batch at company boundary");
                stopped_early = true;
                break;
            }
            self.state.advance(&company.company_name);

            let result = self.processor.process(company).await;
            let checked_at = Utc::now();

            // Persist regardless of how the task ended; a sink hiccup must
            // not take the rest of the batch down either.
            if let Err(e) = self
                .store
                .update_status(company.id, &result.status_label, checked_at)
                .await
            {
                warn!(company = %company.company_name, error = %e, "status write failed");
            }

            *status_counts.entry(result.status_label.clone()).or_insert(0) += 1;
            if let Some(r) = report.as_mut() {
                if let Err(e) = r.append(ReportRow::from_result(company, &result, checked_at)) {
                    warn!(error = %e, "report write failed");
                }
            }

            info!(
                company = %company.company_name,
                status = %result.status_label,
                "company processed"
            );
            processed += 1;
            self.state.mark_processed();
        }

        self.state.finish();
        let finished_at = Utc::now();
        info!(processed, total = companies.len(), stopped_early, "batch finished");

        Ok(RunReport {
            task: self.task_label.clone(),
            started_at,
            finished_at,
            total: companies.len(),
            processed,
            stopped_early,
            status_counts,
            report_path: report.map(|r| r.path().to_path_buf()),
        })
    }
}
