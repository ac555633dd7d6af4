//! The batch's audit artifact: one CSV row per company, rewritten to disk
//! after every company so partial progress survives a crash mid-batch.

use crate::Result;
use chrono::{DateTime, Utc};
use itax_store::{CompanyRecord, ExtractionResult};
use std::path::{Path, PathBuf};

const HEADER: [&str; 5] = ["Company", "KRA PIN", "Status", "Detail", "Checked At"];

/// One report line for one company.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub company_name: String,
    pub tax_pin: String,
    pub status: String,
    pub detail: String,
    pub checked_at: String,
}

impl ReportRow {
    pub fn from_result(
        company: &CompanyRecord,
        result: &ExtractionResult,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            company_name: company.company_name.clone(),
            tax_pin: company.kra_pin.clone().unwrap_or_else(|| "-".into()),
            status: result.status_label.clone(),
            detail: result.detail(),
            checked_at: checked_at.to_rfc3339(),
        }
    }
}

/// An incrementally-written batch report.
pub struct BatchReport {
    path: PathBuf,
    rows: Vec<ReportRow>,
}

impl BatchReport {
    /// Create the report file (header only) under `dir`.
    pub fn create(dir: &Path, task: &str, started_at: DateTime<Utc>) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}-{}.csv", task, started_at.format("%Y%m%d-%H%M%S")));
        let report = Self {
            path,
            rows: Vec::new(),
        };
        report.rewrite()?;
        Ok(report)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row and flush the whole file back to disk.
    pub fn append(&mut self, row: ReportRow) -> Result<()> {
        self.rows.push(row);
        self.rewrite()
    }

    fn rewrite(&self) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().from_path(&self.path)?;
        writer.write_record(HEADER)?;
        for row in &self.rows {
            writer.write_record([
                &row.company_name,
                &row.tax_pin,
                &row.status,
                &row.detail,
                &row.checked_at,
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}
