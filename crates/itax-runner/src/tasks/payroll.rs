//! Payroll statutory export: scrape the employee statutory-deduction grid
//! (PAYE/NSSF/NHIF) and persist the rows.

use super::{scrape, TaskResult};
use chrono::NaiveDate;
use itax_portal::{Feature, PortalSession};
use itax_store::{
    CompanyRecord, CompanyStatus, ExtractionOutcome, ExtractionResult, PayrollRow, ResultSink,
};
use tracing::debug;

const PAYROLL_GRID: &str = "#payrollGrid";

pub async fn run(
    session: &mut PortalSession,
    company: &CompanyRecord,
    sink: &dyn ResultSink,
    today: NaiveDate,
) -> TaskResult {
    session.navigate_to(Feature::PayrollStatutory).await?;

    let page = session.page();
    let raw = scrape::scrape_table(page, PAYROLL_GRID).await?;
    let rows = parse_rows(&raw);
    debug!(company = %company.company_name, rows = rows.len(), "payroll statutory rows scraped");

    let pin = company.kra_pin.clone().unwrap_or_default();
    let payload = serde_json::to_value(&rows)?;
    sink.upsert_extraction(&pin, "payroll", today, payload).await?;

    Ok(ExtractionResult::new(
        company,
        CompanyStatus::Valid,
        ExtractionOutcome::Payroll { rows },
    ))
}

/// Parse `[pin, name, gross, paye, nssf, nhif]` rows, header excluded.
pub fn parse_rows(raw: &[Vec<String>]) -> Vec<PayrollRow> {
    raw.iter()
        .skip(1)
        .filter(|row| row.len() >= 6)
        .map(|row| PayrollRow {
            employee_pin: row[0].clone(),
            employee_name: row[1].clone(),
            gross_pay: scrape::parse_amount(&row[2]),
            paye: scrape::parse_amount(&row[3]),
            nssf: scrape::parse_amount(&row[4]),
            nhif: scrape::parse_amount(&row[5]),
        })
        .collect()
}
