//! General-ledger extraction: grow the data grid's page size so the whole
//! ledger fits one page, then scrape it in a single pass.

use super::{scrape, TaskResult};
use chrono::NaiveDate;
use itax_portal::{Feature, PortalSession};
use itax_store::{
    CompanyRecord, CompanyStatus, ExtractionOutcome, ExtractionResult, LedgerRow, ResultSink,
};
use tracing::debug;

const GRID_TABLE: &str = "#gridTbl";

/// Select the largest page-size option the grid offers and fire its change
/// handler, so pagination never truncates the scrape.
const GROW_PAGE_SIZE_JS: &str = r#"(() => {
    const sel = document.querySelector("select[name='gridTbl_length']");
    if (!sel) return false;
    const values = Array.from(sel.options)
        .map(o => parseInt(o.value, 10))
        .filter(v => !isNaN(v));
    if (!values.length) return false;
    sel.value = String(Math.max(...values));
    sel.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
})()"#;

pub async fn run(
    session: &mut PortalSession,
    company: &CompanyRecord,
    sink: &dyn ResultSink,
    today: NaiveDate,
) -> TaskResult {
    session.navigate_to(Feature::GeneralLedger).await?;

    let page = session.page();
    let resized: bool = page.evaluate(GROW_PAGE_SIZE_JS).await?;
    if resized {
        let _ = page.wait_for_network_idle(500, 10_000).await;
    } else {
        debug!("page-size selector absent; scraping the current page only");
    }

    let raw = scrape::scrape_table(page, GRID_TABLE).await?;
    let rows = parse_rows(&raw);
    debug!(company = %company.company_name, rows = rows.len(), "ledger scraped");

    let pin = company.kra_pin.clone().unwrap_or_default();
    let payload = serde_json::to_value(&rows)?;
    sink.upsert_extraction(&pin, "ledger", today, payload).await?;

    Ok(ExtractionResult::new(
        company,
        CompanyStatus::Valid,
        ExtractionOutcome::Ledger { rows },
    ))
}

/// Parse scraped grid rows. The first row is the header; rows without the
/// full column set are grid chrome ("no data available", pager cells).
pub fn parse_rows(raw: &[Vec<String>]) -> Vec<LedgerRow> {
    raw.iter()
        .skip(1)
        .filter(|row| row.len() >= 7)
        .map(|row| LedgerRow {
            tax_obligation: row[0].clone(),
            period: row[1].clone(),
            transaction_date: row[2].clone(),
            reference: row[3].clone(),
            particulars: row[4].clone(),
            debit: scrape::parse_amount(&row[5]),
            credit: scrape::parse_amount(&row[6]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_header_is_skipped() {
        let rows = parse_rows(&[
            row(&["Obligation", "Period", "Date", "Ref", "Particulars", "Debit", "Credit"]),
            row(&["VAT", "202601", "05/01/2026", "REF1", "Return filed", "1,000.00", "0.00"]),
        ]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tax_obligation, "VAT");
        assert_eq!(rows[0].debit, 1000.0);
        assert_eq!(rows[0].credit, 0.0);
    }

    #[test]
    fn test_chrome_rows_are_dropped() {
        let rows = parse_rows(&[
            row(&["Obligation", "Period", "Date", "Ref", "Particulars", "Debit", "Credit"]),
            row(&["No data available in table"]),
        ]);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_amounts_with_separators_and_negatives() {
        let rows = parse_rows(&[
            row(&["h", "h", "h", "h", "h", "h", "h"]),
            row(&["PAYE", "202512", "01/12/2025", "R2", "Payment", "(2,500.00)", "12,000.50"]),
        ]);
        assert_eq!(rows[0].debit, -2500.0);
        assert_eq!(rows[0].credit, 12000.50);
    }

    #[test]
    fn test_empty_table() {
        assert!(parse_rows(&[]).is_empty());
    }
}
