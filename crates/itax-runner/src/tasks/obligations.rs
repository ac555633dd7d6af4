//! PIN obligation check: a secondary lookup form (with its own captcha when
//! the portal decides to show one), a flaky details panel, and a table of
//! obligation registrations normalized into fixed keys.

use super::{scrape, TaskResult};
use crate::config::Settings;
use chrono::NaiveDate;
use itax_portal::{click_with_retry, element_exists, Feature, PortalSession};
use itax_store::{
    CompanyRecord, CompanyStatus, ExtractionOutcome, ExtractionResult, ObligationEntry,
    ResultSink, KNOWN_OBLIGATIONS, NO_OBLIGATION,
};
use std::collections::BTreeMap;
use tracing::debug;

const PIN_LOOKUP_INPUT: &str = "input[name='vo.pinNo']";
const LOOKUP_CAPTCHA_IMAGE: &str = "#captchaImage";
const LOOKUP_CAPTCHA_INPUT: &str = "input[name='captcahText']";
const CONSULT_BUTTON: &str = "input[value='Consult']";
const DETAILS_LINK: &str = "a[href*='viewObligationDetails']";
const OBLIGATION_TABLE: &str = "#obligationDtlTbl";

pub async fn run(
    session: &mut PortalSession,
    company: &CompanyRecord,
    sink: &dyn ResultSink,
    settings: &Settings,
    today: NaiveDate,
) -> TaskResult {
    session.navigate_to(Feature::PinChecker).await?;

    let pin = company.kra_pin.clone().unwrap_or_default();
    let page = session.page();
    page.fill(PIN_LOOKUP_INPUT, &pin).await?;

    // The lookup form sometimes carries its own arithmetic captcha.
    if element_exists(page, LOOKUP_CAPTCHA_IMAGE).await? {
        session
            .solve_captcha_into(LOOKUP_CAPTCHA_IMAGE, LOOKUP_CAPTCHA_INPUT)
            .await?;
    }

    let page = session.page();
    click_with_retry(page, CONSULT_BUTTON, 3, 500).await?;

    // The details panel routinely swallows the first several clicks while
    // its backing request loads.
    click_with_retry(
        page,
        DETAILS_LINK,
        settings.retry.menu_click_retries,
        500,
    )
    .await?;
    page.wait_for(OBLIGATION_TABLE, session.policy().step_timeout_ms)
        .await?;

    let raw = scrape::scrape_table(page, OBLIGATION_TABLE).await?;
    let obligations = normalize(&raw);
    debug!(
        company = %company.company_name,
        registered = obligations.values().filter(|e| e.status != NO_OBLIGATION).count(),
        "obligations scraped"
    );

    let payload = serde_json::to_value(&obligations)?;
    sink.upsert_extraction(&pin, "obligations", today, payload)
        .await?;

    Ok(ExtractionResult::new(
        company,
        CompanyStatus::Valid,
        ExtractionOutcome::Obligations { obligations },
    ))
}

/// Normalize scraped `[name, status, from, to]` rows into the six known
/// obligation keys. Absent types get the `"No obligation"` sentinel in all
/// three fields; unknown rows are ignored.
pub fn normalize(rows: &[Vec<String>]) -> BTreeMap<String, ObligationEntry> {
    let mut map: BTreeMap<String, ObligationEntry> = KNOWN_OBLIGATIONS
        .iter()
        .map(|k| (k.to_string(), ObligationEntry::none()))
        .collect();

    for row in rows {
        if row.len() < 4 {
            continue;
        }
        let name = fold_name(&row[0]);
        let matched = KNOWN_OBLIGATIONS
            .iter()
            .find(|known| name.contains(&fold_name(known)));
        if let Some(known) = matched {
            map.insert(
                known.to_string(),
                ObligationEntry {
                    status: row[1].clone(),
                    effective_from: row[2].clone(),
                    effective_to: row[3].clone(),
                },
            );
        }
    }
    map
}

/// Lowercased alphanumerics only, so `"Income Tax - PAYE"` matches `"PAYE"`.
fn fold_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_absent_types_get_sentinel_in_all_fields() {
        let map = normalize(&[]);
        assert_eq!(map.len(), KNOWN_OBLIGATIONS.len());
        for entry in map.values() {
            assert_eq!(entry.status, "No obligation");
            assert_eq!(entry.effective_from, "No obligation");
            assert_eq!(entry.effective_to, "No obligation");
        }
    }

    #[test]
    fn test_registered_row_is_normalized() {
        let map = normalize(&[
            row(&["Obligation Name", "Status", "Effective From", "Effective To"]),
            row(&["Value Added Tax (VAT)", "Registered", "01/01/2020", "Active"]),
        ]);
        let vat = &map["VAT"];
        assert_eq!(vat.status, "Registered");
        assert_eq!(vat.effective_from, "01/01/2020");
        assert_eq!(vat.effective_to, "Active");
        assert_eq!(map["PAYE"], ObligationEntry::none());
    }

    #[test]
    fn test_verbose_portal_names_match_known_keys() {
        let map = normalize(&[
            row(&["Income Tax - PAYE", "Registered", "01/06/2018", "Active"]),
            row(&["Income Tax - Company", "Registered", "01/01/2015", "Active"]),
            row(&["Rent Income (MRI)", "Dormant", "01/03/2021", "31/12/2022"]),
        ]);
        assert_eq!(map["PAYE"].status, "Registered");
        assert_eq!(map["Income Tax Company"].status, "Registered");
        assert_eq!(map["Rent Income"].status, "Dormant");
        assert_eq!(map["Rent Income"].effective_to, "31/12/2022");
    }

    #[test]
    fn test_unknown_rows_are_ignored() {
        let map = normalize(&[row(&[
            "Excise Duty",
            "Registered",
            "01/01/2020",
            "Active",
        ])]);
        assert_eq!(map.len(), KNOWN_OBLIGATIONS.len());
        assert!(map.values().all(|e| e.status == "No obligation"));
    }

    #[test]
    fn test_short_rows_are_ignored() {
        let map = normalize(&[row(&["VAT", "Registered"])]);
        assert_eq!(map["VAT"], ObligationEntry::none());
    }

    #[test]
    fn test_fold_name() {
        assert_eq!(fold_name("Income Tax - PAYE"), "incometaxpaye");
        assert_eq!(fold_name("Value Added Tax (VAT)"), "valueaddedtaxvat");
    }
}
