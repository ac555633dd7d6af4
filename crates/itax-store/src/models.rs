use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One company row from the data source.
///
/// A null PIN or credential is a valid value, not an error: the automation
/// classifies it as a terminal "missing" status without touching the portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub id: i64,
    pub company_name: String,
    pub kra_pin: Option<String>,
    pub kra_password: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
}

/// The status taxonomy written back to the company row and the batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanyStatus {
    Valid,
    Invalid,
    PasswordExpired,
    Locked,
    PinMissing,
    PasswordMissing,
    PinAndPasswordMissing,
    Error,
}

impl CompanyStatus {
    /// The exact label persisted to the datastore and report. Downstream
    /// dashboards match on these strings; do not reword them.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Valid => "Valid",
            Self::Invalid => "Invalid",
            Self::PasswordExpired => "Password Expired",
            Self::Locked => "Locked",
            Self::PinMissing => "Pin Missing",
            Self::PasswordMissing => "Password Missing",
            Self::PinAndPasswordMissing => "Pin and Password Missing",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The obligation types the portal reports that we normalize into fixed
/// keys. Unknown obligation rows are ignored by design.
pub const KNOWN_OBLIGATIONS: [&str; 6] = [
    "Income Tax Company",
    "VAT",
    "PAYE",
    "Rent Income",
    "Resident Individual",
    "Turnover Tax",
];

/// Sentinel written for obligation types absent from the scraped table —
/// status *and* both dates. Downstream consumers key on the literal string,
/// so it is data, never null.
pub const NO_OBLIGATION: &str = "No obligation";

/// Registration state of one obligation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationEntry {
    pub status: String,
    pub effective_from: String,
    pub effective_to: String,
}

impl ObligationEntry {
    /// The entry used for obligation types missing from the portal table.
    pub fn none() -> Self {
        Self {
            status: NO_OBLIGATION.into(),
            effective_from: NO_OBLIGATION.into(),
            effective_to: NO_OBLIGATION.into(),
        }
    }
}

/// One general-ledger transaction row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub tax_obligation: String,
    pub period: String,
    pub transaction_date: String,
    pub reference: String,
    pub particulars: String,
    pub debit: f64,
    pub credit: f64,
}

/// One employee statutory-deduction row from the payroll screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollRow {
    pub employee_pin: String,
    pub employee_name: String,
    pub gross_pay: f64,
    pub paye: f64,
    pub nssf: f64,
    pub nhif: f64,
}

/// What one task run produced for one company: a structured payload or an
/// error descriptor. Persisted at most once per company per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    PasswordCheck,
    Obligations {
        obligations: BTreeMap<String, ObligationEntry>,
    },
    Certificate {
        url: String,
    },
    Ledger {
        rows: Vec<LedgerRow>,
    },
    Payroll {
        rows: Vec<PayrollRow>,
    },
    /// Precondition short-circuit: the portal was never contacted.
    Skipped {
        reason: String,
    },
    Error {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        partial: Option<serde_json::Value>,
    },
}

/// The terminal result of one company's task run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub company_id: i64,
    pub company_name: String,
    pub status_label: String,
    pub outcome: ExtractionOutcome,
}

impl ExtractionResult {
    pub fn new(company: &CompanyRecord, status: CompanyStatus, outcome: ExtractionOutcome) -> Self {
        Self {
            company_id: company.id,
            company_name: company.company_name.clone(),
            status_label: status.label().to_string(),
            outcome,
        }
    }

    /// Short human line for the report's detail column.
    pub fn detail(&self) -> String {
        match &self.outcome {
            ExtractionOutcome::PasswordCheck => String::new(),
            ExtractionOutcome::Obligations { obligations } => {
                format!("{} obligation types", obligations.len())
            }
            ExtractionOutcome::Certificate { url } => url.clone(),
            ExtractionOutcome::Ledger { rows } => format!("{} ledger rows", rows.len()),
            ExtractionOutcome::Payroll { rows } => format!("{} payroll rows", rows.len()),
            ExtractionOutcome::Skipped { reason } => reason.clone(),
            ExtractionOutcome::Error { reason, .. } => reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels_are_exact() {
        assert_eq!(CompanyStatus::Valid.label(), "Valid");
        assert_eq!(CompanyStatus::PasswordExpired.label(), "Password Expired");
        assert_eq!(CompanyStatus::PinMissing.label(), "Pin Missing");
        assert_eq!(CompanyStatus::PasswordMissing.label(), "Password Missing");
        assert_eq!(
            CompanyStatus::PinAndPasswordMissing.label(),
            "Pin and Password Missing"
        );
        assert_eq!(CompanyStatus::Error.label(), "Error");
    }

    #[test]
    fn test_no_obligation_sentinel_fills_all_three_fields() {
        let entry = ObligationEntry::none();
        assert_eq!(entry.status, "No obligation");
        assert_eq!(entry.effective_from, "No obligation");
        assert_eq!(entry.effective_to, "No obligation");
    }

    #[test]
    fn test_company_record_parses_nullable_fields() {
        let raw = r#"{"id":7,"company_name":"Acme Ltd","kra_pin":null,"kra_password":"pw"}"#;
        let record: CompanyRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.id, 7);
        assert!(record.kra_pin.is_none());
        assert_eq!(record.kra_password.as_deref(), Some("pw"));
        assert!(record.status.is_none());
        assert!(record.last_checked.is_none());
    }

    #[test]
    fn test_extraction_outcome_wire_shape() {
        let outcome = ExtractionOutcome::Certificate {
            url: "https://bucket/doc.pdf".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "certificate");
        assert_eq!(json["url"], "https://bucket/doc.pdf");
    }

    #[test]
    fn test_detail_lines() {
        let company = CompanyRecord {
            id: 1,
            company_name: "Acme".into(),
            kra_pin: Some("P1".into()),
            kra_password: Some("x".into()),
            status: None,
            last_checked: None,
        };
        let result = ExtractionResult::new(
            &company,
            CompanyStatus::Error,
            ExtractionOutcome::Error {
                reason: "submission timed out".into(),
                partial: None,
            },
        );
        assert_eq!(result.detail(), "submission timed out");
        assert_eq!(result.status_label, "Error");
    }
}
