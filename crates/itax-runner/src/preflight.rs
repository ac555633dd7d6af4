//! Precondition checks. These run before any browser or network action and
//! short-circuit to a terminal status — a missing credential is a data fact
//! about the company, never a login failure.

use itax_store::{CompanyRecord, CompanyStatus};
use once_cell::sync::Lazy;
use regex::Regex;

/// KRA PIN format: `P` (non-individual) or `A` (individual) prefix, nine
/// digits, one check letter.
static PIN_FORMAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[PA]\d{9}[A-Z]$").unwrap());

/// Classify missing credentials. `None` means both PIN and password are
/// present and the portal may be contacted.
pub fn missing_credentials(company: &CompanyRecord) -> Option<CompanyStatus> {
    let pin_missing = company
        .kra_pin
        .as_deref()
        .map(str::trim)
        .map_or(true, str::is_empty);
    let password_missing = company
        .kra_password
        .as_deref()
        .map(str::trim)
        .map_or(true, str::is_empty);

    match (pin_missing, password_missing) {
        (true, true) => Some(CompanyStatus::PinAndPasswordMissing),
        (true, false) => Some(CompanyStatus::PinMissing),
        (false, true) => Some(CompanyStatus::PasswordMissing),
        (false, false) => None,
    }
}

/// Whether a PIN is well-formed enough for ledger extraction. Malformed
/// PINs become a descriptive skipped row, not a portal attempt.
pub fn valid_ledger_pin(pin: &str) -> bool {
    PIN_FORMAT.is_match(pin.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(pin: Option<&str>, password: Option<&str>) -> CompanyRecord {
        CompanyRecord {
            id: 1,
            company_name: "Acme Ltd".into(),
            kra_pin: pin.map(Into::into),
            kra_password: password.map(Into::into),
            status: None,
            last_checked: None,
        }
    }

    #[test]
    fn test_both_present() {
        assert_eq!(missing_credentials(&company(Some("P051234567X"), Some("pw"))), None);
    }

    #[test]
    fn test_pin_missing() {
        assert_eq!(
            missing_credentials(&company(None, Some("pw"))),
            Some(CompanyStatus::PinMissing)
        );
    }

    #[test]
    fn test_password_missing() {
        assert_eq!(
            missing_credentials(&company(Some("P051234567X"), None)),
            Some(CompanyStatus::PasswordMissing)
        );
    }

    #[test]
    fn test_both_missing() {
        assert_eq!(
            missing_credentials(&company(None, None)),
            Some(CompanyStatus::PinAndPasswordMissing)
        );
    }

    #[test]
    fn test_blank_strings_count_as_missing() {
        assert_eq!(
            missing_credentials(&company(Some("  "), Some(""))),
            Some(CompanyStatus::PinAndPasswordMissing)
        );
    }

    #[test]
    fn test_ledger_pin_format() {
        assert!(valid_ledger_pin("P051234567X"));
        assert!(valid_ledger_pin("A001234567B"));
        assert!(valid_ledger_pin(" P051234567X "));
        assert!(!valid_ledger_pin("B051234567X"));
        assert!(!valid_ledger_pin("P05123456X"));
        assert!(!valid_ledger_pin("P0512345678"));
        assert!(!valid_ledger_pin(""));
    }
}
