//! Password validation: login only, the outcome *is* the extraction.

use itax_portal::LoginOutcome;
use itax_store::{CompanyRecord, CompanyStatus, ExtractionOutcome, ExtractionResult};

/// Map a login outcome onto the persisted status taxonomy. The `… Missing`
/// labels never come through here — preflight produces those before login.
pub fn status_for(outcome: LoginOutcome) -> CompanyStatus {
    match outcome {
        LoginOutcome::Success => CompanyStatus::Valid,
        LoginOutcome::InvalidCredentials => CompanyStatus::Invalid,
        LoginOutcome::PasswordExpired => CompanyStatus::PasswordExpired,
        LoginOutcome::AccountLocked => CompanyStatus::Locked,
        LoginOutcome::WrongCaptcha | LoginOutcome::TimedOut | LoginOutcome::UnknownError => {
            CompanyStatus::Error
        }
    }
}

pub fn result_for(company: &CompanyRecord, outcome: LoginOutcome) -> ExtractionResult {
    let status = status_for(outcome);
    let payload = if status == CompanyStatus::Error {
        ExtractionOutcome::Error {
            reason: format!("login {}", outcome),
            partial: None,
        }
    } else {
        ExtractionOutcome::PasswordCheck
    };
    ExtractionResult::new(company, status, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company() -> CompanyRecord {
        CompanyRecord {
            id: 1,
            company_name: "Acme Ltd".into(),
            kra_pin: Some("P051234567X".into()),
            kra_password: Some("pw".into()),
            status: None,
            last_checked: None,
        }
    }

    #[test]
    fn test_outcome_to_status_mapping() {
        assert_eq!(status_for(LoginOutcome::Success), CompanyStatus::Valid);
        assert_eq!(
            status_for(LoginOutcome::InvalidCredentials),
            CompanyStatus::Invalid
        );
        assert_eq!(
            status_for(LoginOutcome::PasswordExpired),
            CompanyStatus::PasswordExpired
        );
        assert_eq!(status_for(LoginOutcome::AccountLocked), CompanyStatus::Locked);
    }

    #[test]
    fn test_exhausted_captcha_and_timeout_become_error() {
        assert_eq!(status_for(LoginOutcome::WrongCaptcha), CompanyStatus::Error);
        assert_eq!(status_for(LoginOutcome::TimedOut), CompanyStatus::Error);
        assert_eq!(status_for(LoginOutcome::UnknownError), CompanyStatus::Error);
    }

    #[test]
    fn test_valid_result_has_no_error_payload() {
        let result = result_for(&company(), LoginOutcome::Success);
        assert_eq!(result.status_label, "Valid");
        assert!(matches!(result.outcome, ExtractionOutcome::PasswordCheck));
    }

    #[test]
    fn test_timeout_result_carries_reason() {
        let result = result_for(&company(), LoginOutcome::TimedOut);
        assert_eq!(result.status_label, "Error");
        match result.outcome {
            ExtractionOutcome::Error { reason, .. } => {
                assert!(reason.contains("timed out"), "{}", reason)
            }
            other => panic!("expected error outcome, got {:?}", other),
        }
    }
}
