//! Per-feature extraction tasks and the processor that runs one company
//! end to end: preflight → session launch → login → task → teardown.

pub mod certificate;
pub mod ledger;
pub mod obligations;
pub mod password;
pub mod payroll;

mod scrape;

pub use certificate::CertificateKind;
pub use scrape::{parse_amount, scrape_table};

use crate::config::Settings;
use crate::preflight;
use async_trait::async_trait;
use chrono::Utc;
use itax_portal::{Credentials, Feature, LoginOutcome, PortalSession};
use itax_store::{
    CompanyRecord, CompanyStatus, ExtractionOutcome, ExtractionResult, ResultSink,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Which extraction task a batch run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    PasswordCheck,
    ObligationCheck,
    PinCertificate,
    TccCertificate,
    Ledger,
    Payroll,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PasswordCheck => "password-check",
            Self::ObligationCheck => "obligation-check",
            Self::PinCertificate => "pin-certificate",
            Self::TccCertificate => "tcc-certificate",
            Self::Ledger => "ledger",
            Self::Payroll => "payroll",
        }
    }

    /// The portal feature this task navigates to after login. Password
    /// validation is login-only.
    pub fn feature(&self) -> Option<Feature> {
        match self {
            Self::PasswordCheck => None,
            Self::ObligationCheck => Some(Feature::PinChecker),
            Self::PinCertificate => Some(Feature::PinCertificate),
            Self::TccCertificate => Some(Feature::TccReprint),
            Self::Ledger => Some(Feature::GeneralLedger),
            Self::Payroll => Some(Feature::PayrollStatutory),
        }
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password-check" => Ok(Self::PasswordCheck),
            "obligation-check" => Ok(Self::ObligationCheck),
            "pin-certificate" => Ok(Self::PinCertificate),
            "tcc-certificate" => Ok(Self::TccCertificate),
            "ledger" => Ok(Self::Ledger),
            "payroll" => Ok(Self::Payroll),
            other => Err(format!(
                "unknown task '{}' (expected one of: password-check, obligation-check, \
                 pin-certificate, tcc-certificate, ledger, payroll)",
                other
            )),
        }
    }
}

/// Errors a task can hit after login. They never leave the processor — the
/// company boundary converts them into an `Error` result and the batch
/// moves on.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Portal(#[from] itax_portal::Error),

    #[error(transparent)]
    Browser(#[from] itax_portal::BrowserError),

    #[error(transparent)]
    Store(#[from] itax_store::Error),

    #[error("payload encode: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TaskResult = std::result::Result<ExtractionResult, TaskError>;

/// Processes one company to a terminal [`ExtractionResult`].
///
/// Implementations never return an error: every failure mode is classified
/// into the result itself so the orchestrator can stay fault-isolated.
#[async_trait]
pub trait CompanyProcessor: Send + Sync {
    async fn process(&self, company: &CompanyRecord) -> ExtractionResult;
}

/// The real processor: one browser session per company, closed on every
/// path before the result is returned.
pub struct PortalProcessor {
    settings: Arc<Settings>,
    kind: TaskKind,
    sink: Arc<dyn ResultSink>,
}

impl PortalProcessor {
    pub fn new(settings: Arc<Settings>, kind: TaskKind, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            settings,
            kind,
            sink,
        }
    }

    fn skipped(&self, company: &CompanyRecord, status: CompanyStatus) -> ExtractionResult {
        ExtractionResult::new(
            company,
            status,
            ExtractionOutcome::Skipped {
                reason: status.label().to_string(),
            },
        )
    }

    fn error(&self, company: &CompanyRecord, reason: String) -> ExtractionResult {
        ExtractionResult::new(
            company,
            CompanyStatus::Error,
            ExtractionOutcome::Error {
                reason,
                partial: None,
            },
        )
    }

    async fn run_in_session(
        &self,
        session: &mut PortalSession,
        company: &CompanyRecord,
        pin: &str,
    ) -> TaskResult {
        let creds = Credentials {
            pin: pin.to_string(),
            password: company.kra_password.clone().unwrap_or_default(),
        };
        let login = session.login(&creds).await?;
        info!(company = %company.company_name, outcome = %login, "login classified");

        if self.kind == TaskKind::PasswordCheck {
            return Ok(password::result_for(company, login));
        }
        if login != LoginOutcome::Success {
            return Ok(ExtractionResult::new(
                company,
                password::status_for(login),
                ExtractionOutcome::Error {
                    reason: format!("login failed: {}", login),
                    partial: None,
                },
            ));
        }

        let today = Utc::now().date_naive();
        let result = match self.kind {
            TaskKind::PasswordCheck => unreachable!("handled above"),
            TaskKind::ObligationCheck => {
                obligations::run(session, company, self.sink.as_ref(), &self.settings, today)
                    .await?
            }
            TaskKind::PinCertificate => {
                certificate::run(
                    session,
                    company,
                    CertificateKind::Pin,
                    self.sink.as_ref(),
                    &self.settings,
                    today,
                )
                .await?
            }
            TaskKind::TccCertificate => {
                certificate::run(
                    session,
                    company,
                    CertificateKind::Tcc,
                    self.sink.as_ref(),
                    &self.settings,
                    today,
                )
                .await?
            }
            TaskKind::Ledger => {
                ledger::run(session, company, self.sink.as_ref(), today).await?
            }
            TaskKind::Payroll => {
                payroll::run(session, company, self.sink.as_ref(), today).await?
            }
        };

        // Best-effort; the session is discarded right after either way.
        let _ = session.logout().await;
        Ok(result)
    }
}

#[async_trait]
impl CompanyProcessor for PortalProcessor {
    async fn process(&self, company: &CompanyRecord) -> ExtractionResult {
        // Preconditions short-circuit before any browser or network action.
        if let Some(status) = preflight::missing_credentials(company) {
            info!(company = %company.company_name, status = status.label(), "skipping: credentials missing");
            return self.skipped(company, status);
        }
        let pin = company.kra_pin.clone().unwrap_or_default();
        if self.kind == TaskKind::Ledger && !preflight::valid_ledger_pin(&pin) {
            info!(company = %company.company_name, %pin, "skipping: PIN format invalid for ledger");
            return ExtractionResult::new(
                company,
                CompanyStatus::Error,
                ExtractionOutcome::Skipped {
                    reason: format!("invalid PIN format: {}", pin),
                },
            );
        }

        let solver = match self.settings.captcha_solver() {
            Ok(solver) => solver,
            Err(e) => return self.error(company, format!("captcha backend unavailable: {}", e)),
        };
        let mut session = match PortalSession::launch(
            &self.settings.portal.login_url,
            &self.settings.browser_settings(),
            solver,
            self.settings.login_policy(),
        )
        .await
        {
            Ok(session) => session,
            Err(e) => return self.error(company, format!("browser launch failed: {}", e)),
        };

        // From here the browser is live: no early return until close() has
        // run, whatever the task did.
        let outcome = self.run_in_session(&mut session, company, &pin).await;
        if let Err(e) = session.close().await {
            warn!(company = %company.company_name, error = %e, "browser teardown failed");
        }

        match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(company = %company.company_name, error = %e, "task failed");
                self.error(company, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_labels_round_trip() {
        for kind in [
            TaskKind::PasswordCheck,
            TaskKind::ObligationCheck,
            TaskKind::PinCertificate,
            TaskKind::TccCertificate,
            TaskKind::Ledger,
            TaskKind::Payroll,
        ] {
            assert_eq!(TaskKind::from_str(kind.label()).unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_task_rejected() {
        assert!(TaskKind::from_str("vat-return").is_err());
    }

    #[test]
    fn test_only_password_check_skips_navigation() {
        assert!(TaskKind::PasswordCheck.feature().is_none());
        assert_eq!(TaskKind::ObligationCheck.feature(), Some(Feature::PinChecker));
        assert_eq!(TaskKind::Ledger.feature(), Some(Feature::GeneralLedger));
    }
}
