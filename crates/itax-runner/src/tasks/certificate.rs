//! Certificate reprint (PIN certificate and TCC): trigger the reprint under
//! an auto-confirm dialog policy, capture the document, upload it, and
//! record the URL in the date-keyed extraction history.

use super::TaskResult;
use crate::config::Settings;
use chrono::NaiveDate;
use itax_portal::{click_with_retry, Feature, PortalSession};
use itax_store::{CompanyRecord, CompanyStatus, ExtractionOutcome, ExtractionResult, ResultSink};
use serde_json::json;
use tracing::debug;

const REPRINT_BUTTON: &str = "input[value='Reprint']";
const CONSULT_BUTTON: &str = "input[value='Consult']";

/// Find the generated document's link after the reprint request settles.
const DOCUMENT_LINK_JS: &str = r#"(() => {
    const a = document.querySelector("a[href$='.pdf'], a[href*='downloadCert'], a[href*='reprint']");
    return a ? a.href : null;
})()"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateKind {
    Pin,
    Tcc,
}

impl CertificateKind {
    pub fn feature(&self) -> Feature {
        match self {
            Self::Pin => Feature::PinCertificate,
            Self::Tcc => Feature::TccReprint,
        }
    }

    /// History-map feature key and file stem.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Pin => "pin-certificate",
            Self::Tcc => "tcc-certificate",
        }
    }

    fn trigger(&self) -> &'static str {
        match self {
            Self::Pin => REPRINT_BUTTON,
            Self::Tcc => CONSULT_BUTTON,
        }
    }
}

pub async fn run(
    session: &mut PortalSession,
    company: &CompanyRecord,
    kind: CertificateKind,
    sink: &dyn ResultSink,
    settings: &Settings,
    today: NaiveDate,
) -> TaskResult {
    session.navigate_to(kind.feature()).await?;

    // The reprint screens confirm() before generating; accept everything
    // for the rest of this navigation.
    session.auto_confirm_dialogs().await?;

    let page = session.page();
    click_with_retry(
        page,
        kind.trigger(),
        settings.retry.menu_click_retries,
        500,
    )
    .await?;
    let _ = page.wait_for_network_idle(500, 10_000).await;

    let href: Option<String> = page.evaluate(DOCUMENT_LINK_JS).await?;
    let href = href.ok_or_else(|| {
        itax_portal::Error::StepFailed("no document link after reprint".into())
    })?;
    debug!(company = %company.company_name, %href, "certificate link located");

    let bytes = session.download_document(&href).await?;
    let pin = company.kra_pin.clone().unwrap_or_default();

    // Path is date-keyed like the history map: a same-day rerun overwrites
    // the object instead of stacking duplicates.
    let path = format!("certificates/{}/{}-{}.pdf", pin, today.format("%Y-%m-%d"), kind.key());
    let url = sink.upload_document(&path, bytes, "application/pdf").await?;
    sink.upsert_extraction(&pin, kind.key(), today, json!({ "url": url }))
        .await?;

    Ok(ExtractionResult::new(
        company,
        CompanyStatus::Valid,
        ExtractionOutcome::Certificate { url },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_features() {
        assert_eq!(CertificateKind::Pin.feature(), Feature::PinCertificate);
        assert_eq!(CertificateKind::Tcc.feature(), Feature::TccReprint);
    }

    #[test]
    fn test_kind_keys_are_distinct() {
        assert_ne!(CertificateKind::Pin.key(), CertificateKind::Tcc.key());
    }
}
