//! Feature navigation. Which top-menu slot holds a feature varies by account
//! type, so every feature carries an ordered list of entry-point strategies;
//! the first one whose marker element appears wins, and exhausting the list
//! is a terminal `FeatureNotFound` — never an unbounded hunt.

use crate::{steps, Error, Result};
use eoka::Page;
use std::fmt;
use tracing::{debug, info};

/// A portal feature an extraction task can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    PinChecker,
    PinCertificate,
    TccReprint,
    GeneralLedger,
    PayrollStatutory,
}

impl Feature {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PinChecker => "PIN Checker",
            Self::PinCertificate => "Reprint PIN Certificate",
            Self::TccReprint => "Reprint TCC",
            Self::GeneralLedger => "General Ledger",
            Self::PayrollStatutory => "Payroll Statutory",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One way into a feature: open a top menu, click a submenu item by text,
/// confirm arrival by a feature-specific marker element.
#[derive(Debug, Clone, Copy)]
pub struct EntryPoint {
    pub menu: &'static str,
    pub item_text: &'static str,
    pub marker: &'static str,
}

const fn entry(menu: &'static str, item_text: &'static str, marker: &'static str) -> EntryPoint {
    EntryPoint {
        menu,
        item_text,
        marker,
    }
}

/// Ordered entry-point strategies for a feature. Two menu positions each —
/// corporate and individual accounts shift the menus by one slot.
pub fn entry_points(feature: Feature) -> &'static [EntryPoint] {
    static PIN_CHECKER: [EntryPoint; 2] = [
        entry(
            "#ddtopmenubar > ul > li:nth-child(6) > a",
            "PIN Checker",
            "input[name='vo.pinNo']",
        ),
        entry(
            "#ddtopmenubar > ul > li:nth-child(7) > a",
            "PIN Checker",
            "input[name='vo.pinNo']",
        ),
    ];
    static PIN_CERTIFICATE: [EntryPoint; 2] = [
        entry(
            "#ddtopmenubar > ul > li:nth-child(2) > a",
            "Reprint PIN Certificate",
            "input[value='Reprint']",
        ),
        entry(
            "#ddtopmenubar > ul > li:nth-child(3) > a",
            "Reprint PIN Certificate",
            "input[value='Reprint']",
        ),
    ];
    static TCC_REPRINT: [EntryPoint; 2] = [
        entry(
            "#ddtopmenubar > ul > li:nth-child(5) > a",
            "Reprint TCC",
            "input[value='Consult']",
        ),
        entry(
            "#ddtopmenubar > ul > li:nth-child(4) > a",
            "Reprint TCC",
            "input[value='Consult']",
        ),
    ];
    static GENERAL_LEDGER: [EntryPoint; 2] = [
        entry(
            "#ddtopmenubar > ul > li:nth-child(4) > a",
            "General Ledger",
            "#gridTbl",
        ),
        entry(
            "#ddtopmenubar > ul > li:nth-child(5) > a",
            "General Ledger",
            "#gridTbl",
        ),
    ];
    static PAYROLL_STATUTORY: [EntryPoint; 2] = [
        entry(
            "#ddtopmenubar > ul > li:nth-child(3) > a",
            "Payroll Statutory",
            "#payrollGrid",
        ),
        entry(
            "#ddtopmenubar > ul > li:nth-child(4) > a",
            "Payroll Statutory",
            "#payrollGrid",
        ),
    ];
    match feature {
        Feature::PinChecker => &PIN_CHECKER,
        Feature::PinCertificate => &PIN_CERTIFICATE,
        Feature::TccReprint => &TCC_REPRINT,
        Feature::GeneralLedger => &GENERAL_LEDGER,
        Feature::PayrollStatutory => &PAYROLL_STATUTORY,
    }
}

/// Walk the strategy list for `feature` until one lands on the marker.
pub(crate) async fn locate(page: &Page, feature: Feature, step_timeout_ms: u64) -> Result<()> {
    for (i, entry) in entry_points(feature).iter().enumerate() {
        debug!(%feature, strategy = i, menu = entry.menu, "trying feature entry point");
        if try_entry(page, entry, step_timeout_ms).await? {
            info!(%feature, strategy = i, "feature entry point located");
            return Ok(());
        }
    }
    Err(Error::FeatureNotFound(feature.label().to_string()))
}

async fn try_entry(page: &Page, entry: &EntryPoint, step_timeout_ms: u64) -> Result<bool> {
    if !page.try_click(entry.menu).await? {
        return Ok(false);
    }
    page.wait(300).await;
    if !steps::click_by_text(page, entry.item_text).await? {
        return Ok(false);
    }
    // Marker absent within the budget means this strategy missed; fall
    // through to the next one rather than failing the navigation here.
    Ok(page.wait_for(entry.marker, step_timeout_ms).await.is_ok())
}
