//! # itax-portal
//!
//! Drives one authenticated session against the iTax portal: login with
//! arithmetic-captcha solving and bounded retry, outcome classification,
//! feature navigation with fallback entry points, and guaranteed browser
//! teardown.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use itax_captcha::{CaptchaSolver, TesseractOcr};
//! use itax_portal::{BrowserSettings, Credentials, LoginPolicy, PortalSession};
//!
//! # #[tokio::main]
//! # async fn main() -> itax_portal::Result<()> {
//! let solver = CaptchaSolver::new(Box::new(TesseractOcr::default()));
//! let mut session = PortalSession::launch(
//!     "https://itax.kra.go.ke/KRA-Portal/",
//!     &BrowserSettings::default(),
//!     solver,
//!     LoginPolicy::default(),
//! )
//! .await?;
//!
//! let outcome = session.login(&Credentials {
//!     pin: "P051234567X".into(),
//!     password: "secret".into(),
//! })
//! .await?;
//! println!("login: {}", outcome);
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

mod nav;
mod outcome;
pub mod selectors;
mod session;
mod steps;

pub use nav::{entry_points, EntryPoint, Feature};
pub use outcome::{classify_page_text, LoginOutcome};
pub use session::{BrowserSettings, Credentials, LoginPolicy, PortalSession};
pub use steps::{auto_confirm_dialogs, click_by_text, click_with_retry, element_exists};

// Re-export the page and error types tasks interact with directly.
pub use eoka::{Error as BrowserError, Page};

/// Result type for itax-portal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a portal session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("captcha error: {0}")]
    Captcha(#[from] itax_captcha::Error),

    #[error("feature entry point not found: {0}")]
    FeatureNotFound(String),

    #[error("step failed: {0}")]
    StepFailed(String),

    #[error("document download failed: {0}")]
    DownloadFailed(String),
}
