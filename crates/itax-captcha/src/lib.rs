//! # itax-captcha
//!
//! Solves the iTax portal's arithmetic image captchas. The portal renders a
//! small expression like `7 + 5 = ?`; we OCR the image, clean up the known
//! font artifacts, and compute the answer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use itax_captcha::{CaptchaSolver, TesseractOcr};
//!
//! # #[tokio::main]
//! # async fn main() -> itax_captcha::Result<()> {
//! let solver = CaptchaSolver::new(Box::new(TesseractOcr::default()));
//! let image = std::fs::read("captcha.png")?;
//! let answer = solver.solve(&image).await?;
//! println!("answer: {}", answer);
//! # Ok(())
//! # }
//! ```
//!
//! OCR is unreliable on this font. Callers should budget a handful of
//! attempts with a fresh screenshot each time, not retry indefinitely.

mod anticaptcha;
mod ocr;
mod parser;

pub use anticaptcha::AntiCaptchaOcr;
pub use ocr::{OcrBackend, TesseractOcr};
pub use parser::solve_expression;

use tracing::debug;

/// Result type for itax-captcha operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while solving a captcha.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("captcha text is empty after noise stripping")]
    EmptyText,

    #[error("expected two numeric groups in captcha text, found {0}")]
    TooFewNumbers(usize),

    #[error("no supported operator (+ or -) in captcha text: {0:?}")]
    UnsupportedOperator(String),

    #[error("ocr failed: {0}")]
    Ocr(String),

    #[error("captcha service error: {0}")]
    Service(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the text was recognized but not parseable
    /// as a supported arithmetic expression.
    pub fn is_unparseable(&self) -> bool {
        matches!(
            self,
            Error::EmptyText | Error::TooFewNumbers(_) | Error::UnsupportedOperator(_)
        )
    }
}

/// Solves arithmetic captchas by running an OCR backend over the image and
/// parsing the recognized expression.
///
/// The backend is chosen at runtime from configuration, so the solver holds
/// it boxed.
pub struct CaptchaSolver {
    backend: Box<dyn OcrBackend>,
}

impl CaptchaSolver {
    pub fn new(backend: Box<dyn OcrBackend>) -> Self {
        Self { backend }
    }

    /// Recognize and compute the captcha answer.
    ///
    /// Fails loudly when the OCR output has fewer than two numeric groups or
    /// an unsupported operator; the caller decides whether to retry with a
    /// fresh screenshot.
    pub async fn solve(&self, image: &[u8]) -> Result<i64> {
        let text = self.backend.recognize(image).await?;
        debug!(text = %text.trim(), "ocr result");
        parser::solve_expression(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedOcr(&'static str);

    #[async_trait]
    impl OcrBackend for FixedOcr {
        async fn recognize(&self, _image: &[u8]) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingOcr;

    #[async_trait]
    impl OcrBackend for FailingOcr {
        async fn recognize(&self, _image: &[u8]) -> Result<String> {
            Err(Error::Ocr("engine exploded".into()))
        }
    }

    #[tokio::test]
    async fn test_solve_addition() {
        let solver = CaptchaSolver::new(Box::new(FixedOcr("7 + 5")));
        assert_eq!(solver.solve(&[]).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_solve_subtraction() {
        let solver = CaptchaSolver::new(Box::new(FixedOcr("9 - 4")));
        assert_eq!(solver.solve(&[]).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_ocr_failure_propagates() {
        let solver = CaptchaSolver::new(Box::new(FailingOcr));
        let err = solver.solve(&[]).await.unwrap_err();
        assert!(matches!(err, Error::Ocr(_)));
        assert!(!err.is_unparseable());
    }

    #[tokio::test]
    async fn test_unparseable_is_flagged() {
        let solver = CaptchaSolver::new(Box::new(FixedOcr("42")));
        let err = solver.solve(&[]).await.unwrap_err();
        assert!(err.is_unparseable());
    }
}
