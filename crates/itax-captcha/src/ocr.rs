use crate::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::Command;
use tracing::debug;

/// Text recognition over a captcha image.
///
/// Implementations must tolerate being called several times per login — the
/// caller retries with fresh screenshots when the portal rejects an answer.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Recognize the text in the image. Returns the raw text; cleanup and
    /// arithmetic parsing happen in the solver.
    async fn recognize(&self, image: &[u8]) -> Result<String>;
}

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// OCR via the `tesseract` command-line binary.
///
/// The image lives in a temp file only for the duration of one call; it is
/// removed before the text is returned.
pub struct TesseractOcr {
    binary: String,
    /// Page segmentation mode. 7 = treat the image as a single text line,
    /// which is what the captcha strip is.
    psm: u8,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            binary: "tesseract".into(),
            psm: 7,
        }
    }
}

impl TesseractOcr {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ..Self::default()
        }
    }

    fn scratch_path(&self) -> PathBuf {
        let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("itax-captcha-{}-{}.png", std::process::id(), n))
    }
}

#[async_trait]
impl OcrBackend for TesseractOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String> {
        let path = self.scratch_path();
        tokio::fs::write(&path, image).await?;

        let output = Command::new(&self.binary)
            .arg(&path)
            .arg("stdout")
            .args(["--psm", &self.psm.to_string()])
            .output()
            .await;

        // Remove the challenge image before inspecting the result; it must
        // not outlive the attempt.
        let _ = tokio::fs::remove_file(&path).await;

        let output = output.map_err(|e| Error::Ocr(format!("{}: {}", self.binary, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Ocr(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(bytes = image.len(), "tesseract recognized captcha text");
        Ok(text)
    }
}
