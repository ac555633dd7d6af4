use crate::nav::{self, Feature};
use crate::outcome::{classify_page_text, LoginOutcome};
use crate::{selectors, steps, Error, Result};
use base64::Engine;
use eoka::{Browser, Page, StealthConfig};
use itax_captcha::CaptchaSolver;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Browser launch settings, mapped onto the stealth config at launch.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            user_agent: None,
            viewport_width: 1366,
            viewport_height: 768,
        }
    }
}

/// A company's portal login pair. Presence is validated upstream — a missing
/// PIN or password never reaches this type.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub pin: String,
    pub password: String,
}

/// Bounds for the login state machine.
#[derive(Debug, Clone)]
pub struct LoginPolicy {
    /// Fresh-captcha retries before giving up on `WrongCaptcha`.
    pub max_captcha_attempts: u32,
    /// Total budget for the post-submission outcome detectors.
    pub outcome_budget: Duration,
    /// Poll interval while racing the outcome detectors.
    pub poll_interval: Duration,
    /// Per-step wait budget (form fields, feature markers).
    pub step_timeout_ms: u64,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self {
            max_captcha_attempts: 3,
            outcome_budget: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            step_timeout_ms: 10_000,
        }
    }
}

/// Whether a fresh-captcha retry is allowed for this attempt's outcome.
///
/// Only `WrongCaptcha` retries, and only below the configured ceiling; every
/// other outcome is terminal for the login as a whole.
fn should_retry_captcha(outcome: &LoginOutcome, attempt: u32, max_attempts: u32) -> bool {
    *outcome == LoginOutcome::WrongCaptcha && attempt < max_attempts
}

/// One browser session against the portal.
///
/// Owns the browser and page for exactly one company's processing; callers
/// must `close()` it on every path before moving to the next company.
pub struct PortalSession {
    browser: Browser,
    page: Page,
    login_url: String,
    policy: LoginPolicy,
    solver: CaptchaSolver,
}

impl PortalSession {
    /// Launch a browser and open a blank page, ready to log in.
    pub async fn launch(
        login_url: impl Into<String>,
        settings: &BrowserSettings,
        solver: CaptchaSolver,
        policy: LoginPolicy,
    ) -> Result<Self> {
        let stealth = StealthConfig {
            headless: settings.headless,
            proxy: settings.proxy.clone(),
            user_agent: settings.user_agent.clone(),
            viewport_width: settings.viewport_width,
            viewport_height: settings.viewport_height,
            ..Default::default()
        };
        debug!(headless = settings.headless, "launching portal browser");
        let browser = Browser::launch_with_config(stealth).await?;
        let page = browser.new_page("about:blank").await?;
        Ok(Self {
            browser,
            page,
            login_url: login_url.into(),
            policy,
            solver,
        })
    }

    /// The underlying page, for feature-specific scraping.
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn policy(&self) -> &LoginPolicy {
        &self.policy
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Run the login state machine to a terminal outcome.
    ///
    /// Captcha rejections (and unreadable captchas) get a fresh challenge up
    /// to the policy ceiling; the final rejection is returned as
    /// `WrongCaptcha` for the caller to classify. All other outcomes return
    /// on first occurrence.
    pub async fn login(&mut self, creds: &Credentials) -> Result<LoginOutcome> {
        let max = self.policy.max_captcha_attempts;
        for attempt in 1..=max {
            let outcome = self.login_attempt(creds).await?;
            if should_retry_captcha(&outcome, attempt, max) {
                info!(attempt, max, "captcha rejected, retrying with a fresh challenge");
                continue;
            }
            return Ok(outcome);
        }
        Ok(LoginOutcome::WrongCaptcha)
    }

    async fn login_attempt(&mut self, creds: &Credentials) -> Result<LoginOutcome> {
        self.page.goto(&self.login_url).await?;
        self.page
            .wait_for(selectors::PIN_INPUT, self.policy.step_timeout_ms)
            .await?;
        self.page.fill(selectors::PIN_INPUT, &creds.pin).await?;

        // The portal validates the PIN server-side on blur and only then
        // reveals the password block.
        self.page
            .execute(&format!(
                "document.querySelector({})?.blur()",
                serde_json::to_string(selectors::PIN_INPUT).unwrap()
            ))
            .await?;
        let _ = self.page.wait_for_network_idle(300, 3000).await;

        self.page
            .wait_for(selectors::PASSWORD_INPUT, self.policy.step_timeout_ms)
            .await?;
        self.page
            .fill(selectors::PASSWORD_INPUT, &creds.password)
            .await?;

        match self
            .solve_captcha_into(selectors::CAPTCHA_IMAGE, selectors::CAPTCHA_INPUT)
            .await
        {
            Ok(()) => {}
            Err(e) => {
                // OCR misses and unparseable text both burn one attempt;
                // the retry loop takes a fresh screenshot.
                warn!(error = %e, "captcha solve failed, treating as rejected");
                return Ok(LoginOutcome::WrongCaptcha);
            }
        }

        self.page.click(selectors::LOGIN_SUBMIT).await?;
        self.classify_submission().await
    }

    /// Snapshot a captcha `<img>`, solve it, and fill the answer input.
    ///
    /// Also used by tasks whose secondary lookup forms carry their own
    /// captcha (the PIN checker does).
    pub async fn solve_captcha_into(
        &self,
        image_selector: &str,
        input_selector: &str,
    ) -> Result<()> {
        let image = self.element_image(image_selector).await?;
        let answer = self.solver.solve(&image).await?;
        debug!(answer, "captcha solved");
        self.page.fill(input_selector, &answer.to_string()).await?;
        Ok(())
    }

    /// Read an `<img>`'s pixels through a canvas. The challenge bytes live
    /// only for this attempt.
    async fn element_image(&self, selector: &str) -> Result<Vec<u8>> {
        let js = format!(
            r#"(() => {{
                const img = document.querySelector({sel});
                if (!img) return null;
                const canvas = document.createElement('canvas');
                canvas.width = img.naturalWidth || img.width;
                canvas.height = img.naturalHeight || img.height;
                canvas.getContext('2d').drawImage(img, 0, 0);
                return canvas.toDataURL('image/png');
            }})()"#,
            sel = serde_json::to_string(selector).unwrap()
        );
        let data_url: Option<String> = self.page.evaluate(&js).await?;
        let data_url = data_url.ok_or_else(|| {
            Error::StepFailed(format!("captcha image '{}' not present", selector))
        })?;
        decode_data_url(&data_url)
    }

    /// Race the outcome detectors: authenticated menu, wrong-captcha banner,
    /// invalid-login banner, expired banner, locked banner. First to appear
    /// wins; none within the budget classifies as `TimedOut`.
    async fn classify_submission(&self) -> Result<LoginOutcome> {
        let deadline = Instant::now() + self.policy.outcome_budget;
        loop {
            if steps::element_exists(&self.page, selectors::MAIN_MENU).await? {
                return Ok(LoginOutcome::Success);
            }
            let text = self.page.text().await?;
            if let Some(outcome) = classify_page_text(&text) {
                return Ok(outcome);
            }
            if Instant::now() >= deadline {
                return Ok(LoginOutcome::TimedOut);
            }
            self.page.wait(self.policy.poll_interval.as_millis() as u64).await;
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Navigate to a feature via its entry-point strategies.
    pub async fn navigate_to(&mut self, feature: Feature) -> Result<()> {
        nav::locate(&self.page, feature, self.policy.step_timeout_ms).await
    }

    /// Accept every native dialog for the rest of this session's navigation.
    pub async fn auto_confirm_dialogs(&self) -> Result<()> {
        steps::auto_confirm_dialogs(&self.page).await
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Fetch a document through the authenticated page context and return
    /// its bytes. The fetch runs in-page (session cookies apply); the result
    /// is stashed as a data URL and polled for with a bounded deadline.
    pub async fn download_document(&self, url: &str) -> Result<Vec<u8>> {
        let js = format!(
            r#"window.__itaxDownload = null;
            fetch({url}, {{ credentials: 'same-origin' }})
                .then(r => {{
                    if (!r.ok) throw new Error('http ' + r.status);
                    return r.blob();
                }})
                .then(b => new Promise((resolve, reject) => {{
                    const reader = new FileReader();
                    reader.onload = () => resolve(reader.result);
                    reader.onerror = () => reject(reader.error);
                    reader.readAsDataURL(b);
                }}))
                .then(data => {{ window.__itaxDownload = data; }})
                .catch(e => {{ window.__itaxDownload = 'error:' + e.message; }});"#,
            url = serde_json::to_string(url).unwrap()
        );
        self.page.execute(&js).await?;

        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            let slot: Option<String> = self
                .page
                .evaluate("window.__itaxDownload || null")
                .await?;
            if let Some(value) = slot {
                if let Some(reason) = value.strip_prefix("error:") {
                    return Err(Error::DownloadFailed(reason.to_string()));
                }
                return decode_data_url(&value);
            }
            if Instant::now() >= deadline {
                return Err(Error::DownloadFailed(
                    "timed out waiting for document bytes".into(),
                ));
            }
            self.page.wait(500).await;
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Best-effort logout. Returns `false` when the post-logout marker never
    /// appeared — the caller should discard this session rather than trust
    /// that the portal ended it.
    pub async fn logout(&mut self) -> Result<bool> {
        if !self.page.try_click(selectors::LOGOUT_LINK).await? {
            let _ = steps::click_by_text(&self.page, "Logout").await;
        }
        if self
            .page
            .wait_for(selectors::PIN_INPUT, self.policy.step_timeout_ms / 2)
            .await
            .is_ok()
        {
            Ok(true)
        } else {
            warn!("post-logout marker absent; session may be stuck");
            Ok(false)
        }
    }

    /// Close the page and browser. Consumes the session so it cannot be
    /// reused across companies.
    pub async fn close(self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}

fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let b64 = data_url
        .split(',')
        .nth(1)
        .ok_or_else(|| Error::StepFailed("malformed data url".into()))?;
    base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| Error::StepFailed(format!("data url decode: {}", e)))
}
