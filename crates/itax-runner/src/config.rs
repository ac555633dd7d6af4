//! Runner configuration. Shape lives in a YAML file; secrets stay in the
//! environment and are referenced by variable name, so no credential or
//! project URL is ever committed.

use crate::{Error, Result};
use itax_portal::BrowserSettings;
use itax_store::SupabaseConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level runner settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub portal: PortalSettings,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub captcha: CaptchaSettings,

    pub supabase: SupabaseSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub report: ReportSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSettings {
    /// Login page URL.
    pub login_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackendKind {
    #[default]
    Tesseract,
    AntiCaptcha,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaSettings {
    #[serde(default)]
    pub backend: OcrBackendKind,
    /// Environment variable holding the anti-captcha API key.
    #[serde(default = "default_captcha_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_tesseract_binary")]
    pub tesseract_binary: String,
}

impl Default for CaptchaSettings {
    fn default() -> Self {
        Self {
            backend: OcrBackendKind::Tesseract,
            api_key_env: default_captcha_key_env(),
            tesseract_binary: default_tesseract_binary(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseSettings {
    /// Environment variable holding the project URL.
    #[serde(default = "default_supabase_url_env")]
    pub url_env: String,
    /// Environment variable holding the service-role key.
    #[serde(default = "default_supabase_key_env")]
    pub key_env: String,
    #[serde(default = "default_companies_table")]
    pub companies_table: String,
    #[serde(default = "default_extractions_table")]
    pub extractions_table: String,
    #[serde(default = "default_documents_bucket")]
    pub documents_bucket: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Fresh-captcha login retries.
    #[serde(default = "default_captcha_attempts")]
    pub max_captcha_attempts: u32,
    /// Flaky detail-panel click retries.
    #[serde(default = "default_menu_retries")]
    pub menu_click_retries: u32,
    /// Seconds budgeted for the post-submission outcome detectors.
    #[serde(default = "default_outcome_budget")]
    pub outcome_budget_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_captcha_attempts: default_captcha_attempts(),
            menu_click_retries: default_menu_retries(),
            outcome_budget_secs: default_outcome_budget(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "default_report_dir")]
    pub dir: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            dir: default_report_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_captcha_key_env() -> String {
    "ANTICAPTCHA_API_KEY".into()
}
fn default_tesseract_binary() -> String {
    "tesseract".into()
}
fn default_supabase_url_env() -> String {
    "SUPABASE_URL".into()
}
fn default_supabase_key_env() -> String {
    "SUPABASE_SERVICE_KEY".into()
}
fn default_companies_table() -> String {
    "companies".into()
}
fn default_extractions_table() -> String {
    "extractions".into()
}
fn default_documents_bucket() -> String {
    "documents".into()
}
fn default_captcha_attempts() -> u32 {
    3
}
fn default_menu_retries() -> u32 {
    10
}
fn default_outcome_budget() -> u64 {
    10
}
fn default_report_dir() -> String {
    "reports".into()
}

impl Settings {
    /// Load settings from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse settings from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.portal.login_url.is_empty() {
            return Err(Error::Config("portal.login_url is required".into()));
        }
        if self.retry.max_captcha_attempts == 0 {
            return Err(Error::Config(
                "retry.max_captcha_attempts must be at least 1".into(),
            ));
        }
        if self.retry.menu_click_retries == 0 {
            return Err(Error::Config(
                "retry.menu_click_retries must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Browser settings for portal sessions.
    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            headless: self.browser.headless,
            proxy: self.browser.proxy.clone(),
            user_agent: self.browser.user_agent.clone(),
            ..BrowserSettings::default()
        }
    }

    /// Login policy for portal sessions.
    pub fn login_policy(&self) -> itax_portal::LoginPolicy {
        itax_portal::LoginPolicy {
            max_captcha_attempts: self.retry.max_captcha_attempts,
            outcome_budget: Duration::from_secs(self.retry.outcome_budget_secs),
            ..itax_portal::LoginPolicy::default()
        }
    }

    /// Resolve the Supabase connection from the environment.
    pub fn supabase_config(&self) -> Result<SupabaseConfig> {
        let url = require_env(&self.supabase.url_env)?;
        let key = require_env(&self.supabase.key_env)?;
        let mut config = SupabaseConfig::new(url, key);
        config.companies_table = self.supabase.companies_table.clone();
        config.extractions_table = self.supabase.extractions_table.clone();
        config.documents_bucket = self.supabase.documents_bucket.clone();
        Ok(config)
    }

    /// Build the configured captcha solver.
    pub fn captcha_solver(&self) -> Result<itax_captcha::CaptchaSolver> {
        let backend: Box<dyn itax_captcha::OcrBackend> = match self.captcha.backend {
            OcrBackendKind::Tesseract => Box::new(itax_captcha::TesseractOcr::new(
                self.captcha.tesseract_binary.clone(),
            )),
            OcrBackendKind::AntiCaptcha => {
                let api_key = require_env(&self.captcha.api_key_env)?;
                Box::new(itax_captcha::AntiCaptchaOcr::new(api_key))
            }
        };
        Ok(itax_captcha::CaptchaSolver::new(backend))
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("environment variable {} is not set", name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
portal:
  login_url: "https://itax.kra.go.ke/KRA-Portal/"
supabase: {}
"#;

    #[test]
    fn test_parse_minimal() {
        let settings = Settings::parse(MINIMAL).unwrap();
        assert_eq!(
            settings.portal.login_url,
            "https://itax.kra.go.ke/KRA-Portal/"
        );
        assert!(settings.browser.headless);
        assert_eq!(settings.retry.max_captcha_attempts, 3);
        assert_eq!(settings.retry.menu_click_retries, 10);
        assert_eq!(settings.supabase.companies_table, "companies");
        assert_eq!(settings.report.dir, "reports");
    }

    #[test]
    fn test_parse_overrides() {
        let yaml = r#"
portal:
  login_url: "https://staging.example.com/portal/"
browser:
  headless: false
  proxy: "http://localhost:8080"
captcha:
  backend: anti_captcha
  api_key_env: "MY_KEY"
supabase:
  companies_table: "clients"
retry:
  max_captcha_attempts: 5
  menu_click_retries: 4
  outcome_budget_secs: 6
report:
  dir: "out"
"#;
        let settings = Settings::parse(yaml).unwrap();
        assert!(!settings.browser.headless);
        assert_eq!(settings.browser.proxy.as_deref(), Some("http://localhost:8080"));
        assert!(matches!(
            settings.captcha.backend,
            OcrBackendKind::AntiCaptcha
        ));
        assert_eq!(settings.retry.max_captcha_attempts, 5);
        assert_eq!(settings.supabase.companies_table, "clients");
        assert_eq!(settings.report.dir, "out");

        let policy = settings.login_policy();
        assert_eq!(policy.max_captcha_attempts, 5);
        assert_eq!(policy.outcome_budget, Duration::from_secs(6));
    }

    #[test]
    fn test_validation_empty_login_url() {
        let yaml = r#"
portal:
  login_url: ""
supabase: {}
"#;
        assert!(Settings::parse(yaml).is_err());
    }

    #[test]
    fn test_validation_zero_retries() {
        let yaml = r#"
portal:
  login_url: "https://example.com"
supabase: {}
retry:
  max_captcha_attempts: 0
"#;
        let err = Settings::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_load_example_config() {
        let settings = Settings::load("configs/example.yaml").unwrap();
        assert_eq!(
            settings.portal.login_url,
            "https://itax.kra.go.ke/KRA-Portal/"
        );
        assert_eq!(settings.retry.menu_click_retries, 10);
        assert!(matches!(settings.captcha.backend, OcrBackendKind::Tesseract));
    }

    #[test]
    fn test_missing_env_is_a_config_error() {
        let settings = Settings::parse(MINIMAL).unwrap();
        std::env::remove_var("SUPABASE_URL");
        let err = settings.supabase_config().unwrap_err();
        assert!(err.to_string().contains("SUPABASE_URL"));
    }
}
