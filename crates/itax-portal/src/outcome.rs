use std::fmt;

/// Terminal classification of one login attempt.
///
/// `WrongCaptcha` is the only retryable outcome; everything else is returned
/// to the caller as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    WrongCaptcha,
    InvalidCredentials,
    PasswordExpired,
    AccountLocked,
    TimedOut,
    UnknownError,
}

impl fmt::Display for LoginOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::WrongCaptcha => "wrong captcha",
            Self::InvalidCredentials => "invalid credentials",
            Self::PasswordExpired => "password expired",
            Self::AccountLocked => "account locked",
            Self::TimedOut => "timed out",
            Self::UnknownError => "unknown error",
        };
        f.write_str(s)
    }
}

/// Banner fragments the portal shows under the login form, paired with the
/// outcome they classify to. Matched case-insensitively, first hit wins.
const DETECTORS: &[(&str, LoginOutcome)] = &[
    (
        "wrong result of the arithmetic operation",
        LoginOutcome::WrongCaptcha,
    ),
    (
        "invalid login id or password",
        LoginOutcome::InvalidCredentials,
    ),
    ("password has expired", LoginOutcome::PasswordExpired),
    ("account has been locked", LoginOutcome::AccountLocked),
    ("account is locked", LoginOutcome::AccountLocked),
];

/// Classify a post-submission page by its visible text.
///
/// Returns `None` while no banner has appeared yet — the caller keeps
/// polling until its budget runs out, then classifies as `TimedOut`.
pub fn classify_page_text(text: &str) -> Option<LoginOutcome> {
    let text = text.to_lowercase();
    DETECTORS
        .iter()
        .find(|(marker, _)| text.contains(marker))
        .map(|&(_, outcome)| outcome)
}
