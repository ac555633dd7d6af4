//! Selector constants for the iTax portal.
//!
//! The portal's markup is stable but occasionally renamed wholesale; keeping
//! every selector here makes UI drift a one-file fix. Some names carry the
//! portal's own spelling (`#captcahText`).

/// PIN / login id input on the login form.
pub const PIN_INPUT: &str = "#logid";

/// Password input. The portal obfuscates the field name.
pub const PASSWORD_INPUT: &str = "input[name='xxZTT9054Q']";

/// The arithmetic captcha image.
pub const CAPTCHA_IMAGE: &str = "#captcha_img";

/// The captcha answer input (sic — the portal's own id).
pub const CAPTCHA_INPUT: &str = "#captcahText";

/// Login form submit button.
pub const LOGIN_SUBMIT: &str = "#loginButton";

/// Top menu bar; its presence marks an authenticated session.
pub const MAIN_MENU: &str = "#ddtopmenubar";

/// Logout link in the header.
pub const LOGOUT_LINK: &str = "a[href*='logOutUser']";
