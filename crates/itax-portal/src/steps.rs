//! Small page-level step helpers shared by login, navigation and the
//! extraction tasks: text-based clicking, existence checks, bounded click
//! retry, and the session-scoped dialog policy.

use crate::{Error, Result};
use eoka::Page;
use tracing::debug;

/// Find a clickable element by visible text — returns a CSS selector.
const FIND_BY_TEXT_JS: &str = r#"(() => {
    const text = arguments[0];
    const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_ELEMENT, null);
    while (walker.nextNode()) {
        const el = walker.currentNode;
        if (el.textContent?.trim().toLowerCase().includes(text.toLowerCase())) {
            if (el.matches('a, button, input, select, [role="button"], [onclick]')) {
                if (el.id) return '#' + el.id;
                const path = [];
                let node = el;
                while (node && node !== document.body) {
                    let selector = node.tagName.toLowerCase();
                    if (node.id) {
                        path.unshift('#' + node.id);
                        break;
                    }
                    const siblings = Array.from(node.parentNode?.children || []);
                    const index = siblings.indexOf(node) + 1;
                    if (siblings.length > 1) selector += ':nth-child(' + index + ')';
                    path.unshift(selector);
                    node = node.parentNode;
                }
                return path.join(' > ');
            }
        }
    }
    return null;
})()"#;

/// Click the first clickable element whose visible text contains `text`.
/// Returns `Ok(false)` when nothing matches.
pub async fn click_by_text(page: &Page, text: &str) -> Result<bool> {
    let js = FIND_BY_TEXT_JS.replace("arguments[0]", &serde_json::to_string(text).unwrap());
    let selector: Option<String> = page.evaluate(&js).await?;
    match selector {
        Some(sel) => Ok(page.try_click(&sel).await?),
        None => Ok(false),
    }
}

/// Whether an element matching `selector` is present in the DOM.
pub async fn element_exists(page: &Page, selector: &str) -> Result<bool> {
    let js = format!(
        "!!document.querySelector({})",
        serde_json::to_string(selector).unwrap()
    );
    Ok(page.evaluate(&js).await?)
}

/// Click a flaky target, retrying up to `attempts` times with a fixed delay.
///
/// The portal's detail panels frequently ignore the first few clicks while
/// background requests settle; the retry ceiling is the caller's, not ours.
pub async fn click_with_retry(
    page: &Page,
    selector: &str,
    attempts: u32,
    delay_ms: u64,
) -> Result<()> {
    for attempt in 1..=attempts {
        if page.try_click(selector).await? {
            if attempt > 1 {
                debug!(selector, attempt, "click landed after retry");
            }
            return Ok(());
        }
        debug!(selector, attempt, "click target not ready");
        page.wait(delay_ms).await;
    }
    Err(Error::StepFailed(format!(
        "element '{}' not clickable after {} attempts",
        selector, attempts
    )))
}

/// Install a page-scoped policy that accepts every native dialog for the
/// rest of the navigation. The portal's reprint screens throw `confirm()`
/// prompts on download; one declared policy replaces per-click handlers.
pub async fn auto_confirm_dialogs(page: &Page) -> Result<()> {
    page.execute(
        "window.confirm = () => true; window.alert = () => {}; window.onbeforeunload = null;",
    )
    .await?;
    Ok(())
}
