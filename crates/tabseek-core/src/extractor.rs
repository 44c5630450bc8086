//! Page text extraction.
//!
//! The normalization runs inside the target page; the background only sees the returned
//! string. [`extract_tab_text`] is the remote-invocation entry point used by the synchronizer.

use crate::error::Result;
use crate::host::{PageDocument, PageScript, ScriptHost};
use crate::models::TabId;
use crate::text::dedupe_tokens;

/// Lowercases, splits on whitespace runs, drops repeated tokens (first occurrence wins)
/// and rejoins with single spaces.
#[must_use]
pub fn normalize_page_text(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    dedupe_tokens(&lowered).join(" ")
}

/// Reads the page body text and normalizes it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SanitizedBodyText;

impl PageScript for SanitizedBodyText {
    fn name(&self) -> &'static str {
        "sanitized-body-text"
    }

    fn run(&self, page: &PageDocument) -> String {
        normalize_page_text(&page.body_text)
    }
}

/// Runs [`SanitizedBodyText`] in the tab's page context.
///
/// `InjectionDenied` is returned as-is; callers treat it as "no text available".
pub async fn extract_tab_text(host: &dyn ScriptHost, tab_id: TabId) -> Result<String> {
    host.execute_script(tab_id, &SanitizedBodyText).await
}
