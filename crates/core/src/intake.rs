//! Helpers for matching inbound vendor mail to RFPs.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::DbId;

static ANGLE_ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^<>\s]+@[^<>\s]+)>").expect("valid regex"));

static RFP_REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bRFP[:#\s-]*(\d+)").expect("valid regex"));

/// Extract the bare, lower-cased address from a `From` value.
///
/// Accepts both `Name <addr@host>` and a bare `addr@host`.
pub fn extract_sender_address(from: &str) -> Option<String> {
    if let Some(caps) = ANGLE_ADDRESS_RE.captures(from) {
        return Some(caps[1].to_lowercase());
    }
    let bare = from.trim().trim_matches(|c| c == '"' || c == '\'');
    if bare.contains('@') && !bare.contains(char::is_whitespace) {
        Some(bare.to_lowercase())
    } else {
        None
    }
}

/// Find the RFP id a message refers to: subject first, then body.
pub fn extract_rfp_reference(subject: &str, body: &str) -> Option<DbId> {
    [subject, body].into_iter().find_map(|text| {
        RFP_REFERENCE_RE
            .captures(text)
            .and_then(|caps| caps[1].parse::<DbId>().ok())
    })
}

/// Subject line used for an RFP dispatch; embeds the reference replies match on.
pub fn dispatch_subject(rfp_id: DbId, title: &str) -> String {
    format!("[RFP {rfp_id}] Request for Proposal: {title}")
}
