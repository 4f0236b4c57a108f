//! Shared User-Agent string for feed traffic.
//!
//! Listing, probe, checksum and range requests all identify the same way.

const TOOL_LABEL: &str = "epf-feed-client";

/// Default User-Agent for every feed request.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("epf/{version} ({TOOL_LABEL})")
}
