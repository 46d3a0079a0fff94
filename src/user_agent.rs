//! User-Agent string shared by every outgoing request.

/// Product comment identifying the client (RFC 9110 §10.1.5).
const PRODUCT_COMMENT: &str = "document-vault-client";

/// Default User-Agent for API and upload requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("docvault/{version} ({PRODUCT_COMMENT})")
}
