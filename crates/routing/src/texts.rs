//! Fixed user-facing texts.
//!
//! End users never see a raw error: they get the welcome text, a forwarded
//! reply, the apology text, or silence.

/// Sent to senders whose number has no associated conversation. `{backend}`
/// is replaced with the backend URL so the operator can finish setup.
pub const WELCOME_TEMPLATE: &str = "Hello! \u{1F44B}\n\n\
This number is not set up with an assistant yet.\n\n\
To configure automatic replies, visit: {backend}\n\n\
If you need help, please contact support.";

/// Sent instead of a reply when the conversation engine fails.
pub const APOLOGY: &str = "Sorry, something went wrong. Please try again in a few moments.";

/// Render the welcome text for a given backend URL.
pub fn welcome_text(backend_url: &str) -> String {
    WELCOME_TEMPLATE.replace("{backend}", backend_url)
}
