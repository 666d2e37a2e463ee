//! Sender identifier normalization and conversation key derivation.

/// JID suffixes the network decorates phone numbers with.
const JID_SUFFIXES: &[&str] = &["@c.us", "@s.whatsapp.net"];

/// Strip the network suffix from a sender JID, leaving the bare number.
pub fn normalize_sender(sender: &str) -> &str {
    for suffix in JID_SUFFIXES {
        if let Some(bare) = sender.strip_suffix(suffix) {
            return bare;
        }
    }
    sender
}

/// Stable per-sender conversation key: all messages from one sender map to
/// the same logical conversation at the engine.
pub fn conversation_key(sender: &str) -> String {
    format!("wa_{sender}")
}
