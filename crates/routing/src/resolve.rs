//! Association lookup against the backend.

use {
    serde::Deserialize,
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    normalize::normalize_sender,
};

/// A sender resolved to a known conversation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationBinding {
    pub conversation_id: String,
}

/// Client for the backend's association store.
///
/// No caching: every inbound message re-queries the backend, so an operator
/// associating a number takes effect on the very next message.
#[derive(Clone)]
pub struct AssociationClient {
    http: reqwest::Client,
    base_url: String,
}

impl AssociationClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up the conversation associated with a sender.
    ///
    /// A 404 from the backend means "no association" and maps to
    /// `Ok(None)`; any other failure is an error the caller degrades from.
    pub async fn find_binding(&self, sender: &str) -> Result<Option<ConversationBinding>> {
        let number = normalize_sender(sender);
        let url = format!("{}/api/whatsapp/chats/{number}", self.base_url);
        let response = self.http.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(number, "no conversation associated");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus {
                context: "association lookup",
                status: response.status(),
            });
        }

        let binding = response.json::<ConversationBinding>().await?;
        debug!(number, conversation_id = %binding.conversation_id, "sender resolved");
        Ok(Some(binding))
    }

    /// Associate a number with a conversation; relays the backend's JSON
    /// response verbatim (used by the control API).
    pub async fn associate(
        &self,
        phone_number: &str,
        chat_id: &str,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/api/whatsapp/associate", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "phone_number": phone_number,
                "chat_id": chat_id,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "association write rejected");
            return Err(Error::UnexpectedStatus {
                context: "association write",
                status: response.status(),
            });
        }

        Ok(response.json::<serde_json::Value>().await?)
    }
}
