//! Forwarding bound messages to the conversation engine.

use std::sync::Arc;

use {
    serde::{Deserialize, Serialize},
    tracing::{debug, error},
};

use wabridge_transport::{InboundMessage, Outbound};

use crate::{
    error::{Error, Result},
    normalize::{conversation_key, normalize_sender},
    resolve::ConversationBinding,
    texts,
};

/// Source tag identifying this channel to the engine.
const SOURCE_TAG: &str = "whatsapp";

#[derive(Debug, Serialize)]
struct EngineRequest<'a> {
    conversation_id: &'a str,
    conversation_key: String,
    message: &'a str,
    source: &'a str,
    phone_number: &'a str,
}

#[derive(Debug, Deserialize)]
struct EngineReply {
    #[serde(default)]
    response: Option<String>,
}

/// Sends bound messages to the conversation engine and relays replies.
pub struct ConversationForwarder {
    http: reqwest::Client,
    engine_url: String,
    outbound: Arc<dyn Outbound>,
}

impl ConversationForwarder {
    pub fn new(
        http: reqwest::Client,
        engine_url: impl Into<String>,
        outbound: Arc<dyn Outbound>,
    ) -> Self {
        let mut engine_url = engine_url.into();
        while engine_url.ends_with('/') {
            engine_url.pop();
        }
        Self {
            http,
            engine_url,
            outbound,
        }
    }

    /// Forward one message and deliver the outcome to the sender.
    ///
    /// Exactly one of: the engine's reply, silence (engine returned no
    /// reply), or the fixed apology (engine call failed). Never returns an
    /// error — the transport event path must stay failure-free.
    pub async fn forward(&self, binding: &ConversationBinding, message: &InboundMessage) {
        match self.call_engine(binding, message).await {
            Ok(Some(reply)) => {
                if let Err(e) = self.outbound.send_text(&message.from, &reply).await {
                    error!(to = %message.from, error = %e, "failed to relay engine reply");
                }
            },
            Ok(None) => {
                debug!(to = %message.from, "engine returned no reply, staying silent");
            },
            Err(e) => {
                error!(
                    conversation_id = %binding.conversation_id,
                    error = %e,
                    "conversation engine call failed"
                );
                if let Err(e) = self.outbound.send_text(&message.from, texts::APOLOGY).await {
                    error!(to = %message.from, error = %e, "failed to send apology");
                }
            },
        }
    }

    async fn call_engine(
        &self,
        binding: &ConversationBinding,
        message: &InboundMessage,
    ) -> Result<Option<String>> {
        let payload = EngineRequest {
            conversation_id: &binding.conversation_id,
            conversation_key: conversation_key(&message.from),
            message: &message.body,
            source: SOURCE_TAG,
            phone_number: normalize_sender(&message.from),
        };

        let url = format!("{}/api/chat/message", self.engine_url);
        let response = self.http.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus {
                context: "conversation engine",
                status: response.status(),
            });
        }

        let reply = response.json::<EngineReply>().await?;
        Ok(reply.response.filter(|text| !text.is_empty()))
    }
}
