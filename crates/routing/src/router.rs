//! The routing decision: welcome, forward, or drop.

use std::sync::Arc;

use {
    async_trait::async_trait,
    tracing::{debug, error, info},
};

use {
    wabridge_session::InboundHandler,
    wabridge_transport::{InboundMessage, Outbound},
};

use crate::{
    forward::ConversationForwarder,
    resolve::AssociationClient,
    texts,
};

/// Routes each inbound message to exactly one outcome: dropped (self-
/// originated), the default welcome (unknown sender), or the conversation
/// engine (bound sender).
pub struct MessageRouter {
    resolver: AssociationClient,
    forwarder: ConversationForwarder,
    outbound: Arc<dyn Outbound>,
    welcome: String,
}

impl MessageRouter {
    pub fn new(
        resolver: AssociationClient,
        forwarder: ConversationForwarder,
        outbound: Arc<dyn Outbound>,
    ) -> Self {
        let welcome = texts::welcome_text(resolver.base_url());
        Self {
            resolver,
            forwarder,
            outbound,
            welcome,
        }
    }

    pub async fn route(&self, message: &InboundMessage) {
        if message.from_me {
            debug!("ignoring self-originated message");
            return;
        }

        info!(from = %message.from, kind = %message.kind, "inbound message");

        let binding = match self.resolver.find_binding(&message.from).await {
            Ok(binding) => binding,
            Err(e) => {
                // Degrade to the welcome path: a resolution failure must
                // not block message handling.
                error!(from = %message.from, error = %e, "association lookup failed");
                None
            },
        };

        match binding {
            Some(binding) => self.forwarder.forward(&binding, message).await,
            None => self.send_welcome(&message.from).await,
        }
    }

    async fn send_welcome(&self, to: &str) {
        if let Err(e) = self.outbound.send_text(to, &self.welcome).await {
            error!(to, error = %e, "failed to send welcome message");
        }
    }
}

#[async_trait]
impl InboundHandler for MessageRouter {
    async fn handle(&self, message: InboundMessage) {
        self.route(&message).await;
    }
}

#[cfg(test)]
mod tests {
    use {mockito::Matcher, tokio::sync::Mutex};

    use super::*;

    struct RecordingOutbound {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingOutbound {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        async fn send_text(&self, to: &str, text: &str) -> wabridge_transport::Result<()> {
            self.sent.lock().await.push((to.into(), text.into()));
            Ok(())
        }
    }

    fn router_for(
        backend: &mockito::ServerGuard,
        engine: &mockito::ServerGuard,
    ) -> (MessageRouter, Arc<RecordingOutbound>) {
        let http = reqwest::Client::new();
        let outbound = RecordingOutbound::new();
        let resolver = AssociationClient::new(http.clone(), backend.url());
        let forwarder = ConversationForwarder::new(
            http,
            engine.url(),
            Arc::clone(&outbound) as Arc<dyn Outbound>,
        );
        let router = MessageRouter::new(
            resolver,
            forwarder,
            Arc::clone(&outbound) as Arc<dyn Outbound>,
        );
        (router, outbound)
    }

    fn message_from(from: &str) -> InboundMessage {
        InboundMessage {
            from: from.into(),
            body: "hello".into(),
            kind: "chat".into(),
            from_me: false,
        }
    }

    #[tokio::test]
    async fn self_originated_messages_trigger_nothing() {
        let mut backend = mockito::Server::new_async().await;
        let mut engine = mockito::Server::new_async().await;
        let lookup = backend
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let engine_call = engine
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let (router, outbound) = router_for(&backend, &engine);
        let mut message = message_from("5551234@c.us");
        message.from_me = true;
        router.route(&message).await;

        lookup.assert_async().await;
        engine_call.assert_async().await;
        assert!(outbound.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_sender_gets_the_welcome_text_only() {
        let mut backend = mockito::Server::new_async().await;
        let mut engine = mockito::Server::new_async().await;
        let _lookup = backend
            .mock("GET", "/api/whatsapp/chats/5551234")
            .with_status(404)
            .create_async()
            .await;
        let engine_call = engine
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let (router, outbound) = router_for(&backend, &engine);
        router.route(&message_from("5551234@c.us")).await;

        engine_call.assert_async().await;
        let sent = outbound.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "5551234@c.us");
        assert_eq!(sent[0].1, texts::welcome_text(&backend.url()));
    }

    #[tokio::test]
    async fn lookup_failure_degrades_to_welcome() {
        let mut backend = mockito::Server::new_async().await;
        let mut engine = mockito::Server::new_async().await;
        let _lookup = backend
            .mock("GET", "/api/whatsapp/chats/5551234")
            .with_status(503)
            .create_async()
            .await;
        let engine_call = engine
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let (router, outbound) = router_for(&backend, &engine);
        router.route(&message_from("5551234@c.us")).await;

        engine_call.assert_async().await;
        let sent = outbound.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("not set up with an assistant"));
    }

    #[tokio::test]
    async fn bound_sender_gets_exactly_the_engine_reply() {
        let mut backend = mockito::Server::new_async().await;
        let mut engine = mockito::Server::new_async().await;
        let _lookup = backend
            .mock("GET", "/api/whatsapp/chats/5551234")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"conversation_id":"chat-42"}"#)
            .create_async()
            .await;
        let _engine_call = engine
            .mock("POST", "/api/chat/message")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":"ok"}"#)
            .create_async()
            .await;

        let (router, outbound) = router_for(&backend, &engine);
        router.route(&message_from("5551234@c.us")).await;

        let sent = outbound.sent.lock().await;
        assert_eq!(sent.as_slice(), &[("5551234@c.us".to_string(), "ok".to_string())]);
    }
}
