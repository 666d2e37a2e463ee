//! WebSocket link to the sidecar process.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use {
    futures::{SinkExt, StreamExt, stream::SplitSink},
    tokio::{net::TcpStream, sync::mpsc, time::Duration},
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    event::TransportEvent,
    types::{ClientCommand, SidecarEvent},
};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Delay between connection attempts while the sidecar is still starting.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Live WebSocket connection to the sidecar.
///
/// Decoded events are forwarded into the `mpsc` channel handed to
/// [`SidecarLink::connect`]; when the socket closes (for any reason) a final
/// `Disconnected` event is emitted and the channel sender is dropped, which
/// is how downstream consumers observe teardown.
pub struct SidecarLink {
    writer: tokio::sync::Mutex<WsSink>,
    connected: Arc<AtomicBool>,
}

impl SidecarLink {
    /// Connect to the sidecar WebSocket on `port` and start the read loop.
    pub async fn connect(port: u16, events: mpsc::Sender<TransportEvent>) -> Result<Self> {
        let url = format!("ws://127.0.0.1:{port}");
        let (stream, _) = connect_async(url.as_str()).await?;
        info!(port, "connected to whatsapp sidecar");

        let (writer, mut reader) = stream.split();
        let connected = Arc::new(AtomicBool::new(true));

        let read_connected = Arc::clone(&connected);
        tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "sidecar link read error");
                        break;
                    },
                };

                let event = match serde_json::from_str::<SidecarEvent>(text.as_str()) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "unparseable sidecar event, dropping");
                        continue;
                    },
                };

                if let SidecarEvent::SendResult {
                    request_id,
                    success,
                    error,
                } = &event
                {
                    if *success {
                        debug!(request_id, "send acknowledged");
                    } else {
                        warn!(request_id, ?error, "send failed at the sidecar");
                    }
                    continue;
                }
                if let SidecarEvent::Error { error } = &event {
                    warn!(error, "sidecar reported an error");
                    continue;
                }

                let Some(event) = TransportEvent::from_sidecar(event) else {
                    continue;
                };
                if events.send(event).await.is_err() {
                    debug!("event consumer gone, stopping sidecar read loop");
                    return;
                }
            }

            // Socket closed underneath us: surface it as a disconnect so the
            // session machine leaves the connected state, then drop the
            // sender to close the channel.
            read_connected.store(false, Ordering::SeqCst);
            let _ = events
                .send(TransportEvent::Disconnected {
                    reason: "sidecar link closed".into(),
                })
                .await;
        });

        Ok(Self {
            writer: tokio::sync::Mutex::new(writer),
            connected,
        })
    }

    /// Connect, retrying while the sidecar process is still coming up.
    pub async fn connect_with_retry(
        port: u16,
        events: mpsc::Sender<TransportEvent>,
        attempts: usize,
    ) -> Result<Self> {
        let mut last_err = Error::Closed;
        for attempt in 1..=attempts {
            match Self::connect(port, events.clone()).await {
                Ok(link) => return Ok(link),
                Err(e) => {
                    debug!(attempt, error = %e, "sidecar not reachable yet");
                    last_err = e;
                    tokio::time::sleep(RETRY_DELAY).await;
                },
            }
        }
        Err(last_err)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send a command to the sidecar.
    pub async fn send(&self, command: &ClientCommand) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::Closed);
        }
        let json = serde_json::to_string(command)?;
        let mut writer = self.writer.lock().await;
        writer.send(Message::text(json)).await?;
        Ok(())
    }

    /// Close the link. Further sends fail with [`Error::Closed`].
    pub async fn close(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.send(Message::Close(None)).await {
            debug!(error = %e, "error closing sidecar link");
        }
    }
}
