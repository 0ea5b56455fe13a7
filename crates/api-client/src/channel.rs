//! The push-event subscription: a WebSocket drained by a background task
//! and exposed to the dispatch loop as a plain channel of tagged events.
//!
//! The socket's open/message/error/close callbacks become four variants of
//! one event type, so the consumer handles them in the same match as user
//! input. Closing is fire-and-forget: frames already in flight when the
//! close is issued may still be delivered and are simply dropped once the
//! handle is gone.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use shopwatch_core::normalize::RawPushMessage;

/// One occurrence on the push channel.
#[derive(Debug)]
pub enum ChannelEvent {
    /// The socket connected and frames may start arriving.
    Open,
    Message(RawPushMessage),
    /// Transport-level failure. Deliberately NOT a statement about the run:
    /// only an `agent_finished` frame settles run status.
    Error(String),
    /// The remote side closed, or the connection dropped.
    Closed,
}

/// Handle to one push subscription, keyed by the client id baked into the
/// URL. Exclusively owned by the run lifecycle controller; dropping the
/// handle tears the subscription down on every exit path.
pub struct EventChannel {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    pump: tokio::task::JoinHandle<()>,
    closed: bool,
}

impl EventChannel {
    /// Open a subscription to `ws_url`. Must be called inside a tokio
    /// runtime; the socket is owned by a spawned pump task.
    pub fn open(ws_url: String) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump(ws_url, tx));
        Self {
            events,
            pump,
            closed: false,
        }
    }

    /// Await the next channel event. `None` after the pump has stopped and
    /// the queue has drained.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Non-blocking poll for the dispatch loop.
    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.events.try_recv().ok()
    }

    /// Tear the subscription down. No acknowledgment; safe to call twice.
    pub fn close(&mut self) {
        if !self.closed {
            self.pump.abort();
            self.closed = true;
        }
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn pump(ws_url: String, tx: mpsc::UnboundedSender<ChannelEvent>) {
    let mut socket = match connect_async(ws_url.as_str()).await {
        Ok((socket, _)) => socket,
        Err(err) => {
            let _ = tx.send(ChannelEvent::Error(err.to_string()));
            let _ = tx.send(ChannelEvent::Closed);
            return;
        }
    };
    let _ = tx.send(ChannelEvent::Open);

    while let Some(frame) = socket.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<RawPushMessage>(&text) {
                Ok(message) => {
                    if tx.send(ChannelEvent::Message(message)).is_err() {
                        // Receiver gone; the handle was dropped mid-flight.
                        return;
                    }
                }
                Err(err) => debug!("unparseable push frame: {err}"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                let _ = tx.send(ChannelEvent::Error(err.to_string()));
                break;
            }
        }
    }
    let _ = tx.send(ChannelEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use tokio::net::TcpListener;

    /// Minimal WebSocket server that sends the given frames, then closes.
    async fn serve_frames(frames: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
            for frame in frames {
                socket.send(Message::Text(frame.into())).await.unwrap();
            }
            let _ = socket.close(None).await;
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn channel_yields_open_messages_and_closed() {
        let url = serve_frames(vec![
            r#"{"type":"agent_log","data":{"prefix":"Summary","content":"hi"},"timestamp":"2025-03-01T10:00:00Z"}"#.to_string(),
            "not json at all".to_string(),
            r#"{"type":"agent_finished"}"#.to_string(),
        ])
        .await;

        let mut channel = EventChannel::open(url);
        assert!(matches!(channel.recv().await, Some(ChannelEvent::Open)));

        match channel.recv().await {
            Some(ChannelEvent::Message(msg)) => assert_eq!(msg.message_type, "agent_log"),
            other => panic!("expected log frame, got {other:?}"),
        }
        // The unparseable frame is dropped, not surfaced.
        match channel.recv().await {
            Some(ChannelEvent::Message(msg)) => assert_eq!(msg.message_type, "agent_finished"),
            other => panic!("expected finished frame, got {other:?}"),
        }
        assert!(matches!(channel.recv().await, Some(ChannelEvent::Closed)));
    }

    #[tokio::test]
    async fn failed_connect_reports_error_then_closed() {
        // Nothing listens on this port.
        let mut channel = EventChannel::open("ws://127.0.0.1:1/ws/c1".to_string());
        assert!(matches!(channel.recv().await, Some(ChannelEvent::Error(_))));
        assert!(matches!(channel.recv().await, Some(ChannelEvent::Closed)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let url = serve_frames(vec![]).await;
        let mut channel = EventChannel::open(url);
        channel.close();
        channel.close();
    }
}
