use crate::errors::ClientResult;
use crate::session::SessionToken;
use backon::{ExponentialBuilder, Retryable};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use taskdeck_core::{ClientFrame, LiveEvent};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Push channel notifying that the remote collection changed.
///
/// Runs in the background until [`close`](Self::close) is called or the
/// handle is dropped, reconnecting whenever the connection goes away.
pub struct LiveUpdateChannel {
    shutdown: CancellationToken,
}

impl LiveUpdateChannel {
    pub fn spawn(
        url: impl Into<String>,
        session: SessionToken,
        events: mpsc::Sender<LiveEvent>,
        reconnect_delay: Duration,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let connection = Connection {
            url: url.into(),
            session,
            events,
            reconnect_delay,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(connection.run());
        Self { shutdown }
    }

    pub fn close(&self) {
        if !self.shutdown.is_cancelled() {
            debug!("LIVE: Closing channel");
            self.shutdown.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for LiveUpdateChannel {
    fn drop(&mut self) {
        self.close();
    }
}

struct Connection {
    url: String,
    session: SessionToken,
    events: mpsc::Sender<LiveEvent>,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
}

impl Connection {
    async fn run(self) {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            debug!("LIVE: Connection attempt #{} to {}", attempts, self.url);

            let connected = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                connected = connect_with_retry(&self.url) => connected,
            };

            match connected {
                Ok(stream) => {
                    info!("LIVE: Connected to {} after {} attempts", self.url, attempts);
                    attempts = 0;
                    match self.serve(stream).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => warn!("LIVE: Connection lost: {}", e),
                    }
                }
                Err(e) => warn!("LIVE: Could not connect to {}: {}", self.url, e),
            }

            if self.shutdown.is_cancelled() || self.events.is_closed() {
                break;
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
        info!("LIVE: Channel closed");
    }

    /// Pumps one connection. `Ok(true)` asks for a reconnect, `Ok(false)`
    /// means the channel should stop.
    async fn serve(&self, stream: WsStream) -> ClientResult<bool> {
        let (mut write, mut read) = stream.split();

        if let Some(token) = self.session.get() {
            let frame = serde_json::to_string(&ClientFrame::Authorization { token })?;
            write.send(Message::Text(frame)).await?;
            debug!("LIVE: Sent authorization frame");
        }

        loop {
            let message = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(false);
                }
                message = read.next() => message,
            };

            match message {
                Some(Ok(Message::Text(text))) => {
                    if !self.dispatch(&text).await {
                        return Ok(false);
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("LIVE: Server closed the connection");
                    return Ok(true);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Returns `false` once nobody listens for events anymore.
    async fn dispatch(&self, text: &str) -> bool {
        let event = match serde_json::from_str::<LiveEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                warn!("LIVE: Dropping malformed message: {}", e);
                return true;
            }
        };

        if !event.triggers_refresh() {
            warn!("LIVE: Ignoring unknown event: {}", text);
            return true;
        }

        debug!("LIVE: {} {:?}", event.event, event.item_id());
        self.events.send(event).await.is_ok()
    }
}

async fn connect_with_retry(url: &str) -> ClientResult<WsStream> {
    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(3)
        .with_jitter();

    let (stream, _) = (|| async { connect_async(url).await })
        .retry(backoff)
        .notify(|err, delay| debug!("LIVE: Connect failed ({}), retrying in {:?}", err, delay))
        .await?;

    Ok(stream)
}
