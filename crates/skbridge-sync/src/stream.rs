//! One WebSocket stream session.
//!
//! A session covers a single connection lifecycle: connect with
//! credentials, report `Opened`, pump frames until the connection dies
//! or a `Close` command arrives, report `Closed` with the reason. The
//! session never reconnects itself; that is the supervisor's job.

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use skbridge_core::BusPath;
use skbridge_protocol::{codec, CodecError, InboundFrame};

use crate::router::UpdateRouter;

/// Where the connection currently stands, as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseReason {
    /// Closed on request; the supervisor must not reconnect.
    UserInitiated,
    /// Connection or protocol failure; the supervisor reconnects.
    Error(String),
}

/// Events a session reports to its supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Opened,
    Closed(CloseReason),
}

/// Commands a supervisor sends into a session. Commands are only
/// processed once the connection is open; earlier sends queue in the
/// channel and flush right after `Opened`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamCommand {
    Subscribe(Vec<BusPath>),
    Unsubscribe(Vec<BusPath>),
    Close,
}

#[derive(Debug, Error)]
enum SessionError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid security token")]
    BadToken(#[from] http::header::InvalidHeaderValue),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Run one session to completion. Always emits exactly one final
/// `Closed` event.
pub(crate) async fn run_session(
    url: String,
    token: Option<String>,
    router: UpdateRouter,
    mut cmd_rx: mpsc::Receiver<StreamCommand>,
    event_tx: mpsc::Sender<StreamEvent>,
) {
    let reason = match session(&url, token.as_deref(), &router, &mut cmd_rx, &event_tx).await {
        Ok(reason) => reason,
        Err(e) => CloseReason::Error(e.to_string()),
    };
    let _ = event_tx.send(StreamEvent::Closed(reason)).await;
}

async fn session(
    url: &str,
    token: Option<&str>,
    router: &UpdateRouter,
    cmd_rx: &mut mpsc::Receiver<StreamCommand>,
    event_tx: &mpsc::Sender<StreamEvent>,
) -> Result<CloseReason, SessionError> {
    let mut request = url.into_client_request()?;
    if let Some(token) = token {
        let value = http::HeaderValue::from_str(&format!("JWT {token}"))?;
        request
            .headers_mut()
            .insert(http::header::AUTHORIZATION, value);
    }

    let (ws_stream, _) = connect_async(request).await?;
    info!(%url, "stream connected");

    if event_tx.send(StreamEvent::Opened).await.is_err() {
        // Supervisor went away during the handshake
        return Ok(CloseReason::UserInitiated);
    }

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_text(&text, router),
                Some(Ok(Message::Ping(data))) => ws_tx.send(Message::Pong(data)).await?,
                Some(Ok(Message::Close(_))) => {
                    return Ok(CloseReason::Error("server closed the stream".to_string()));
                }
                Some(Ok(_)) => {} // Binary and pong frames carry nothing for us
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(CloseReason::Error("stream ended".to_string())),
            },

            cmd = cmd_rx.recv() => match cmd {
                Some(StreamCommand::Subscribe(paths)) => {
                    if !paths.is_empty() {
                        debug!(count = paths.len(), "sending subscribe");
                        let frame = codec::encode_subscribe(paths)?;
                        ws_tx.send(Message::Text(frame)).await?;
                    }
                }
                Some(StreamCommand::Unsubscribe(paths)) => {
                    // Best effort: a failed unsubscribe only costs spurious
                    // updates, which routing drops anyway
                    if !paths.is_empty() {
                        match codec::encode_unsubscribe(paths) {
                            Ok(frame) => {
                                if let Err(e) = ws_tx.send(Message::Text(frame)).await {
                                    warn!(error = %e, "unsubscribe not delivered");
                                }
                            }
                            Err(e) => warn!(error = %e, "unsubscribe not encoded"),
                        }
                    }
                }
                Some(StreamCommand::Close) | None => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return Ok(CloseReason::UserInitiated);
                }
            },
        }
    }
}

/// Decode and dispatch one text frame. Malformed frames are dropped;
/// one bad frame must not take the connection down.
fn handle_text(text: &str, router: &UpdateRouter) {
    match codec::decode_frame(text) {
        Ok(InboundFrame::Delta(delta)) => {
            for event in delta.into_events() {
                router.route(&event);
            }
        }
        Ok(InboundFrame::Hello(hello)) => {
            info!(server = %hello.name, version = ?hello.version, "received server hello");
        }
        Err(_) => debug!("dropping unrecognized frame"),
    }
}
