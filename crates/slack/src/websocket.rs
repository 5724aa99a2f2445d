use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::json;
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::{
    events::SlackEnvelope,
    socket::{SocketTransport, TransportError},
    web::{SlackWebClient, WebApiError},
    wire::{Dialect, Frame},
};

/// How the websocket URL is obtained and whether envelopes need acks.
#[derive(Clone)]
pub enum Protocol {
    /// Slack app in Socket Mode, opened with the app-level token.
    SocketMode { app_token: SecretString },
    /// Custom integration on the RTM API, opened with the bot token.
    Rtm,
}

impl Protocol {
    fn dialect(&self) -> Dialect {
        match self {
            Self::SocketMode { .. } => Dialect::SocketMode,
            Self::Rtm => Dialect::Rtm,
        }
    }
}

struct Session {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    bot_user_id: String,
}

pub struct WebSocketTransport {
    web: Arc<SlackWebClient>,
    protocol: Protocol,
    session: Mutex<Option<Session>>,
}

impl WebSocketTransport {
    pub fn new(web: Arc<SlackWebClient>, protocol: Protocol) -> Self {
        Self { web, protocol, session: Mutex::new(None) }
    }

    async fn open_url(&self) -> Result<(String, String), TransportError> {
        let connect_error = |error: WebApiError| TransportError::Connect(error.to_string());
        match &self.protocol {
            Protocol::SocketMode { app_token } => {
                let identity = self.web.auth_test().await.map_err(connect_error)?;
                let url = self.web.open_socket_connection(app_token).await.map_err(connect_error)?;
                Ok((url, identity.user_id))
            }
            Protocol::Rtm => {
                let session = self.web.rtm_connect().await.map_err(connect_error)?;
                Ok((session.url, session.bot_user_id))
            }
        }
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let (url, bot_user_id) = self.open_url().await?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        info!(
            event_name = "ingress.slack.websocket_open",
            bot_user_id = %bot_user_id,
            "slack websocket handshake complete"
        );
        *self.session.lock().await = Some(Session { stream, bot_user_id });
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return Err(TransportError::Receive("websocket is not connected".to_owned()));
        };
        let dialect = self.protocol.dialect();

        while let Some(message) = session.stream.next().await {
            let message = message.map_err(|error| TransportError::Receive(error.to_string()))?;
            let text = match message {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    info!(
                        event_name = "ingress.slack.websocket_closed",
                        frame = ?frame,
                        "slack closed the websocket"
                    );
                    return Ok(None);
                }
                // Pings are answered by tungstenite on the next read.
                _ => continue,
            };

            match dialect.parse_frame(&text, &session.bot_user_id) {
                Ok(Frame::Envelope(envelope)) => return Ok(Some(envelope)),
                Ok(Frame::Hello) => debug!(event_name = "ingress.slack.hello", "slack said hello"),
                Ok(Frame::Disconnect { reason }) => {
                    info!(
                        event_name = "ingress.slack.disconnect_requested",
                        reason = %reason,
                        "slack asked to disconnect"
                    );
                    return Ok(None);
                }
                Ok(Frame::Ignored) => {}
                Err(error) => warn!(error = %error, "skipping undecodable websocket frame"),
            }
        }

        Ok(None)
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        if !matches!(self.protocol, Protocol::SocketMode { .. }) {
            return Ok(());
        }

        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return Err(TransportError::Acknowledge("websocket is not connected".to_owned()));
        };
        let ack = json!({ "envelope_id": envelope_id }).to_string();
        session
            .stream
            .send(Message::Text(ack))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Ok(());
        };
        match session.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(error) => Err(TransportError::Disconnect(error.to_string())),
        }
    }
}
