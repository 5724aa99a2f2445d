use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, SlackEnvelope, SlackEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` once the server closes the stream.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Shared flag telling the health endpoint whether the event stream is open.
#[derive(Clone, Debug, Default)]
pub struct ConnectionStatus(Arc<AtomicBool>);

impl ConnectionStatus {
    pub fn new(connected: bool) -> Self {
        Self(Arc::new(AtomicBool::new(connected)))
    }

    pub fn is_connected(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, connected: bool) {
        self.0.store(connected, Ordering::Release);
    }
}

/// Pumps one websocket session: every envelope is acknowledged, then handled
/// on its own task so slow schedule lookups never hold up the stream. There
/// is no reconnect; when the stream ends the runner waits for in-flight
/// handlers and returns.
pub struct SocketRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    status: ConnectionStatus,
}

impl SocketRunner {
    pub fn new(transport: Arc<dyn SocketTransport>, dispatcher: EventDispatcher) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), status: ConnectionStatus::default() }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.clone()
    }

    pub async fn start(&self) -> Result<()> {
        let mut in_flight = JoinSet::new();

        match self.connect_and_pump(&mut in_flight).await {
            Ok(()) => {
                info!(event_name = "ingress.slack.transport_closed", "slack event stream closed")
            }
            Err(transport_error) => warn!(
                event_name = "ingress.slack.transport_failed",
                error = %transport_error,
                "slack transport failed; not reconnecting"
            ),
        }
        self.status.set(false);

        while let Some(joined) = in_flight.join_next().await {
            if let Err(join_error) = joined {
                warn!(error = %join_error, "event handler task aborted");
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, in_flight: &mut JoinSet<()>) -> Result<(), TransportError> {
        info!(event_name = "ingress.slack.transport_opening", "opening slack transport connection");
        self.transport.connect().await?;
        self.status.set(true);
        info!(event_name = "ingress.slack.transport_open", "slack transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                self.transport.disconnect().await?;
                return Ok(());
            };
            let channel_id = channel_of(&envelope).unwrap_or("unknown").to_owned();

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                channel_id = %channel_id,
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    channel_id = %channel_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    channel_id = %channel_id,
                    "acknowledged slack envelope"
                );
            }

            while in_flight.try_join_next().is_some() {}

            let dispatcher = self.dispatcher.clone();
            in_flight.spawn(async move {
                let context = EventContext { correlation_id: envelope.envelope_id.clone() };
                if let Err(error) = dispatcher.dispatch(&envelope, &context).await {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        channel_id = %channel_id,
                        error = %error,
                        "event dispatch failed; continuing socket loop"
                    );
                }
            });
        }
    }
}

fn channel_of(envelope: &SlackEnvelope) -> Option<&str> {
    match &envelope.event {
        SlackEvent::Message(event) => Some(&event.channel_id),
        SlackEvent::BotChannelJoin(event) => Some(&event.channel_id),
        SlackEvent::Unsupported { .. } => None,
    }
}
