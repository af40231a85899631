//! Per-connection task.
//!
//! A connection opens with a `hello` that the broker loop answers with a
//! session id. After that the task forwards each request to the broker
//! loop and writes the session's queued state events between replies,
//! so a client sees events and responses on one ordered stream.

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;

use crate::ipc::codec::{CodecError, DecodeResult, FrameCodec, decode_frame};
use crate::ipc::protocol::{Message, Status};

use super::handler::error_response;
use super::sink::OutboundEvent;
use super::state::ConnectionId;

/// Request forwarded from a connection task to the broker loop.
#[derive(Debug)]
pub struct BrokerCommand {
    pub request: Message,
    pub response_tx: oneshot::Sender<Message>,
    pub connection_id: ConnectionId,
}

/// Sent when a connection task exits, so its session can be closed.
#[derive(Debug)]
pub struct DisconnectNotice {
    pub connection_id: ConnectionId,
}

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("closed before hello")]
    HandshakeEof,
    #[error("first message must be hello")]
    NotHello,
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] rmp_serde::decode::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("broker loop closed")]
    BrokerGone,
    #[error("response channel closed")]
    ResponseDropped,
}

/// Spawn the task serving one client connection.
///
/// `events` is the session's outbound queue, fed by its listeners.
/// A [`DisconnectNotice`] is sent when the task exits for any reason.
pub fn spawn_connection(
    stream: UnixStream,
    conn_id: ConnectionId,
    cmd_tx: mpsc::UnboundedSender<BrokerCommand>,
    events: mpsc::UnboundedReceiver<OutboundEvent>,
    disconnect_tx: mpsc::UnboundedSender<DisconnectNotice>,
) {
    tokio::spawn(async move {
        let mut conn = Connection {
            framed: Framed::new(stream, FrameCodec::new()),
            id: conn_id,
            cmd_tx,
            session: None,
            delivered: 0,
        };
        match conn.run(events).await {
            Ok(()) => tracing::debug!(
                ?conn_id,
                session = ?conn.session,
                delivered = conn.delivered,
                "connection closed"
            ),
            Err(e) => tracing::debug!(
                ?conn_id,
                session = ?conn.session,
                delivered = conn.delivered,
                error = %e,
                "connection dropped"
            ),
        }
        let _ = disconnect_tx.send(DisconnectNotice {
            connection_id: conn_id,
        });
    });
}

struct Connection {
    framed: Framed<UnixStream, FrameCodec>,
    id: ConnectionId,
    cmd_tx: mpsc::UnboundedSender<BrokerCommand>,
    /// Session id from the accepted `hello_ack`.
    session: Option<String>,
    /// State events written to the client so far.
    delivered: u64,
}

impl Connection {
    async fn run(
        &mut self,
        mut events: mpsc::UnboundedReceiver<OutboundEvent>,
    ) -> Result<(), ConnectionError> {
        if !self.open_session().await? {
            return Ok(());
        }

        loop {
            tokio::select! {
                frame = self.framed.next() => match frame {
                    Some(frame) => self.dispatch(frame?).await?,
                    None => return Ok(()),
                },
                queued = events.recv() => match queued {
                    Some(queued) => self.deliver(queued).await?,
                    // The broker dropped the session's sender: shutting down.
                    None => return Ok(()),
                },
            }
        }
    }

    /// Forward the opening `hello` and relay the ack. Returns `false`
    /// when the broker rejected it; the connection is then closed.
    async fn open_session(&mut self) -> Result<bool, ConnectionError> {
        let frame = self
            .framed
            .next()
            .await
            .ok_or(ConnectionError::HandshakeEof)??;
        let hello = match decode_frame(&frame) {
            DecodeResult::Ok(msg @ Message::Hello { .. }) => msg,
            DecodeResult::Ok(_) | DecodeResult::UnknownType(_) => {
                return Err(ConnectionError::NotHello);
            }
            DecodeResult::Malformed(e) => return Err(e.into()),
        };

        let ack = self.forward(hello).await?;
        let accepted = match &ack {
            Message::HelloAck {
                status: Status::Ok,
                session,
                ..
            } => {
                self.session = session.clone();
                true
            }
            _ => false,
        };
        self.framed.send(ack).await?;
        Ok(accepted)
    }

    /// Answer one client frame. Unknown message types get an error reply
    /// and the connection stays open.
    async fn dispatch(&mut self, frame: BytesMut) -> Result<(), ConnectionError> {
        let reply = match decode_frame(&frame) {
            DecodeResult::Ok(request) => self.forward(request).await?,
            DecodeResult::UnknownType(envelope) => {
                tracing::debug!(
                    session = ?self.session,
                    msg_type = %envelope.msg_type,
                    "unknown message type"
                );
                error_response(envelope.id, "unknown_type")
            }
            DecodeResult::Malformed(e) => return Err(e.into()),
        };
        self.framed.send(reply).await?;
        Ok(())
    }

    /// Write one queued state event as an unsolicited frame.
    async fn deliver(&mut self, queued: OutboundEvent) -> Result<(), ConnectionError> {
        let name = queued.event.name.clone();
        if let Err(e) = self.framed.send(queued.into_message()).await {
            tracing::warn!(
                session = ?self.session,
                event = %name,
                error = %e,
                "failed to write state event"
            );
            return Err(e.into());
        }
        self.delivered += 1;
        Ok(())
    }

    /// Hand a request to the broker loop and wait for its reply.
    async fn forward(&self, request: Message) -> Result<Message, ConnectionError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(BrokerCommand {
                request,
                response_tx,
                connection_id: self.id,
            })
            .map_err(|_| ConnectionError::BrokerGone)?;
        response_rx
            .await
            .map_err(|_| ConnectionError::ResponseDropped)
    }
}
