//! Event delivery: forwards translated state events to a client.
//!
//! A [`ChannelSink`] wraps the connection's outbound channel. Events are
//! stamped and queued in posting order; the connection task writes them
//! as unsolicited `event` frames (id 0).

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use crate::events::{EventSink, StateEvent};
use crate::ipc::protocol::Message;

/// Current time as Unix epoch milliseconds.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A state event queued for one client, stamped when it was posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
    pub event: StateEvent,
    pub timestamp: u64,
}

impl OutboundEvent {
    pub fn new(event: StateEvent) -> Self {
        Self {
            event,
            timestamp: epoch_millis(),
        }
    }

    /// The unsolicited `event` frame for this event.
    pub fn into_message(self) -> Message {
        Message::Event {
            id: 0,
            name: self.event.name,
            properties: self.event.properties,
            timestamp: self.timestamp,
        }
    }
}

/// [`EventSink`] feeding one connection's outbound queue.
///
/// Posting never blocks, so it is safe from platform callback threads.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<OutboundEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn post_event(&self, event: StateEvent) {
        if let Err(dropped) = self.tx.send(OutboundEvent::new(event)) {
            tracing::debug!(name = %dropped.0.event.name, "event dropped, client disconnected");
        }
    }
}
