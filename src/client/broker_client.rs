//! Broker client for the CLI client.
//!
//! Connects to the daemon, performs the handshake, and issues invoke
//! and inject requests. State events that arrive while a request is
//! outstanding are buffered and handed out by [`BrokerClient::next_event`].

use std::collections::VecDeque;
use std::path::Path;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use crate::events::{PropertyBag, PropertyValue};
use crate::ipc::codec::LengthPrefixedCodec;
use crate::ipc::protocol::{Command, Message, PROTOCOL_VERSION, Role, Status};
use crate::telephony::{PhoneAccount, PhoneAccountHandle, PlatformPayload, SubscriptionId};

use super::ClientError;

/// Payload of a successful invoke.
#[derive(Debug, Default, PartialEq)]
pub struct InvokeResult {
    pub value: Option<PropertyValue>,
    pub accounts: Option<Vec<PhoneAccount>>,
    pub handles: Option<Vec<PhoneAccountHandle>>,
    pub handle: Option<PhoneAccountHandle>,
}

/// An unsolicited state event.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedEvent {
    pub name: String,
    pub properties: PropertyBag,
    pub timestamp: u64,
}

/// Broker client for CLI commands.
pub struct BrokerClient {
    framed: Framed<UnixStream, LengthPrefixedCodec>,
    next_id: u32,
    pending_events: VecDeque<ReceivedEvent>,
}

impl BrokerClient {
    /// Connect to the daemon at `socket_path` and perform the handshake.
    pub async fn connect(socket_path: &Path, role: Role) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|e| ClientError::Broker(format!("connect failed: {e}")))?;
        let mut framed = Framed::new(stream, LengthPrefixedCodec::new());

        // Handshake: Hello → HelloAck.
        framed
            .send(Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
                role,
            })
            .await
            .map_err(|e| ClientError::Broker(format!("send hello: {e}")))?;

        match framed.next().await {
            Some(Ok(Message::HelloAck {
                status: Status::Ok,
                session,
                ..
            })) => {
                tracing::debug!(?session, ?role, "connected");
            }
            Some(Ok(Message::HelloAck {
                status: Status::Error,
                error,
                ..
            })) => {
                return Err(ClientError::Broker(format!(
                    "handshake rejected: {}",
                    error.unwrap_or_default()
                )));
            }
            other => {
                return Err(ClientError::Broker(format!(
                    "unexpected handshake response: {other:?}"
                )));
            }
        }

        Ok(Self {
            framed,
            next_id: 1, // 0 = Hello
            pending_events: VecDeque::new(),
        })
    }

    /// Invoke a facade command.
    pub async fn invoke(&mut self, call: Command) -> Result<InvokeResult, ClientError> {
        let id = self.take_id();
        match self.request(Message::Invoke { id, call }).await? {
            Message::Response {
                status: Status::Ok,
                value,
                accounts,
                handles,
                handle,
                ..
            } => Ok(InvokeResult {
                value,
                accounts,
                handles,
                handle,
            }),
            Message::Response { error, .. } => Err(ClientError::Broker(error.unwrap_or_default())),
            other => Err(ClientError::Broker(format!(
                "unexpected invoke response: {other:?}"
            ))),
        }
    }

    /// Inject a platform payload. Requires the harness role.
    pub async fn inject(
        &mut self,
        sub_id: Option<SubscriptionId>,
        payload: PlatformPayload,
    ) -> Result<(), ClientError> {
        let id = self.take_id();
        match self
            .request(Message::InjectState {
                id,
                sub_id,
                payload,
            })
            .await?
        {
            Message::Response {
                status: Status::Ok, ..
            } => Ok(()),
            Message::Response { error, .. } => Err(ClientError::Broker(format!(
                "inject failed: {}",
                error.unwrap_or_default()
            ))),
            other => Err(ClientError::Broker(format!(
                "unexpected inject response: {other:?}"
            ))),
        }
    }

    /// Wait for the next state event. `None` when the daemon closed the
    /// connection.
    pub async fn next_event(&mut self) -> Result<Option<ReceivedEvent>, ClientError> {
        if let Some(event) = self.pending_events.pop_front() {
            return Ok(Some(event));
        }
        loop {
            match self.framed.next().await {
                Some(Ok(Message::Event {
                    name,
                    properties,
                    timestamp,
                    ..
                })) => {
                    return Ok(Some(ReceivedEvent {
                        name,
                        properties,
                        timestamp,
                    }));
                }
                Some(Ok(other)) => {
                    tracing::debug!(?other, "ignoring unexpected message");
                }
                Some(Err(e)) => return Err(ClientError::Broker(format!("receive: {e}"))),
                None => return Ok(None),
            }
        }
    }

    fn take_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Send a request and wait for the response with the same id,
    /// buffering any events received in between.
    async fn request(&mut self, msg: Message) -> Result<Message, ClientError> {
        self.framed
            .send(msg)
            .await
            .map_err(|e| ClientError::Broker(format!("send: {e}")))?;
        loop {
            match self.framed.next().await {
                Some(Ok(Message::Event {
                    name,
                    properties,
                    timestamp,
                    ..
                })) => self.pending_events.push_back(ReceivedEvent {
                    name,
                    properties,
                    timestamp,
                }),
                Some(Ok(response)) => return Ok(response),
                Some(Err(e)) => return Err(ClientError::Broker(format!("receive: {e}"))),
                None => return Err(ClientError::Broker("connection closed".into())),
            }
        }
    }
}

// -- Argument decoding --

/// Parse `key=string` and `key:=scalar` arguments into an ordered bag.
///
/// Scalars are `true`, `false` or a decimal integer.
pub fn parse_params(args: &[String]) -> Result<PropertyBag, ClientError> {
    let mut params = PropertyBag::new();
    for arg in args {
        if let Some((key, raw)) = arg.split_once(":=") {
            let value = match raw {
                "true" => PropertyValue::Bool(true),
                "false" => PropertyValue::Bool(false),
                n => n.parse::<i64>().map(PropertyValue::Int).map_err(|_| {
                    ClientError::Usage(format!("{key}: expected true, false or an integer"))
                })?,
            };
            params.insert(key.to_string(), value);
        } else if let Some((key, raw)) = arg.split_once('=') {
            params.insert(key.to_string(), PropertyValue::Text(raw.to_string()));
        } else {
            return Err(ClientError::Usage(format!(
                "bad parameter {arg:?}: expected key=value or key:=scalar"
            )));
        }
    }
    Ok(params)
}

#[derive(Serialize)]
struct WireCall<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a PropertyBag>,
}

/// Build a [`Command`] from a method name and its parameters.
///
/// Methods without parameters are encoded without a `params` map;
/// methods whose parameters are all optional accept an empty one.
pub fn build_command(method: &str, params: &PropertyBag) -> Result<Command, ClientError> {
    let decode = |params: Option<&PropertyBag>| -> Result<Command, String> {
        let bytes =
            rmp_serde::to_vec_named(&WireCall { method, params }).map_err(|e| e.to_string())?;
        rmp_serde::from_slice(&bytes).map_err(|e| e.to_string())
    };
    let result = if params.is_empty() {
        decode(None).or_else(|_| decode(Some(params)))
    } else {
        decode(Some(params))
    };
    result.map_err(|e| ClientError::Usage(format!("invalid call to {method}: {e}")))
}

/// Build a [`PlatformPayload`] of `kind` from its fields.
pub fn build_payload(kind: &str, fields: &PropertyBag) -> Result<PlatformPayload, ClientError> {
    let mut tagged = PropertyBag::new();
    tagged.insert("kind".into(), PropertyValue::Text(kind.to_string()));
    tagged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    let bytes = rmp_serde::to_vec_named(&tagged)
        .map_err(|e| ClientError::Usage(format!("encode {kind}: {e}")))?;
    rmp_serde::from_slice(&bytes)
        .map_err(|e| ClientError::Usage(format!("invalid {kind} payload: {e}")))
}
