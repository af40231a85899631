//! Message dispatch and request handling.
//!
//! Pure logic with no socket I/O. Each handler takes a mutable reference
//! to [`BrokerState`] and returns the response message. Platform calls
//! run synchronously here; state events they trigger are queued on the
//! listening connections' outbound channels.

use crate::events::PropertyValue;
use crate::facade::{self, Reply};
use crate::ipc::protocol::{Command, Message, PROTOCOL_VERSION, Role, Status};
use crate::telephony::{PlatformPayload, SubscriptionId};

use super::state::{BrokerState, ConnectionId};

/// Dispatch a request message to the appropriate handler.
///
/// Enforces:
/// - Role-based access: `inject_state` is rejected from non-harness
///   roles as `unknown_type`
/// - Server-originated variants → `unknown_type`
pub fn handle_message(
    state: &mut BrokerState,
    request: Message,
    connection_id: ConnectionId,
) -> Message {
    match request {
        Message::Hello { id, version, role } => {
            handle_hello(state, id, version, role, connection_id)
        }
        Message::Invoke { id, call } => handle_invoke(state, id, call, connection_id),
        // -- Harness-only messages --
        Message::InjectState {
            id,
            sub_id,
            payload,
        } => {
            if state.role(connection_id) != Some(Role::Harness) {
                return error_response(id, "unknown_type");
            }
            handle_inject_state(state, id, sub_id, payload)
        }
        // Server-originated messages should never be sent by clients.
        Message::HelloAck { id, .. } | Message::Response { id, .. } | Message::Event { id, .. } => {
            error_response(id, "unknown_type")
        }
    }
}

// -- Individual handlers --

fn handle_hello(
    state: &mut BrokerState,
    id: u32,
    version: u32,
    role: Role,
    connection_id: ConnectionId,
) -> Message {
    if id != 0 {
        return hello_error("invalid_hello_id");
    }
    if version != PROTOCOL_VERSION {
        return hello_error("version_mismatch");
    }
    match state.open_session(connection_id, role) {
        // hello_ack.id is always 0.
        Ok(session) => Message::HelloAck {
            id: 0,
            status: Status::Ok,
            error: None,
            session: Some(session),
        },
        Err(reason) => hello_error(reason),
    }
}

fn handle_invoke(
    state: &mut BrokerState,
    id: u32,
    call: Command,
    connection_id: ConnectionId,
) -> Message {
    let Some((facade, session)) = state.session_mut(connection_id) else {
        return error_response(id, "no_session");
    };
    tracing::debug!(session = %session.id, ?call, "invoke");
    match facade::execute(facade, &mut session.registry, call) {
        Ok(reply) => reply_response(id, reply),
        Err(e) => {
            tracing::debug!(session = %session.id, error = %e, "command failed");
            error_response(id, &e.to_string())
        }
    }
}

fn handle_inject_state(
    state: &mut BrokerState,
    id: u32,
    sub_id: Option<SubscriptionId>,
    payload: PlatformPayload,
) -> Message {
    match state.platform().inject_state(sub_id, payload) {
        Ok(()) => ok_response(id),
        Err(e) => error_response(id, &e.to_string()),
    }
}

// -- Helpers --

fn reply_response(id: u32, reply: Reply) -> Message {
    let mut response = ok_response(id);
    if let Message::Response {
        value,
        accounts,
        handles,
        handle,
        ..
    } = &mut response
    {
        match reply {
            Reply::Unit => {}
            Reply::Bool(b) => *value = Some(PropertyValue::Bool(b)),
            Reply::Text(s) => *value = Some(PropertyValue::Text(s)),
            Reply::Accounts(list) => *accounts = Some(list),
            Reply::Handles(list) => *handles = Some(list),
            Reply::Handle(h) => *handle = h,
        }
    }
    response
}

fn hello_error(reason: &str) -> Message {
    Message::HelloAck {
        id: 0,
        status: Status::Error,
        error: Some(reason.into()),
        session: None,
    }
}

fn ok_response(id: u32) -> Message {
    Message::Response {
        id,
        status: Status::Ok,
        error: None,
        value: None,
        accounts: None,
        handles: None,
        handle: None,
    }
}

pub(crate) fn error_response(id: u32, reason: &str) -> Message {
    Message::Response {
        id,
        status: Status::Error,
        error: Some(reason.into()),
        value: None,
        accounts: None,
        handles: None,
        handle: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use crate::broker::sink::OutboundEvent;
    use crate::telephony::sim::{PlatformAction, SimulatedPlatform};

    struct Fixture {
        state: BrokerState,
        platform: Arc<SimulatedPlatform>,
    }

    impl Fixture {
        fn new() -> Self {
            let platform = Arc::new(SimulatedPlatform::with_sim_accounts(2, SubscriptionId(1)));
            Self {
                state: BrokerState::new(platform.clone()),
                platform,
            }
        }

        fn connect(&mut self) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundEvent>) {
            let conn = ConnectionId::new();
            let (tx, rx) = mpsc::unbounded_channel();
            self.state.add_connection(conn, tx);
            (conn, rx)
        }

        fn handle(&mut self, msg: Message, conn: ConnectionId) -> Message {
            handle_message(&mut self.state, msg, conn)
        }

        fn handshake(&mut self, role: Role) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundEvent>) {
            let (conn, rx) = self.connect();
            let resp = self.handle(hello(PROTOCOL_VERSION, role), conn);
            assert!(matches!(
                resp,
                Message::HelloAck {
                    status: Status::Ok,
                    ..
                }
            ));
            (conn, rx)
        }
    }

    fn hello(version: u32, role: Role) -> Message {
        Message::Hello {
            id: 0,
            version,
            role,
        }
    }

    fn invoke(id: u32, call: Command) -> Message {
        Message::Invoke { id, call }
    }

    fn error_of(resp: &Message) -> Option<&str> {
        match resp {
            Message::Response { error, .. } => error.as_deref(),
            other => panic!("expected Response, got {other:?}"),
        }
    }

    // -- Hello --

    #[test]
    fn hello_success_assigns_session() {
        let mut f = Fixture::new();
        let (c, _rx) = f.connect();
        match f.handle(hello(PROTOCOL_VERSION, Role::Client), c) {
            Message::HelloAck {
                id,
                status,
                session,
                ..
            } => {
                assert_eq!(id, 0);
                assert_eq!(status, Status::Ok);
                assert!(session.is_some());
            }
            other => panic!("expected HelloAck, got {other:?}"),
        }
    }

    #[test]
    fn hello_version_mismatch() {
        let mut f = Fixture::new();
        let (c, _rx) = f.connect();
        match f.handle(hello(999, Role::Client), c) {
            Message::HelloAck {
                id, status, error, ..
            } => {
                assert_eq!(id, 0);
                assert_eq!(status, Status::Error);
                assert_eq!(error.as_deref(), Some("version_mismatch"));
            }
            other => panic!("expected HelloAck, got {other:?}"),
        }
    }

    #[test]
    fn hello_nonzero_id_rejected() {
        let mut f = Fixture::new();
        let (c, _rx) = f.connect();
        let resp = f.handle(
            Message::Hello {
                id: 5,
                version: PROTOCOL_VERSION,
                role: Role::Client,
            },
            c,
        );
        match resp {
            Message::HelloAck { id, error, .. } => {
                assert_eq!(id, 0);
                assert_eq!(error.as_deref(), Some("invalid_hello_id"));
            }
            other => panic!("expected HelloAck, got {other:?}"),
        }
    }

    // -- Invoke --

    #[test]
    fn invoke_returns_value() {
        let mut f = Fixture::new();
        let (c, _rx) = f.handshake(Role::Client);
        match f.handle(invoke(7, Command::GetCallState), c) {
            Message::Response {
                id, status, value, ..
            } => {
                assert_eq!(id, 7);
                assert_eq!(status, Status::Ok);
                assert_eq!(value, Some(PropertyValue::Text("IDLE".into())));
            }
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[test]
    fn invoke_returns_accounts_and_handles() {
        let mut f = Fixture::new();
        let (c, _rx) = f.handshake(Role::Client);
        match f.handle(invoke(1, Command::GetAllPhoneAccounts), c) {
            Message::Response { accounts, .. } => assert_eq!(accounts.map(|a| a.len()), Some(2)),
            other => panic!("expected Response, got {other:?}"),
        }
        f.handle(
            invoke(
                2,
                Command::SetUserSelectedOutgoingPhoneAccountBySubId {
                    sub_id: SubscriptionId(2),
                },
            ),
            c,
        );
        match f.handle(invoke(3, Command::GetUserSelectedOutgoingPhoneAccount), c) {
            Message::Response { handle, .. } => {
                assert_eq!(handle.map(|h| h.id), Some("sim-2".to_string()))
            }
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[test]
    fn invoke_not_found_error_carries_input() {
        let mut f = Fixture::new();
        let (c, _rx) = f.handshake(Role::Client);
        let resp = f.handle(
            invoke(
                4,
                Command::SetUserSelectedOutgoingPhoneAccount {
                    phone_account_handle_id: "x".into(),
                },
            ),
            c,
        );
        assert_eq!(
            error_of(&resp),
            Some("Failed to find a matching phoneAccountHandleId(x).")
        );
    }

    #[test]
    fn platform_failure_message_reaches_client() {
        let mut f = Fixture::new();
        let (c, _rx) = f.handshake(Role::Client);
        f.platform.fail_call("silence_ringer", "audio service down");
        let resp = f.handle(invoke(4, Command::SilenceRinger), c);
        assert_eq!(
            error_of(&resp),
            Some("platform call silence_ringer failed: audio service down")
        );
    }

    #[test]
    fn seeded_contact_is_callable() {
        let platform = Arc::new(
            SimulatedPlatform::with_sim_accounts(1, SubscriptionId(1)).with_contacts(&[(
                "content://com.android.contacts/contacts/7".to_string(),
                "2025550199".to_string(),
            )]),
        );
        let mut f = Fixture {
            state: BrokerState::new(platform.clone()),
            platform,
        };
        let (c, _rx) = f.handshake(Role::Client);
        let resp = f.handle(
            invoke(
                5,
                Command::CallContentUri {
                    uri_string: "content://com.android.contacts/contacts/7".into(),
                    video_call: false,
                },
            ),
            c,
        );
        assert_eq!(error_of(&resp), None);
        assert_eq!(
            f.platform.actions(),
            vec![PlatformAction::PlaceCall {
                uri: "tel:2025550199".into(),
                video: false,
            }]
        );
    }

    #[test]
    fn invoke_without_session_rejected() {
        let mut f = Fixture::new();
        let (c, _rx) = f.connect();
        let resp = f.handle(invoke(1, Command::IsInCall), c);
        assert_eq!(error_of(&resp), Some("no_session"));
    }

    // -- Inject --

    #[test]
    fn inject_from_client_is_unknown_type() {
        let mut f = Fixture::new();
        let (c, _rx) = f.handshake(Role::Client);
        let resp = f.handle(
            Message::InjectState {
                id: 2,
                sub_id: None,
                payload: PlatformPayload::DataConnectionState { state: 2 },
            },
            c,
        );
        assert_eq!(error_of(&resp), Some("unknown_type"));
    }

    #[test]
    fn harness_inject_reaches_tracking_client() {
        let mut f = Fixture::new();
        let (client, mut events) = f.handshake(Role::Client);
        let (harness, _rx) = f.handshake(Role::Harness);

        f.handle(
            invoke(1, Command::StartTrackingDataConnectionStateChange),
            client,
        );
        let resp = f.handle(
            Message::InjectState {
                id: 9,
                sub_id: None,
                payload: PlatformPayload::DataConnectionState { state: 2 },
            },
            harness,
        );
        assert!(matches!(
            resp,
            Message::Response {
                id: 9,
                status: Status::Ok,
                ..
            }
        ));

        let queued = events.try_recv().unwrap();
        assert_eq!(queued.event.name, "onDataConnectionStateChangedConnected");
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn injected_call_state_visible_to_commands() {
        let mut f = Fixture::new();
        let (harness, _rx) = f.handshake(Role::Harness);
        f.handle(
            Message::InjectState {
                id: 1,
                sub_id: None,
                payload: PlatformPayload::CallState {
                    state: crate::telephony::codes::call_state::RINGING,
                    incoming_number: String::new(),
                },
            },
            harness,
        );
        match f.handle(invoke(2, Command::IsRinging), harness) {
            Message::Response { value, .. } => assert_eq!(value, Some(PropertyValue::Bool(true))),
            other => panic!("expected Response, got {other:?}"),
        }
        assert_eq!(f.platform.listener_count(), 0);
    }

    // -- Unknown type --

    #[test]
    fn server_messages_return_unknown_type() {
        let mut f = Fixture::new();
        let (c, _rx) = f.handshake(Role::Harness);

        let resp = f.handle(
            Message::HelloAck {
                id: 1,
                status: Status::Ok,
                error: None,
                session: None,
            },
            c,
        );
        assert_eq!(error_of(&resp), Some("unknown_type"));

        let resp = f.handle(
            Message::Event {
                id: 2,
                name: "onCallStateChangedIdle".into(),
                properties: Default::default(),
                timestamp: 0,
            },
            c,
        );
        assert_eq!(error_of(&resp), Some("unknown_type"));
    }

    #[test]
    fn unimplemented_command_is_error() {
        let mut f = Fixture::new();
        let (c, _rx) = f.handshake(Role::Client);
        let resp = f.handle(invoke(3, Command::SwapCalls), c);
        assert_eq!(error_of(&resp), Some("telecomSwapCalls is not implemented"));
    }
}
