//! Wire protocol message types for facade IPC.
//!
//! All messages are MessagePack-encoded maps with at minimum `type` and
//! `id` fields. Commands travel inside `invoke` as `{method, params}`,
//! using the scripting API's method names.

use serde::{Deserialize, Serialize};

use crate::events::{PropertyBag, PropertyValue};
use crate::telephony::{PhoneAccount, PhoneAccountHandle, PlatformPayload, SubscriptionId};

/// All wire protocol messages.
///
/// Serialized as a tagged union on the `type` field via MessagePack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Message {
    // -- Handshake --
    #[serde(rename = "hello")]
    Hello { id: u32, version: u32, role: Role },

    #[serde(rename = "hello_ack")]
    HelloAck {
        id: u32,
        status: Status,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Session id assigned by the daemon on success.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<String>,
    },

    // -- Commands --
    #[serde(rename = "invoke")]
    Invoke { id: u32, call: Command },

    // -- Harness only --
    #[serde(rename = "inject_state")]
    InjectState {
        id: u32,
        #[serde(default)]
        sub_id: Option<SubscriptionId>,
        payload: PlatformPayload,
    },

    // -- Unsolicited events (daemon → client) --
    #[serde(rename = "event")]
    Event {
        id: u32,
        name: String,
        properties: PropertyBag,
        /// Unix epoch millis when the event was posted.
        timestamp: u64,
    },

    // -- Generic response --
    #[serde(rename = "response")]
    Response {
        id: u32,
        status: Status,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<PropertyValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accounts: Option<Vec<PhoneAccount>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        handles: Option<Vec<PhoneAccountHandle>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        handle: Option<PhoneAccountHandle>,
    },
}

/// Client role in the handshake.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Scripting client: issues commands, receives events.
    Client,
    /// Test harness: additionally injects platform state.
    Harness,
}

/// Response status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// A facade command, tagged by scripting API method name.
///
/// Optional parameters default the way the scripting API documents
/// them (`videoCall` and `showDialpad` default to false).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method", content = "params")]
pub enum Command {
    // -- Telecom --
    #[serde(rename = "telecomAcceptRingingCall")]
    AcceptRingingCall,
    #[serde(rename = "telecomCancelMissedCallsNotification")]
    CancelMissedCallsNotification,
    #[serde(rename = "telecomClearAccounts")]
    ClearAccounts,
    #[serde(rename = "telecomEndCall")]
    EndCall,
    #[serde(rename = "telecomGetAllPhoneAccounts")]
    GetAllPhoneAccounts,
    #[serde(rename = "telecomGetCallState")]
    GetCallState,
    #[serde(rename = "telecomGetCurrentTtyMode")]
    GetCurrentTtyMode,
    #[serde(rename = "telecomShowInCallScreen")]
    ShowInCallScreen {
        #[serde(rename = "showDialpad", default)]
        show_dialpad: bool,
    },
    #[serde(rename = "telecomGetEnabledPhoneAccounts")]
    GetEnabledPhoneAccounts,
    #[serde(rename = "telecomSetUserSelectedOutgoingPhoneAccount")]
    SetUserSelectedOutgoingPhoneAccount {
        #[serde(rename = "phoneAccountHandleId")]
        phone_account_handle_id: String,
    },
    #[serde(rename = "telecomGetUserSelectedOutgoingPhoneAccount")]
    GetUserSelectedOutgoingPhoneAccount,
    #[serde(rename = "telecomSetUserSelectedOutgoingPhoneAccountBySubId")]
    SetUserSelectedOutgoingPhoneAccountBySubId {
        #[serde(rename = "subId")]
        sub_id: SubscriptionId,
    },
    #[serde(rename = "telecomIsInCall")]
    IsInCall,
    #[serde(rename = "telecomIsRinging")]
    IsRinging,
    #[serde(rename = "telecomSilenceRinger")]
    SilenceRinger,
    #[serde(rename = "telecomSwapCalls")]
    SwapCalls,
    #[serde(rename = "toggleCallWaiting")]
    ToggleCallWaiting {
        #[serde(default)]
        enabled: Option<bool>,
    },
    #[serde(rename = "toggleCallWaitingForSubscription")]
    ToggleCallWaitingForSubscription {
        #[serde(rename = "subId", default)]
        sub_id: Option<SubscriptionId>,
        #[serde(default)]
        enabled: Option<bool>,
    },
    #[serde(rename = "telecomHandleMmi")]
    HandleMmi {
        #[serde(rename = "dialString")]
        dial_string: String,
    },

    // -- Dialing --
    #[serde(rename = "telecomCall")]
    Call {
        #[serde(rename = "uriString")]
        uri_string: String,
        #[serde(rename = "videoCall", default)]
        video_call: bool,
    },
    #[serde(rename = "telecomCallContentUri")]
    CallContentUri {
        #[serde(rename = "uriString")]
        uri_string: String,
        #[serde(rename = "videoCall", default)]
        video_call: bool,
    },
    #[serde(rename = "telecomCallNumber")]
    CallNumber {
        number: String,
        #[serde(rename = "videoCall", default)]
        video_call: bool,
    },
    #[serde(rename = "telecomCallTelUri")]
    CallTelUri {
        #[serde(rename = "uriString")]
        uri_string: String,
        #[serde(rename = "videoCall", default)]
        video_call: bool,
    },
    #[serde(rename = "telecomCallEmergencyNumber")]
    CallEmergencyNumber { number: String },
    #[serde(rename = "telecomDial")]
    Dial { uri: String },
    #[serde(rename = "telecomDialNumber")]
    DialNumber { number: String },

    // -- State tracking --
    #[serde(rename = "telephonyStartTrackingCallState")]
    StartTrackingCallState,
    #[serde(rename = "telephonyStartTrackingCallStateForSubscription")]
    StartTrackingCallStateForSubscription {
        #[serde(rename = "subId")]
        sub_id: SubscriptionId,
    },
    #[serde(rename = "telephonyStopTrackingCallStateChange")]
    StopTrackingCallStateChange,
    #[serde(rename = "telephonyStopTrackingCallStateChangeForSubscription")]
    StopTrackingCallStateChangeForSubscription {
        #[serde(rename = "subId")]
        sub_id: SubscriptionId,
    },
    #[serde(rename = "telephonyAdjustPreciseCallStateListenLevel")]
    AdjustPreciseCallStateListenLevel {
        #[serde(rename = "type")]
        leg: String,
        listen: bool,
    },
    #[serde(rename = "telephonyAdjustPreciseCallStateListenLevelForSubscription")]
    AdjustPreciseCallStateListenLevelForSubscription {
        #[serde(rename = "type")]
        leg: String,
        listen: bool,
        #[serde(rename = "subId")]
        sub_id: SubscriptionId,
    },
    #[serde(rename = "telephonyStartTrackingDataConnectionRTInfo")]
    StartTrackingDataConnectionRTInfo,
    #[serde(rename = "telephonyStartTrackingDataConnectionRTInfoForSubscription")]
    StartTrackingDataConnectionRTInfoForSubscription {
        #[serde(rename = "subId")]
        sub_id: SubscriptionId,
    },
    #[serde(rename = "telephonyStopTrackingDataConnectionRTInfo")]
    StopTrackingDataConnectionRTInfo,
    #[serde(rename = "telephonyStopTrackingDataConnectionRTInfoForSubscription")]
    StopTrackingDataConnectionRTInfoForSubscription {
        #[serde(rename = "subId")]
        sub_id: SubscriptionId,
    },
    #[serde(rename = "telephonyStartTrackingDataConnectionStateChange")]
    StartTrackingDataConnectionStateChange,
    #[serde(rename = "telephonyStartTrackingDataConnectionStateChangeForSubscription")]
    StartTrackingDataConnectionStateChangeForSubscription {
        #[serde(rename = "subId")]
        sub_id: SubscriptionId,
    },
    #[serde(rename = "telephonyStopTrackingDataConnectionStateChange")]
    StopTrackingDataConnectionStateChange,
    #[serde(rename = "telephonyStopTrackingDataConnectionStateChangeForSubscription")]
    StopTrackingDataConnectionStateChangeForSubscription {
        #[serde(rename = "subId")]
        sub_id: SubscriptionId,
    },
    #[serde(rename = "telephonyStartTrackingServiceStateChange")]
    StartTrackingServiceStateChange,
    #[serde(rename = "telephonyStartTrackingServiceStateChangeForSubscription")]
    StartTrackingServiceStateChangeForSubscription {
        #[serde(rename = "subId")]
        sub_id: SubscriptionId,
    },
    #[serde(rename = "telephonyStopTrackingServiceStateChange")]
    StopTrackingServiceStateChange,
    #[serde(rename = "telephonyStopTrackingServiceStateChangeForSubscription")]
    StopTrackingServiceStateChangeForSubscription {
        #[serde(rename = "subId")]
        sub_id: SubscriptionId,
    },
}

/// Protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Minimal envelope for extracting `{type, id}` from unknown messages.
///
/// Used by the daemon as a fallback when [`Message`] deserialization
/// fails (unknown `type` tag, unknown `method`, bad params) so the
/// error response can echo the request `id`.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telephony::ServiceState;

    fn round_trip(msg: &Message) -> Message {
        let encoded = rmp_serde::to_vec_named(msg).unwrap();
        rmp_serde::from_slice(&encoded).unwrap()
    }

    fn invoke(call: Command) -> Message {
        Message::Invoke { id: 3, call }
    }

    #[test]
    fn hello_round_trip() {
        let msg = Message::Hello {
            id: 0,
            version: PROTOCOL_VERSION,
            role: Role::Harness,
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn hello_ack_carries_session() {
        let msg = Message::HelloAck {
            id: 0,
            status: Status::Ok,
            error: None,
            session: Some("b3c1".into()),
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn unit_command_round_trip() {
        let msg = invoke(Command::EndCall);
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn command_uses_scripting_method_names() {
        #[derive(Serialize)]
        struct Wire {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
            call: WireCall,
        }
        #[derive(Serialize)]
        struct WireCall {
            method: &'static str,
            params: WireParams,
        }
        #[derive(Serialize)]
        struct WireParams {
            number: &'static str,
        }
        let encoded = rmp_serde::to_vec_named(&Wire {
            msg_type: "invoke",
            id: 9,
            call: WireCall {
                method: "telecomDialNumber",
                params: WireParams {
                    number: "2025550123",
                },
            },
        })
        .unwrap();
        let decoded: Message = rmp_serde::from_slice(&encoded).unwrap();
        assert_eq!(
            decoded,
            Message::Invoke {
                id: 9,
                call: Command::DialNumber {
                    number: "2025550123".into()
                },
            }
        );
    }

    #[test]
    fn video_call_defaults_to_false() {
        #[derive(Serialize)]
        struct Wire {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
            call: WireCall,
        }
        #[derive(Serialize)]
        struct WireCall {
            method: &'static str,
            params: WireParams,
        }
        #[derive(Serialize)]
        struct WireParams {
            #[serde(rename = "uriString")]
            uri_string: &'static str,
        }
        let encoded = rmp_serde::to_vec_named(&Wire {
            msg_type: "invoke",
            id: 1,
            call: WireCall {
                method: "telecomCallTelUri",
                params: WireParams {
                    uri_string: "tel:12025550123",
                },
            },
        })
        .unwrap();
        match rmp_serde::from_slice::<Message>(&encoded).unwrap() {
            Message::Invoke {
                call: Command::CallTelUri { video_call, .. },
                ..
            } => assert!(!video_call),
            other => panic!("expected CallTelUri, got {other:?}"),
        }
    }

    #[test]
    fn optional_call_waiting_params_default_to_none() {
        let msg = invoke(Command::ToggleCallWaitingForSubscription {
            sub_id: None,
            enabled: None,
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn adjust_listen_level_round_trip() {
        let msg = invoke(Command::AdjustPreciseCallStateListenLevelForSubscription {
            leg: "Background".into(),
            listen: true,
            sub_id: SubscriptionId(2),
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn inject_state_round_trip() {
        let msg = Message::InjectState {
            id: 4,
            sub_id: Some(SubscriptionId(1)),
            payload: PlatformPayload::ServiceState(ServiceState {
                voice_reg_state: 0,
                operator_alpha_long: "Example".into(),
                operator_numeric: "310260".into(),
                manual_selection: false,
                roaming: false,
                emergency_only: false,
            }),
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn event_round_trip_keeps_property_order() {
        let mut properties = PropertyBag::new();
        properties.insert("Type".into(), PropertyValue::Text("Foreground".into()));
        properties.insert("Cause".into(), PropertyValue::Int(16));
        let msg = Message::Event {
            id: 0,
            name: "onPreciseStateChangedDisconnected".into(),
            properties,
            timestamp: 1_700_000_000_000,
        };
        match round_trip(&msg) {
            Message::Event { properties, .. } => {
                let keys: Vec<&str> = properties.keys().map(String::as_str).collect();
                assert_eq!(keys, vec!["Type", "Cause"]);
            }
            other => panic!("expected Event, got {other:?}"),
        }
    }

    #[test]
    fn response_with_accounts_round_trip() {
        let msg = Message::Response {
            id: 5,
            status: Status::Ok,
            error: None,
            value: None,
            accounts: Some(vec![crate::telephony::sim::sim_account(1)]),
            handles: None,
            handle: None,
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn response_error_round_trip() {
        let msg = Message::Response {
            id: 1,
            status: Status::Error,
            error: Some("Failed to find a matching phoneAccountHandleId(x).".into()),
            value: None,
            accounts: None,
            handles: None,
            handle: None,
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn unknown_method_falls_back_to_envelope() {
        #[derive(Serialize)]
        struct Wire {
            #[serde(rename = "type")]
            msg_type: &'static str,
            id: u32,
            call: WireCall,
        }
        #[derive(Serialize)]
        struct WireCall {
            method: &'static str,
        }
        let encoded = rmp_serde::to_vec_named(&Wire {
            msg_type: "invoke",
            id: 11,
            call: WireCall {
                method: "telecomFrobnicate",
            },
        })
        .unwrap();
        assert!(rmp_serde::from_slice::<Message>(&encoded).is_err());
        let envelope: RawEnvelope = rmp_serde::from_slice(&encoded).unwrap();
        assert_eq!(envelope.id, 11);
        assert_eq!(envelope.msg_type, "invoke");
    }
}
