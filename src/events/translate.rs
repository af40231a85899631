//! Event translation: platform state payloads to [`StateEvent`]s.
//!
//! One [`StateTranslator`] per listener [`Category`]. Each maps platform
//! codes through a static `(code, suffix)` table with a fallback entry:
//! an unrecognized code still yields an event, carrying the raw code in
//! the `UnknownStateCode` property. Translation never fails.

use std::str::FromStr;

use crate::telephony::codes::{
    call_state, data_state, dc_power_state, precise_call_state, service_state,
};
use crate::telephony::{EventMask, PlatformPayload, PreciseCallState, ServiceState};

use super::StateEvent;

/// Property carrying a raw platform code that had no table entry.
pub const UNKNOWN_STATE_CODE: &str = "UnknownStateCode";

type CodeTable = &'static [(i32, &'static str)];

const CALL_STATE_TABLE: CodeTable = &[
    (call_state::IDLE, "Idle"),
    (call_state::OFFHOOK, "Offhook"),
    (call_state::RINGING, "Ringing"),
];

const PRECISE_CALL_STATE_TABLE: CodeTable = &[
    (precise_call_state::ACTIVE, "Active"),
    (precise_call_state::HOLDING, "Holding"),
    (precise_call_state::DIALING, "Dialing"),
    (precise_call_state::ALERTING, "Alerting"),
    (precise_call_state::INCOMING, "Incoming"),
    (precise_call_state::WAITING, "Waiting"),
    (precise_call_state::DISCONNECTED, "Disconnected"),
    (precise_call_state::DISCONNECTING, "Disconnecting"),
    (precise_call_state::IDLE, "Idle"),
];

const POWER_LEVEL_TABLE: CodeTable = &[
    (dc_power_state::LOW, "Low"),
    (dc_power_state::HIGH, "High"),
    (dc_power_state::MEDIUM, "Medium"),
    (dc_power_state::UNKNOWN, "Unknown"),
];

const DATA_STATE_TABLE: CodeTable = &[
    (data_state::DISCONNECTED, "Disconnected"),
    (data_state::CONNECTING, "Connecting"),
    (data_state::CONNECTED, "Connected"),
    (data_state::SUSPENDED, "Suspended"),
    (data_state::UNKNOWN, "Unknown"),
];

const SERVICE_STATE_TABLE: CodeTable = &[
    (service_state::EMERGENCY_ONLY, "EmergencyOnly"),
    (service_state::IN_SERVICE, "InService"),
    (service_state::OUT_OF_SERVICE, "OutOfService"),
    (service_state::POWER_OFF, "PowerOff"),
];

fn lookup(table: CodeTable, code: i32) -> Option<&'static str> {
    table
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Build the event for `code`, falling back to `fallback` plus the raw
/// code when the table has no entry.
fn coded_event(prefix: &str, table: CodeTable, code: i32, fallback: &str) -> StateEvent {
    match lookup(table, code) {
        Some(suffix) => StateEvent::new(prefix, suffix),
        None => StateEvent::new(prefix, fallback).with(UNKNOWN_STATE_CODE, code),
    }
}

/// Listener category. One platform listener per category per
/// subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    CallState,
    PreciseCallState,
    DataConnectionRealTimeInfo,
    DataConnectionState,
    ServiceState,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::CallState,
        Category::PreciseCallState,
        Category::DataConnectionRealTimeInfo,
        Category::DataConnectionState,
        Category::ServiceState,
    ];

    /// Platform event types the category's listener is attached for.
    pub fn listen_mask(self) -> EventMask {
        match self {
            Category::CallState => EventMask::CALL_STATE,
            Category::PreciseCallState => EventMask::PRECISE_CALL_STATE,
            Category::DataConnectionRealTimeInfo => EventMask::DATA_CONNECTION_REAL_TIME_INFO,
            Category::DataConnectionState => EventMask::DATA_CONNECTION_STATE,
            Category::ServiceState => EventMask::SERVICE_STATE,
        }
    }

    /// Fixed prefix of every event name in this category.
    pub fn event_prefix(self) -> &'static str {
        match self {
            Category::CallState => "onCallStateChanged",
            Category::PreciseCallState => "onPreciseStateChanged",
            Category::DataConnectionRealTimeInfo => "onModemPowerLevelChanged",
            Category::DataConnectionState => "onDataConnectionStateChanged",
            Category::ServiceState => "onServiceStateChanged",
        }
    }

    pub fn translator(self) -> &'static dyn StateTranslator {
        match self {
            Category::CallState => &CallStateTranslator,
            Category::PreciseCallState => &PreciseCallStateTranslator,
            Category::DataConnectionRealTimeInfo => &PowerLevelTranslator,
            Category::DataConnectionState => &DataConnectionStateTranslator,
            Category::ServiceState => &ServiceStateTranslator,
        }
    }
}

/// One leg of a precise call state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallLeg {
    Foreground,
    Ringing,
    Background,
}

impl CallLeg {
    pub fn name(self) -> &'static str {
        match self {
            CallLeg::Foreground => "Foreground",
            CallLeg::Ringing => "Ringing",
            CallLeg::Background => "Background",
        }
    }

    fn bit(self) -> u8 {
        match self {
            CallLeg::Foreground => 0b001,
            CallLeg::Ringing => 0b010,
            CallLeg::Background => 0b100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown call leg: {0}")]
pub struct UnknownLeg(pub String);

impl FromStr for CallLeg {
    type Err = UnknownLeg;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Foreground" => Ok(CallLeg::Foreground),
            "Ringing" => Ok(CallLeg::Ringing),
            "Background" => Ok(CallLeg::Background),
            other => Err(UnknownLeg(other.to_string())),
        }
    }
}

/// Which precise call legs are reported.
///
/// Foreground is on by default; ringing and background are off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegInterest(u8);

impl Default for LegInterest {
    fn default() -> Self {
        LegInterest(CallLeg::Foreground.bit())
    }
}

impl LegInterest {
    pub fn none() -> Self {
        LegInterest(0)
    }

    pub fn enabled(self, leg: CallLeg) -> bool {
        self.0 & leg.bit() != 0
    }

    pub fn with(self, leg: CallLeg, enabled: bool) -> Self {
        if enabled {
            LegInterest(self.0 | leg.bit())
        } else {
            LegInterest(self.0 & !leg.bit())
        }
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        LegInterest(bits & 0b111)
    }
}

/// Per-category mapping from platform payload to events.
///
/// Payloads of another category translate to no events.
pub trait StateTranslator: Send + Sync {
    fn category(&self) -> Category;

    fn translate(&self, payload: &PlatformPayload, interest: LegInterest) -> Vec<StateEvent>;
}

/// Normalize an incoming number, US style.
///
/// `+` followed by 11 digits loses the `+`; a bare 10-character number
/// gains a leading `1`; every other length passes through unchanged.
pub fn normalize_incoming_number(number: &str) -> String {
    let len = number.chars().count();
    if len == 12 && number.starts_with('+') {
        number[1..].to_string()
    } else if len == 10 {
        format!("1{number}")
    } else {
        number.to_string()
    }
}

pub struct CallStateTranslator;

impl StateTranslator for CallStateTranslator {
    fn category(&self) -> Category {
        Category::CallState
    }

    fn translate(&self, payload: &PlatformPayload, _interest: LegInterest) -> Vec<StateEvent> {
        let PlatformPayload::CallState {
            state,
            incoming_number,
        } = payload
        else {
            return Vec::new();
        };
        let mut event = coded_event(
            Category::CallState.event_prefix(),
            CALL_STATE_TABLE,
            *state,
            "Unknown",
        );
        if !incoming_number.is_empty() {
            event = event.with("incomingNumber", normalize_incoming_number(incoming_number));
        }
        vec![event]
    }
}

pub struct PreciseCallStateTranslator;

impl PreciseCallStateTranslator {
    fn leg_event(leg: CallLeg, code: i32, state: &PreciseCallState) -> StateEvent {
        let prefix = Category::PreciseCallState.event_prefix();
        match lookup(PRECISE_CALL_STATE_TABLE, code) {
            Some(suffix) => {
                let event = StateEvent::new(prefix, suffix).with("Type", leg.name());
                if code == precise_call_state::DISCONNECTED {
                    event.with("Cause", state.disconnect_cause)
                } else {
                    event
                }
            }
            None => StateEvent::new(prefix, "Unknown")
                .with("Type", leg.name())
                .with(UNKNOWN_STATE_CODE, code),
        }
    }
}

impl StateTranslator for PreciseCallStateTranslator {
    fn category(&self) -> Category {
        Category::PreciseCallState
    }

    fn translate(&self, payload: &PlatformPayload, interest: LegInterest) -> Vec<StateEvent> {
        let PlatformPayload::PreciseCallState(state) = payload else {
            return Vec::new();
        };
        [
            (CallLeg::Foreground, state.foreground),
            (CallLeg::Ringing, state.ringing),
            (CallLeg::Background, state.background),
        ]
        .into_iter()
        .filter(|(leg, code)| interest.enabled(*leg) && *code != precise_call_state::NOT_VALID)
        .map(|(leg, code)| Self::leg_event(leg, code, state))
        .collect()
    }
}

pub struct PowerLevelTranslator;

impl StateTranslator for PowerLevelTranslator {
    fn category(&self) -> Category {
        Category::DataConnectionRealTimeInfo
    }

    fn translate(&self, payload: &PlatformPayload, _interest: LegInterest) -> Vec<StateEvent> {
        let PlatformPayload::DataConnectionRealTimeInfo { time, power_state } = payload else {
            return Vec::new();
        };
        let prefix = Category::DataConnectionRealTimeInfo.event_prefix();
        let suffix = lookup(POWER_LEVEL_TABLE, *power_state);
        let event = StateEvent::new(prefix, suffix.unwrap_or("Unknown"))
            .with("Type", "modemPowerLvl")
            .with("Time", *time);
        match suffix {
            Some(_) => vec![event],
            None => vec![event.with(UNKNOWN_STATE_CODE, *power_state)],
        }
    }
}

pub struct DataConnectionStateTranslator;

impl StateTranslator for DataConnectionStateTranslator {
    fn category(&self) -> Category {
        Category::DataConnectionState
    }

    fn translate(&self, payload: &PlatformPayload, _interest: LegInterest) -> Vec<StateEvent> {
        let PlatformPayload::DataConnectionState { state } = payload else {
            return Vec::new();
        };
        let prefix = Category::DataConnectionState.event_prefix();
        let event = match lookup(DATA_STATE_TABLE, *state) {
            Some(suffix) => StateEvent::new(prefix, suffix).with("Type", "DataConnectionState"),
            None => StateEvent::new(prefix, UNKNOWN_STATE_CODE)
                .with("Type", "DataConnectionState")
                .with(UNKNOWN_STATE_CODE, *state),
        };
        vec![event]
    }
}

pub struct ServiceStateTranslator;

impl ServiceStateTranslator {
    fn with_details(event: StateEvent, state: &ServiceState) -> StateEvent {
        event
            .with("OperatorName", state.operator_alpha_long.as_str())
            .with("OperatorId", state.operator_numeric.as_str())
            .with("ManualNwSelection", state.manual_selection)
            .with("Roaming", state.roaming)
            .with("isEmergencyOnly", state.emergency_only)
    }
}

impl StateTranslator for ServiceStateTranslator {
    fn category(&self) -> Category {
        Category::ServiceState
    }

    fn translate(&self, payload: &PlatformPayload, _interest: LegInterest) -> Vec<StateEvent> {
        let PlatformPayload::ServiceState(state) = payload else {
            return Vec::new();
        };
        let event = coded_event(
            Category::ServiceState.event_prefix(),
            SERVICE_STATE_TABLE,
            state.voice_reg_state,
            "Unknown",
        );
        vec![Self::with_details(event, state)]
    }
}
