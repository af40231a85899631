//! Telephony platform interface: the consumed OS telephony API.
//!
//! Everything the facades need from the platform is expressed by the
//! [`TelephonyPlatform`] trait: attaching state listeners with an event
//! bitmask, and the synchronous telecom commands. Platform codes are
//! opaque integers; the string names for them live in
//! [`crate::events::translate`] and [`crate::facade`].
//!
//! [`sim::SimulatedPlatform`] is the in-process implementation used by
//! the daemon and the tests.

pub mod codes;
pub mod sim;

use std::ops::BitOr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use url::Url;

/// Platform errors. Propagated to RPC callers untranslated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("platform call {call} failed: {reason}")]
    Failed { call: &'static str, reason: String },
    #[error("platform does not support {0}")]
    Unsupported(&'static str),
}

/// Platform subscription identifier (selects a SIM / carrier profile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub i32);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitmask of platform event types a listener is attached for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventMask(u32);

impl EventMask {
    pub const SERVICE_STATE: EventMask = EventMask(0x0000_0001);
    pub const CALL_STATE: EventMask = EventMask(0x0000_0020);
    pub const DATA_CONNECTION_STATE: EventMask = EventMask(0x0000_0040);
    pub const PRECISE_CALL_STATE: EventMask = EventMask(0x0000_0800);
    pub const DATA_CONNECTION_REAL_TIME_INFO: EventMask = EventMask(0x0000_2000);

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

/// Platform-side identity of an attached listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-leg snapshot of a precise call state callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreciseCallState {
    pub foreground: i32,
    pub ringing: i32,
    pub background: i32,
    /// Precise disconnect cause; meaningful when a leg is disconnected.
    #[serde(default)]
    pub disconnect_cause: i32,
}

/// Service state callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    pub voice_reg_state: i32,
    #[serde(default)]
    pub operator_alpha_long: String,
    #[serde(default)]
    pub operator_numeric: String,
    #[serde(default)]
    pub manual_selection: bool,
    #[serde(default)]
    pub roaming: bool,
    #[serde(default)]
    pub emergency_only: bool,
}

/// A state payload delivered by the platform to an attached listener.
///
/// Tagged on `kind` on the wire so a harness can inject payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlatformPayload {
    CallState {
        state: i32,
        #[serde(default)]
        incoming_number: String,
    },
    PreciseCallState(PreciseCallState),
    DataConnectionRealTimeInfo {
        time: i64,
        power_state: i32,
    },
    DataConnectionState {
        state: i32,
    },
    ServiceState(ServiceState),
}

impl PlatformPayload {
    /// The platform event bit this payload is delivered under.
    pub fn event_mask(&self) -> EventMask {
        match self {
            PlatformPayload::CallState { .. } => EventMask::CALL_STATE,
            PlatformPayload::PreciseCallState(_) => EventMask::PRECISE_CALL_STATE,
            PlatformPayload::DataConnectionRealTimeInfo { .. } => {
                EventMask::DATA_CONNECTION_REAL_TIME_INFO
            }
            PlatformPayload::DataConnectionState { .. } => EventMask::DATA_CONNECTION_STATE,
            PlatformPayload::ServiceState(_) => EventMask::SERVICE_STATE,
        }
    }
}

/// Opaque phone account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneAccountHandle {
    pub id: String,
    pub component: String,
}

/// A registered phone account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneAccount {
    pub handle: PhoneAccountHandle,
    pub label: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<SubscriptionId>,
    #[serde(default)]
    pub capabilities: u32,
}

/// Receiver of platform state callbacks.
///
/// Invoked synchronously on the platform's callback thread.
pub trait PhoneStateCallback: Send + Sync {
    fn on_state(&self, payload: &PlatformPayload);
}

/// The consumed telephony platform.
///
/// All methods are synchronous and non-cancelable. Failures are
/// reported as [`PlatformError`] and propagated unchanged.
pub trait TelephonyPlatform: Send + Sync {
    // -- Listeners --

    /// Attach `callback` for the event types in `mask`. `sub_id` of
    /// `None` means the default subscription.
    fn listen(
        &self,
        id: ListenerId,
        sub_id: Option<SubscriptionId>,
        mask: EventMask,
        callback: Arc<dyn PhoneStateCallback>,
    ) -> Result<(), PlatformError>;

    /// Detach a listener. Unknown ids are ignored.
    fn unlisten(&self, id: ListenerId);

    fn default_voice_sub_id(&self) -> SubscriptionId;

    /// Deliver a synthetic state payload. Only test-harness platforms
    /// support this.
    fn inject_state(
        &self,
        _sub_id: Option<SubscriptionId>,
        _payload: PlatformPayload,
    ) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("inject_state"))
    }

    // -- Call control --

    fn accept_ringing_call(&self) -> Result<(), PlatformError>;
    fn end_call(&self) -> Result<bool, PlatformError>;
    fn silence_ringer(&self) -> Result<(), PlatformError>;
    fn cancel_missed_calls_notification(&self) -> Result<(), PlatformError>;
    fn show_in_call_screen(&self, show_dialpad: bool) -> Result<(), PlatformError>;
    fn call_state(&self) -> Result<i32, PlatformError>;
    fn current_tty_mode(&self) -> Result<i32, PlatformError>;
    fn is_in_call(&self) -> Result<bool, PlatformError>;
    fn is_ringing(&self) -> Result<bool, PlatformError>;
    fn handle_mmi(&self, dial_string: &str) -> Result<(), PlatformError>;

    // -- Dialing --

    fn place_call(&self, uri: &Url, video: bool) -> Result<(), PlatformError>;
    fn place_emergency_call(&self, uri: &Url) -> Result<(), PlatformError>;
    fn dial(&self, uri: &Url) -> Result<(), PlatformError>;
    /// Look up the phone number behind a contacts content URI.
    fn resolve_contact_number(&self, uri: &Url) -> Result<Option<String>, PlatformError>;

    // -- Accounts --

    fn all_phone_accounts(&self) -> Result<Vec<PhoneAccount>, PlatformError>;
    fn all_phone_account_handles(&self) -> Result<Vec<PhoneAccountHandle>, PlatformError>;
    fn call_capable_phone_accounts(&self) -> Result<Vec<PhoneAccountHandle>, PlatformError>;
    fn phone_account(
        &self,
        handle: &PhoneAccountHandle,
    ) -> Result<Option<PhoneAccount>, PlatformError>;
    fn subscription_id_for(&self, account: &PhoneAccount) -> Option<SubscriptionId>;
    fn clear_accounts(&self) -> Result<(), PlatformError>;
    fn set_user_selected_outgoing_phone_account(
        &self,
        handle: &PhoneAccountHandle,
    ) -> Result<(), PlatformError>;
    fn user_selected_outgoing_phone_account(
        &self,
    ) -> Result<Option<PhoneAccountHandle>, PlatformError>;
}
