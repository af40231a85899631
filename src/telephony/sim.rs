//! Simulated telephony platform: in-memory model for the daemon and tests.
//!
//! Holds call state, TTY mode, phone accounts, the user-selected
//! outgoing account, contacts and a log of dialing actions. A harness
//! drives it through [`TelephonyPlatform::inject_state`]: the payload
//! updates the model and is delivered synchronously to every attached
//! listener whose mask and subscription match, in attachment order.
//! Tests can make named platform calls fail to exercise error paths.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use super::codes::{account_capability, call_state, tty_mode};
use super::{
    EventMask, ListenerId, PhoneAccount, PhoneAccountHandle, PhoneStateCallback, PlatformError,
    PlatformPayload, SubscriptionId, TelephonyPlatform,
};

/// Component name used for simulated SIM accounts.
pub const SIM_COMPONENT: &str = "com.android.phone/com.android.services.telephony.TelephonyConnectionService";

/// A side effect requested through the platform, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformAction {
    PlaceCall { uri: String, video: bool },
    EmergencyCall { uri: String },
    Dial { uri: String },
    HandleMmi { dial_string: String },
    AcceptRingingCall,
    EndCall,
    CancelMissedCallsNotification,
    SilenceRinger,
    ShowInCallScreen { show_dialpad: bool },
}

struct Attached {
    id: ListenerId,
    sub_id: Option<SubscriptionId>,
    mask: EventMask,
    callback: Arc<dyn PhoneStateCallback>,
}

struct SimState {
    listeners: Vec<Attached>,
    default_sub_id: SubscriptionId,
    call_state: i32,
    tty_mode: i32,
    accounts: Vec<PhoneAccount>,
    user_selected: Option<PhoneAccountHandle>,
    contacts: HashMap<String, String>,
    actions: Vec<PlatformAction>,
    /// Platform call name to the reason it fails with.
    failing_calls: HashMap<&'static str, String>,
    /// Listener masks that `listen` refuses to attach.
    refused_masks: Vec<EventMask>,
}

/// In-memory [`TelephonyPlatform`].
pub struct SimulatedPlatform {
    state: Mutex<SimState>,
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new(SubscriptionId(1))
    }
}

impl SimulatedPlatform {
    /// Create an idle platform with no accounts.
    pub fn new(default_sub_id: SubscriptionId) -> Self {
        Self {
            state: Mutex::new(SimState {
                listeners: Vec::new(),
                default_sub_id,
                call_state: call_state::IDLE,
                tty_mode: tty_mode::OFF,
                accounts: Vec::new(),
                user_selected: None,
                contacts: HashMap::new(),
                actions: Vec::new(),
                failing_calls: HashMap::new(),
                refused_masks: Vec::new(),
            }),
        }
    }

    /// Create a platform seeded with `count` SIM accounts, subscription
    /// ids `1..=count`.
    pub fn with_sim_accounts(count: u16, default_sub_id: SubscriptionId) -> Self {
        let platform = Self::new(default_sub_id);
        for n in 1..=count {
            platform.add_account(sim_account(i32::from(n)));
        }
        platform
    }

    /// Seed contact lookups from `(content URI, number)` pairs.
    pub fn with_contacts(self, contacts: &[(String, String)]) -> Self {
        for (uri, number) in contacts {
            self.add_contact(uri, number);
        }
        self
    }

    pub fn add_account(&self, account: PhoneAccount) {
        self.state.lock().accounts.push(account);
    }

    pub fn add_contact(&self, content_uri: &str, number: &str) {
        self.state
            .lock()
            .contacts
            .insert(content_uri.to_string(), number.to_string());
    }

    #[cfg(test)]
    pub fn set_tty_mode(&self, mode: i32) {
        self.state.lock().tty_mode = mode;
    }

    /// Make every later `call` (a platform method name such as
    /// `"end_call"`) fail with `reason`.
    #[cfg(test)]
    pub fn fail_call(&self, call: &'static str, reason: &str) {
        self.state
            .lock()
            .failing_calls
            .insert(call, reason.to_string());
    }

    /// Make `listen` refuse masks that include `mask`.
    #[cfg(test)]
    pub fn refuse_listen(&self, mask: EventMask) {
        self.state.lock().refused_masks.push(mask);
    }

    /// Every action requested so far, oldest first.
    #[cfg(test)]
    pub fn actions(&self) -> Vec<PlatformAction> {
        self.state.lock().actions.clone()
    }

    /// Number of attached listeners.
    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    fn check(&self, call: &'static str) -> Result<(), PlatformError> {
        match self.state.lock().failing_calls.get(call) {
            Some(reason) => Err(PlatformError::Failed {
                call,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn record(&self, call: &'static str, action: PlatformAction) -> Result<(), PlatformError> {
        self.check(call)?;
        tracing::debug!(?action, "simulated platform action");
        self.state.lock().actions.push(action);
        Ok(())
    }
}

/// A SIM-backed account for subscription `sub_id`.
pub fn sim_account(sub_id: i32) -> PhoneAccount {
    PhoneAccount {
        handle: PhoneAccountHandle {
            id: format!("sim-{sub_id}"),
            component: SIM_COMPONENT.to_string(),
        },
        label: format!("SIM {sub_id}"),
        address: None,
        subscription_id: Some(SubscriptionId(sub_id)),
        capabilities: account_capability::CALL_PROVIDER | account_capability::SIM_SUBSCRIPTION,
    }
}

impl TelephonyPlatform for SimulatedPlatform {
    fn listen(
        &self,
        id: ListenerId,
        sub_id: Option<SubscriptionId>,
        mask: EventMask,
        callback: Arc<dyn PhoneStateCallback>,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        if state.refused_masks.iter().any(|&refused| mask.contains(refused)) {
            return Err(PlatformError::Failed {
                call: "listen",
                reason: format!("mask {:#x} refused", mask.bits()),
            });
        }
        state.listeners.retain(|l| l.id != id);
        state.listeners.push(Attached {
            id,
            sub_id,
            mask,
            callback,
        });
        Ok(())
    }

    fn unlisten(&self, id: ListenerId) {
        self.state.lock().listeners.retain(|l| l.id != id);
    }

    fn default_voice_sub_id(&self) -> SubscriptionId {
        self.state.lock().default_sub_id
    }

    fn inject_state(
        &self,
        sub_id: Option<SubscriptionId>,
        payload: PlatformPayload,
    ) -> Result<(), PlatformError> {
        // Collect targets under the lock, deliver outside it: callbacks
        // may call back into the platform.
        let targets: Vec<Arc<dyn PhoneStateCallback>> = {
            let mut state = self.state.lock();
            if let PlatformPayload::CallState { state: code, .. } = &payload {
                state.call_state = *code;
            }
            let target_sub = sub_id.unwrap_or(state.default_sub_id);
            let bit = payload.event_mask();
            state
                .listeners
                .iter()
                .filter(|l| l.mask.contains(bit))
                .filter(|l| l.sub_id.unwrap_or(state.default_sub_id) == target_sub)
                .map(|l| Arc::clone(&l.callback))
                .collect()
        };
        tracing::debug!(
            listeners = targets.len(),
            kind = ?payload.event_mask(),
            "delivering injected state"
        );
        for callback in targets {
            callback.on_state(&payload);
        }
        Ok(())
    }

    fn accept_ringing_call(&self) -> Result<(), PlatformError> {
        self.check("accept_ringing_call")?;
        let mut state = self.state.lock();
        if state.call_state == call_state::RINGING {
            state.call_state = call_state::OFFHOOK;
        }
        state.actions.push(PlatformAction::AcceptRingingCall);
        Ok(())
    }

    fn end_call(&self) -> Result<bool, PlatformError> {
        self.check("end_call")?;
        let mut state = self.state.lock();
        let ended = state.call_state != call_state::IDLE;
        state.call_state = call_state::IDLE;
        state.actions.push(PlatformAction::EndCall);
        Ok(ended)
    }

    fn silence_ringer(&self) -> Result<(), PlatformError> {
        self.record("silence_ringer", PlatformAction::SilenceRinger)
    }

    fn cancel_missed_calls_notification(&self) -> Result<(), PlatformError> {
        self.record(
            "cancel_missed_calls_notification",
            PlatformAction::CancelMissedCallsNotification,
        )
    }

    fn show_in_call_screen(&self, show_dialpad: bool) -> Result<(), PlatformError> {
        self.record(
            "show_in_call_screen",
            PlatformAction::ShowInCallScreen { show_dialpad },
        )
    }

    fn call_state(&self) -> Result<i32, PlatformError> {
        self.check("call_state")?;
        Ok(self.state.lock().call_state)
    }

    fn current_tty_mode(&self) -> Result<i32, PlatformError> {
        Ok(self.state.lock().tty_mode)
    }

    fn is_in_call(&self) -> Result<bool, PlatformError> {
        Ok(self.state.lock().call_state != call_state::IDLE)
    }

    fn is_ringing(&self) -> Result<bool, PlatformError> {
        Ok(self.state.lock().call_state == call_state::RINGING)
    }

    fn handle_mmi(&self, dial_string: &str) -> Result<(), PlatformError> {
        self.record(
            "handle_mmi",
            PlatformAction::HandleMmi {
                dial_string: dial_string.to_string(),
            },
        )
    }

    fn place_call(&self, uri: &Url, video: bool) -> Result<(), PlatformError> {
        self.record(
            "place_call",
            PlatformAction::PlaceCall {
                uri: uri.to_string(),
                video,
            },
        )
    }

    fn place_emergency_call(&self, uri: &Url) -> Result<(), PlatformError> {
        self.record(
            "place_emergency_call",
            PlatformAction::EmergencyCall {
                uri: uri.to_string(),
            },
        )
    }

    fn dial(&self, uri: &Url) -> Result<(), PlatformError> {
        self.record(
            "dial",
            PlatformAction::Dial {
                uri: uri.to_string(),
            },
        )
    }

    fn resolve_contact_number(&self, uri: &Url) -> Result<Option<String>, PlatformError> {
        Ok(self.state.lock().contacts.get(uri.as_str()).cloned())
    }

    fn all_phone_accounts(&self) -> Result<Vec<PhoneAccount>, PlatformError> {
        Ok(self.state.lock().accounts.clone())
    }

    fn all_phone_account_handles(&self) -> Result<Vec<PhoneAccountHandle>, PlatformError> {
        Ok(self
            .state
            .lock()
            .accounts
            .iter()
            .map(|a| a.handle.clone())
            .collect())
    }

    fn call_capable_phone_accounts(&self) -> Result<Vec<PhoneAccountHandle>, PlatformError> {
        Ok(self
            .state
            .lock()
            .accounts
            .iter()
            .filter(|a| a.capabilities & account_capability::CALL_PROVIDER != 0)
            .map(|a| a.handle.clone())
            .collect())
    }

    fn phone_account(
        &self,
        handle: &PhoneAccountHandle,
    ) -> Result<Option<PhoneAccount>, PlatformError> {
        Ok(self
            .state
            .lock()
            .accounts
            .iter()
            .find(|a| &a.handle == handle)
            .cloned())
    }

    fn subscription_id_for(&self, account: &PhoneAccount) -> Option<SubscriptionId> {
        account.subscription_id
    }

    fn clear_accounts(&self) -> Result<(), PlatformError> {
        self.check("clear_accounts")?;
        let mut state = self.state.lock();
        state.accounts.clear();
        state.user_selected = None;
        Ok(())
    }

    fn set_user_selected_outgoing_phone_account(
        &self,
        handle: &PhoneAccountHandle,
    ) -> Result<(), PlatformError> {
        self.check("set_user_selected_outgoing_phone_account")?;
        self.state.lock().user_selected = Some(handle.clone());
        Ok(())
    }

    fn user_selected_outgoing_phone_account(
        &self,
    ) -> Result<Option<PhoneAccountHandle>, PlatformError> {
        Ok(self.state.lock().user_selected.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter(Mutex<Vec<PlatformPayload>>);

    impl PhoneStateCallback for Counter {
        fn on_state(&self, payload: &PlatformPayload) {
            self.0.lock().push(payload.clone());
        }
    }

    fn data(state: i32) -> PlatformPayload {
        PlatformPayload::DataConnectionState { state }
    }

    #[test]
    fn delivers_only_to_matching_mask() {
        let p = SimulatedPlatform::default();
        let data_cb = Arc::new(Counter::default());
        let svc_cb = Arc::new(Counter::default());
        p.listen(ListenerId::new(), None, EventMask::DATA_CONNECTION_STATE, data_cb.clone())
            .unwrap();
        p.listen(ListenerId::new(), None, EventMask::SERVICE_STATE, svc_cb.clone())
            .unwrap();

        p.inject_state(None, data(2)).unwrap();
        assert_eq!(data_cb.0.lock().len(), 1);
        assert!(svc_cb.0.lock().is_empty());
    }

    #[test]
    fn delivers_only_to_matching_subscription() {
        let p = SimulatedPlatform::new(SubscriptionId(1));
        let default_cb = Arc::new(Counter::default());
        let sub2_cb = Arc::new(Counter::default());
        p.listen(ListenerId::new(), None, EventMask::DATA_CONNECTION_STATE, default_cb.clone())
            .unwrap();
        p.listen(
            ListenerId::new(),
            Some(SubscriptionId(2)),
            EventMask::DATA_CONNECTION_STATE,
            sub2_cb.clone(),
        )
        .unwrap();

        p.inject_state(Some(SubscriptionId(2)), data(1)).unwrap();
        assert!(default_cb.0.lock().is_empty());
        assert_eq!(sub2_cb.0.lock().len(), 1);

        // Explicit default subscription reaches the unscoped listener.
        p.inject_state(Some(SubscriptionId(1)), data(1)).unwrap();
        assert_eq!(default_cb.0.lock().len(), 1);
    }

    #[test]
    fn relisten_same_id_replaces() {
        let p = SimulatedPlatform::default();
        let cb = Arc::new(Counter::default());
        let id = ListenerId::new();
        p.listen(id, None, EventMask::DATA_CONNECTION_STATE, cb.clone())
            .unwrap();
        p.listen(id, None, EventMask::DATA_CONNECTION_STATE, cb.clone())
            .unwrap();
        assert_eq!(p.listener_count(), 1);
        p.inject_state(None, data(0)).unwrap();
        assert_eq!(cb.0.lock().len(), 1);
    }

    #[test]
    fn unlisten_unknown_is_ignored() {
        let p = SimulatedPlatform::default();
        p.unlisten(ListenerId::new());
        assert_eq!(p.listener_count(), 0);
    }

    #[test]
    fn injected_call_state_updates_model() {
        let p = SimulatedPlatform::default();
        p.inject_state(
            None,
            PlatformPayload::CallState {
                state: call_state::RINGING,
                incoming_number: String::new(),
            },
        )
        .unwrap();
        assert!(p.is_ringing().unwrap());
        assert!(p.is_in_call().unwrap());
        p.accept_ringing_call().unwrap();
        assert_eq!(p.call_state().unwrap(), call_state::OFFHOOK);
        assert!(p.end_call().unwrap());
        assert!(!p.end_call().unwrap());
    }

    #[test]
    fn failing_call_reports_reason_and_records_nothing() {
        let p = SimulatedPlatform::default();
        p.fail_call("silence_ringer", "ringer service unavailable");
        assert_eq!(
            p.silence_ringer(),
            Err(PlatformError::Failed {
                call: "silence_ringer",
                reason: "ringer service unavailable".into(),
            })
        );
        assert!(p.actions().is_empty());
        p.cancel_missed_calls_notification().unwrap();
        assert_eq!(p.actions(), vec![PlatformAction::CancelMissedCallsNotification]);
    }

    #[test]
    fn refused_mask_is_not_attached() {
        let p = SimulatedPlatform::default();
        p.refuse_listen(EventMask::PRECISE_CALL_STATE);
        let cb = Arc::new(Counter::default());
        assert!(
            p.listen(ListenerId::new(), None, EventMask::PRECISE_CALL_STATE, cb.clone())
                .is_err()
        );
        p.listen(ListenerId::new(), None, EventMask::CALL_STATE, cb)
            .unwrap();
        assert_eq!(p.listener_count(), 1);
    }

    #[test]
    fn sim_accounts_seeded() {
        let p = SimulatedPlatform::with_sim_accounts(2, SubscriptionId(1));
        let handles = p.call_capable_phone_accounts().unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[1].id, "sim-2");
        let account = p.phone_account(&handles[1]).unwrap().unwrap();
        assert_eq!(p.subscription_id_for(&account), Some(SubscriptionId(2)));
    }

    #[test]
    fn clear_accounts_resets_selection() {
        let p = SimulatedPlatform::with_sim_accounts(1, SubscriptionId(1));
        let handle = p.all_phone_account_handles().unwrap().remove(0);
        p.set_user_selected_outgoing_phone_account(&handle).unwrap();
        p.clear_accounts().unwrap();
        assert!(p.all_phone_accounts().unwrap().is_empty());
        assert_eq!(p.user_selected_outgoing_phone_account().unwrap(), None);
    }
}
