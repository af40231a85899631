//! Command facade: telecom commands over the platform.
//!
//! [`TelecomFacade`] validates arguments, resolves accounts and URIs,
//! and maps platform codes to the scripting API's string constants.
//! Listener commands are in [`tracking`]; [`execute`] routes a decoded
//! [`Command`] to one or the other.
//!
//! Invalid URIs are logged and ignored (the command still succeeds).
//! Not-found failures carry the unmatched input verbatim.

pub mod tracking;

use std::sync::Arc;

use tracking::{CALL, DATA, POWER, SERVICE};

use url::Url;
use url::form_urlencoded;

use crate::broker::registry::ListenerRegistry;
use crate::events::translate::UnknownLeg;
use crate::ipc::protocol::Command;
use crate::telephony::codes::{call_state, tty_mode};
use crate::telephony::{
    PhoneAccount, PhoneAccountHandle, PlatformError, SubscriptionId, TelephonyPlatform,
};

/// Facade errors. The display string is what RPC callers see.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FacadeError {
    #[error("Failed to find a matching phoneAccountHandleId({0}).")]
    AccountNotFound(String),
    #[error("Failed to find a matching Phone Account for subscription ({0}).")]
    SubscriptionNotFound(SubscriptionId),
    #[error("no phone number found for contact {0}")]
    ContactNotFound(String),
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error(transparent)]
    UnknownLeg(#[from] UnknownLeg),
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Successful command result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Unit,
    Bool(bool),
    Text(String),
    Accounts(Vec<PhoneAccount>),
    Handles(Vec<PhoneAccountHandle>),
    Handle(Option<PhoneAccountHandle>),
}

/// Telecom command surface over a [`TelephonyPlatform`].
#[derive(Clone)]
pub struct TelecomFacade {
    platform: Arc<dyn TelephonyPlatform>,
}

impl TelecomFacade {
    pub fn new(platform: Arc<dyn TelephonyPlatform>) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &Arc<dyn TelephonyPlatform> {
        &self.platform
    }

    // -- Call control --

    pub fn accept_ringing_call(&self) -> Result<(), FacadeError> {
        Ok(self.platform.accept_ringing_call()?)
    }

    pub fn cancel_missed_calls_notification(&self) -> Result<(), FacadeError> {
        Ok(self.platform.cancel_missed_calls_notification()?)
    }

    pub fn clear_accounts(&self) -> Result<(), FacadeError> {
        Ok(self.platform.clear_accounts()?)
    }

    pub fn end_call(&self) -> Result<bool, FacadeError> {
        Ok(self.platform.end_call()?)
    }

    pub fn call_state(&self) -> Result<&'static str, FacadeError> {
        Ok(call_state_name(self.platform.call_state()?))
    }

    pub fn current_tty_mode(&self) -> Result<&'static str, FacadeError> {
        Ok(tty_mode_name(self.platform.current_tty_mode()?))
    }

    pub fn show_in_call_screen(&self, show_dialpad: bool) -> Result<(), FacadeError> {
        Ok(self.platform.show_in_call_screen(show_dialpad)?)
    }

    pub fn is_in_call(&self) -> Result<bool, FacadeError> {
        Ok(self.platform.is_in_call()?)
    }

    pub fn is_ringing(&self) -> Result<bool, FacadeError> {
        Ok(self.platform.is_ringing()?)
    }

    pub fn silence_ringer(&self) -> Result<(), FacadeError> {
        Ok(self.platform.silence_ringer()?)
    }

    pub fn handle_mmi(&self, dial_string: &str) -> Result<(), FacadeError> {
        require(dial_string, "dialString")?;
        Ok(self.platform.handle_mmi(dial_string)?)
    }

    pub fn swap_calls(&self) -> Result<(), FacadeError> {
        Err(FacadeError::Unimplemented("telecomSwapCalls"))
    }

    pub fn toggle_call_waiting(
        &self,
        sub_id: Option<SubscriptionId>,
        enabled: Option<bool>,
    ) -> Result<(), FacadeError> {
        let sub_id = sub_id.unwrap_or_else(|| self.platform.default_voice_sub_id());
        tracing::debug!(%sub_id, ?enabled, "call waiting toggle requested");
        Err(FacadeError::Unimplemented("toggleCallWaiting"))
    }

    // -- Accounts --

    pub fn all_phone_accounts(&self) -> Result<Vec<PhoneAccount>, FacadeError> {
        Ok(self.platform.all_phone_accounts()?)
    }

    /// Call-capable account handles, queried fresh each time.
    pub fn enabled_phone_accounts(&self) -> Result<Vec<PhoneAccountHandle>, FacadeError> {
        Ok(self.platform.call_capable_phone_accounts()?)
    }

    pub fn user_selected_outgoing_phone_account(
        &self,
    ) -> Result<Option<PhoneAccountHandle>, FacadeError> {
        Ok(self.platform.user_selected_outgoing_phone_account()?)
    }

    /// Select the outgoing account whose handle id is `handle_id`.
    pub fn set_user_selected_outgoing_phone_account(
        &self,
        handle_id: &str,
    ) -> Result<(), FacadeError> {
        require(handle_id, "phoneAccountHandleId")?;
        let handles = self.platform.all_phone_account_handles()?;
        let Some(handle) = handles.into_iter().find(|h| h.id == handle_id) else {
            tracing::debug!(handle_id, "no phone account handle matches");
            return Err(FacadeError::AccountNotFound(handle_id.to_string()));
        };
        self.platform
            .set_user_selected_outgoing_phone_account(&handle)?;
        tracing::info!(handle_id, "outgoing phone account selected");
        Ok(())
    }

    /// Select the first call-capable account bound to `sub_id`.
    pub fn set_user_selected_outgoing_phone_account_by_sub_id(
        &self,
        sub_id: SubscriptionId,
    ) -> Result<(), FacadeError> {
        for handle in self.platform.call_capable_phone_accounts()? {
            let Some(account) = self.platform.phone_account(&handle)? else {
                continue;
            };
            if self.platform.subscription_id_for(&account) == Some(sub_id) {
                self.platform
                    .set_user_selected_outgoing_phone_account(&handle)?;
                tracing::info!(%sub_id, handle_id = %handle.id, "outgoing phone account selected");
                return Ok(());
            }
        }
        tracing::debug!(%sub_id, "no phone account for subscription");
        Err(FacadeError::SubscriptionNotFound(sub_id))
    }

    // -- Dialing --

    /// Route a generic URI by scheme: `content:` to contact resolution,
    /// `tel:` straight to the tel path, anything else as a bare number.
    pub fn call(&self, uri_string: &str, video_call: bool) -> Result<(), FacadeError> {
        tracing::warn!("telecomCall is deprecated; use a URI-specific call");
        require(uri_string, "uriString")?;
        match Url::parse(uri_string) {
            Ok(uri) if uri.scheme() == "content" => self.call_content_uri(uri_string, video_call),
            Ok(uri) if uri.scheme() == "tel" => self.call_tel_uri(uri_string, video_call),
            _ => self.call_number(uri_string, video_call),
        }
    }

    /// Resolve a contact URI to its number and call it.
    pub fn call_content_uri(&self, uri_string: &str, video_call: bool) -> Result<(), FacadeError> {
        require(uri_string, "uriString")?;
        let uri = match Url::parse(uri_string) {
            Ok(uri) if uri.scheme() == "content" => uri,
            _ => {
                tracing::error!(uri = uri_string, "invalid content URI");
                return Ok(());
            }
        };
        match self.platform.resolve_contact_number(&uri)? {
            Some(number) if !number.is_empty() => self.call_number(&number, video_call),
            _ => Err(FacadeError::ContactNotFound(uri_string.to_string())),
        }
    }

    pub fn call_number(&self, number: &str, video_call: bool) -> Result<(), FacadeError> {
        require(number, "number")?;
        self.call_tel_uri(&tel_uri(number), video_call)
    }

    pub fn call_tel_uri(&self, uri_string: &str, video_call: bool) -> Result<(), FacadeError> {
        require(uri_string, "uriString")?;
        if !uri_string.starts_with("tel:") {
            tracing::warn!(uri = uri_string, "invalid tel URI");
            return Ok(());
        }
        let uri = match Url::parse(uri_string) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(uri = uri_string, error = %e, "invalid tel URI");
                return Ok(());
            }
        };
        if video_call {
            tracing::debug!("placing a bi-directional video call");
        }
        Ok(self.platform.place_call(&uri, video_call)?)
    }

    pub fn call_emergency_number(&self, number: &str) -> Result<(), FacadeError> {
        require(number, "number")?;
        let uri_string = tel_uri(number);
        let uri = match Url::parse(&uri_string) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(uri = %uri_string, error = %e, "invalid emergency number URI");
                return Ok(());
            }
        };
        Ok(self.platform.place_emergency_call(&uri)?)
    }

    pub fn dial(&self, uri_string: &str) -> Result<(), FacadeError> {
        require(uri_string, "uri")?;
        let uri = match Url::parse(uri_string) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(uri = uri_string, error = %e, "invalid dial URI");
                return Ok(());
            }
        };
        Ok(self.platform.dial(&uri)?)
    }

    pub fn dial_number(&self, number: &str) -> Result<(), FacadeError> {
        require(number, "number")?;
        self.dial(&tel_uri(number))
    }
}

/// Run one command against the facade or the session's listener registry.
pub fn execute(
    facade: &TelecomFacade,
    registry: &mut ListenerRegistry,
    call: Command,
) -> Result<Reply, FacadeError> {
    let unit = |r: Result<(), FacadeError>| r.map(|()| Reply::Unit);
    match call {
        Command::AcceptRingingCall => unit(facade.accept_ringing_call()),
        Command::CancelMissedCallsNotification => unit(facade.cancel_missed_calls_notification()),
        Command::ClearAccounts => unit(facade.clear_accounts()),
        Command::EndCall => facade.end_call().map(Reply::Bool),
        Command::GetAllPhoneAccounts => facade.all_phone_accounts().map(Reply::Accounts),
        Command::GetCallState => facade.call_state().map(|s| Reply::Text(s.into())),
        Command::GetCurrentTtyMode => facade.current_tty_mode().map(|s| Reply::Text(s.into())),
        Command::ShowInCallScreen { show_dialpad } => {
            unit(facade.show_in_call_screen(show_dialpad))
        }
        Command::GetEnabledPhoneAccounts => facade.enabled_phone_accounts().map(Reply::Handles),
        Command::SetUserSelectedOutgoingPhoneAccount {
            phone_account_handle_id,
        } => unit(facade.set_user_selected_outgoing_phone_account(&phone_account_handle_id)),
        Command::GetUserSelectedOutgoingPhoneAccount => facade
            .user_selected_outgoing_phone_account()
            .map(Reply::Handle),
        Command::SetUserSelectedOutgoingPhoneAccountBySubId { sub_id } => {
            unit(facade.set_user_selected_outgoing_phone_account_by_sub_id(sub_id))
        }
        Command::IsInCall => facade.is_in_call().map(Reply::Bool),
        Command::IsRinging => facade.is_ringing().map(Reply::Bool),
        Command::SilenceRinger => unit(facade.silence_ringer()),
        Command::SwapCalls => unit(facade.swap_calls()),
        Command::ToggleCallWaiting { enabled } => unit(facade.toggle_call_waiting(None, enabled)),
        Command::ToggleCallWaitingForSubscription { sub_id, enabled } => {
            unit(facade.toggle_call_waiting(sub_id, enabled))
        }
        Command::HandleMmi { dial_string } => unit(facade.handle_mmi(&dial_string)),

        Command::Call {
            uri_string,
            video_call,
        } => unit(facade.call(&uri_string, video_call)),
        Command::CallContentUri {
            uri_string,
            video_call,
        } => unit(facade.call_content_uri(&uri_string, video_call)),
        Command::CallNumber { number, video_call } => unit(facade.call_number(&number, video_call)),
        Command::CallTelUri {
            uri_string,
            video_call,
        } => unit(facade.call_tel_uri(&uri_string, video_call)),
        Command::CallEmergencyNumber { number } => unit(facade.call_emergency_number(&number)),
        Command::Dial { uri } => unit(facade.dial(&uri)),
        Command::DialNumber { number } => unit(facade.dial_number(&number)),

        Command::StartTrackingCallState => unit(tracking::start(registry, CALL, None)),
        Command::StartTrackingCallStateForSubscription { sub_id } => {
            unit(tracking::start(registry, CALL, Some(sub_id)))
        }
        Command::StopTrackingCallStateChange => unit(tracking::stop(registry, CALL, None)),
        Command::StopTrackingCallStateChangeForSubscription { sub_id } => {
            unit(tracking::stop(registry, CALL, Some(sub_id)))
        }
        Command::AdjustPreciseCallStateListenLevel { leg, listen } => {
            unit(tracking::adjust_listen_level(registry, &leg, listen, None))
        }
        Command::AdjustPreciseCallStateListenLevelForSubscription {
            leg,
            listen,
            sub_id,
        } => unit(tracking::adjust_listen_level(
            registry,
            &leg,
            listen,
            Some(sub_id),
        )),
        Command::StartTrackingDataConnectionRTInfo => {
            unit(tracking::start(registry, POWER, None))
        }
        Command::StartTrackingDataConnectionRTInfoForSubscription { sub_id } => {
            unit(tracking::start(registry, POWER, Some(sub_id)))
        }
        Command::StopTrackingDataConnectionRTInfo => unit(tracking::stop(registry, POWER, None)),
        Command::StopTrackingDataConnectionRTInfoForSubscription { sub_id } => {
            unit(tracking::stop(registry, POWER, Some(sub_id)))
        }
        Command::StartTrackingDataConnectionStateChange => {
            unit(tracking::start(registry, DATA, None))
        }
        Command::StartTrackingDataConnectionStateChangeForSubscription { sub_id } => {
            unit(tracking::start(registry, DATA, Some(sub_id)))
        }
        Command::StopTrackingDataConnectionStateChange => {
            unit(tracking::stop(registry, DATA, None))
        }
        Command::StopTrackingDataConnectionStateChangeForSubscription { sub_id } => {
            unit(tracking::stop(registry, DATA, Some(sub_id)))
        }
        Command::StartTrackingServiceStateChange => unit(tracking::start(registry, SERVICE, None)),
        Command::StartTrackingServiceStateChangeForSubscription { sub_id } => {
            unit(tracking::start(registry, SERVICE, Some(sub_id)))
        }
        Command::StopTrackingServiceStateChange => unit(tracking::stop(registry, SERVICE, None)),
        Command::StopTrackingServiceStateChangeForSubscription { sub_id } => {
            unit(tracking::stop(registry, SERVICE, Some(sub_id)))
        }
    }
}

/// `tel:` URI for a bare number, form-encoded in ASCII: characters
/// outside ASCII become `?` before encoding, so they appear as `%3F`.
pub fn tel_uri(number: &str) -> String {
    let ascii: String = number
        .chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect();
    let encoded: String = form_urlencoded::byte_serialize(ascii.as_bytes()).collect();
    format!("tel:{encoded}")
}

pub fn call_state_name(code: i32) -> &'static str {
    match code {
        call_state::IDLE => "IDLE",
        call_state::RINGING => "RINGING",
        call_state::OFFHOOK => "OFFHOOK",
        _ => "UNKNOWN",
    }
}

pub fn tty_mode_name(code: i32) -> &'static str {
    match code {
        tty_mode::OFF => "TTY_MODE_OFF",
        tty_mode::FULL => "TTY_MODE_FULL",
        tty_mode::HCO => "TTY_MODE_HCO",
        tty_mode::VCO => "TTY_MODE_VCO",
        _ => "TTY_MODE_UNKNOWN",
    }
}

fn require(value: &str, name: &'static str) -> Result<(), FacadeError> {
    if value.is_empty() {
        Err(FacadeError::MissingParameter(name))
    } else {
        Ok(())
    }
}
