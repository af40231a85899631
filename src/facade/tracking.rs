//! Listener commands: start/stop state tracking for a session.
//!
//! Each tracking command names a group of listener categories. Call
//! tracking attaches both the plain and the precise call listener so a
//! client sees ringing numbers and per-leg states together.

use crate::broker::registry::ListenerRegistry;
use crate::events::translate::{CallLeg, Category};
use crate::telephony::SubscriptionId;

use super::FacadeError;

pub const CALL: &[Category] = &[Category::CallState, Category::PreciseCallState];
pub const POWER: &[Category] = &[Category::DataConnectionRealTimeInfo];
pub const DATA: &[Category] = &[Category::DataConnectionState];
pub const SERVICE: &[Category] = &[Category::ServiceState];

/// Register every category in `group` for `sub_id`. Idempotent.
///
/// All or nothing: if one registration fails, listeners attached
/// earlier in the same call are detached again.
pub fn start(
    registry: &mut ListenerRegistry,
    group: &[Category],
    sub_id: Option<SubscriptionId>,
) -> Result<(), FacadeError> {
    let mut attached = Vec::with_capacity(group.len());
    for &category in group {
        let existed = registry.is_registered(category, sub_id);
        if let Err(e) = registry.register(category, sub_id) {
            for &category in &attached {
                registry.unregister(category, sub_id);
            }
            tracing::warn!(?category, ?sub_id, error = %e, "tracking not started");
            return Err(e.into());
        }
        if !existed {
            attached.push(category);
        }
    }
    Ok(())
}

/// Unregister every category in `group` for `sub_id`. Never fails.
pub fn stop(
    registry: &mut ListenerRegistry,
    group: &[Category],
    sub_id: Option<SubscriptionId>,
) -> Result<(), FacadeError> {
    for &category in group {
        registry.unregister(category, sub_id);
    }
    Ok(())
}

/// Enable or disable reporting of one precise call leg (`Foreground`,
/// `Ringing` or `Background`).
pub fn adjust_listen_level(
    registry: &mut ListenerRegistry,
    leg: &str,
    listen: bool,
    sub_id: Option<SubscriptionId>,
) -> Result<(), FacadeError> {
    let leg: CallLeg = leg.parse()?;
    registry.set_leg_interest(sub_id, leg, listen);
    tracing::debug!(leg = leg.name(), listen, ?sub_id, "precise call listen level adjusted");
    Ok(())
}
