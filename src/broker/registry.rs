//! Listener registry: per-session platform state listeners.
//!
//! One [`StateListener`] per `(category, subscription)` pair. Each is
//! attached to the platform with its category's event mask and forwards
//! translated events to the session's [`EventSink`], synchronously on
//! the platform's callback thread.
//!
//! Keys use the resolved subscription, so "no subscription" and the
//! platform default name the same listener. Registration is idempotent:
//! registering an existing key replaces its leg interest in place and
//! does not attach a second platform listener.
//! Unregistering an unknown key is a no-op. Dropping the registry
//! detaches everything it attached.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::events::EventSink;
use crate::events::translate::{CallLeg, Category, LegInterest};
use crate::telephony::{
    ListenerId, PhoneStateCallback, PlatformError, PlatformPayload, SubscriptionId,
    TelephonyPlatform,
};

/// Registry key, always on a concrete subscription.
pub type ListenerKey = (Category, SubscriptionId);

/// A platform listener bound to one category and one sink.
///
/// Leg interest is written by the owning registry only; callbacks read
/// it. Adjusting interest while a callback for the same listener is in
/// flight may or may not affect that callback.
pub struct StateListener {
    category: Category,
    interest: AtomicU8,
    sink: Arc<dyn EventSink>,
}

impl StateListener {
    fn new(category: Category, interest: LegInterest, sink: Arc<dyn EventSink>) -> Self {
        Self {
            category,
            interest: AtomicU8::new(interest.bits()),
            sink,
        }
    }

    pub fn interest(&self) -> LegInterest {
        LegInterest::from_bits(self.interest.load(Ordering::Acquire))
    }

    fn set_interest(&self, interest: LegInterest) {
        self.interest.store(interest.bits(), Ordering::Release);
    }
}

impl PhoneStateCallback for StateListener {
    fn on_state(&self, payload: &PlatformPayload) {
        let events = self
            .category
            .translator()
            .translate(payload, self.interest());
        for event in events {
            tracing::debug!(name = %event.name, "posting state event");
            self.sink.post_event(event);
        }
    }
}

struct Registration {
    platform_id: ListenerId,
    listener: Arc<StateListener>,
}

/// Listener registry for one client session.
pub struct ListenerRegistry {
    platform: Arc<dyn TelephonyPlatform>,
    sink: Arc<dyn EventSink>,
    entries: HashMap<ListenerKey, Registration>,
    /// Precise-call leg interest per subscription, applied to current
    /// and future precise-call listeners.
    leg_interest: HashMap<SubscriptionId, LegInterest>,
}

impl ListenerRegistry {
    pub fn new(platform: Arc<dyn TelephonyPlatform>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            platform,
            sink,
            entries: HashMap::new(),
            leg_interest: HashMap::new(),
        }
    }

    /// `sub_id`, or the platform default subscription when absent.
    fn resolve(&self, sub_id: Option<SubscriptionId>) -> SubscriptionId {
        sub_id.unwrap_or_else(|| self.platform.default_voice_sub_id())
    }

    /// Register a listener for `category` on `sub_id`.
    ///
    /// Precise-call listeners pick up the subscription's current leg
    /// interest. Re-registering an existing key only refreshes that
    /// interest.
    pub fn register(
        &mut self,
        category: Category,
        sub_id: Option<SubscriptionId>,
    ) -> Result<(), PlatformError> {
        let sub_id = self.resolve(sub_id);
        let interest = self.leg_interest(Some(sub_id));
        if let Some(existing) = self.entries.get(&(category, sub_id)) {
            existing.listener.set_interest(interest);
            tracing::debug!(?category, ?sub_id, "listener already registered");
            return Ok(());
        }

        let listener = Arc::new(StateListener::new(
            category,
            interest,
            Arc::clone(&self.sink),
        ));
        let platform_id = ListenerId::new();
        self.platform.listen(
            platform_id,
            Some(sub_id),
            category.listen_mask(),
            Arc::clone(&listener) as Arc<dyn PhoneStateCallback>,
        )?;
        self.entries.insert(
            (category, sub_id),
            Registration {
                platform_id,
                listener,
            },
        );
        tracing::debug!(
            ?category,
            ?sub_id,
            mask = category.listen_mask().bits(),
            "listener registered"
        );
        Ok(())
    }

    /// Detach the listener for `category` on `sub_id`, if any.
    pub fn unregister(&mut self, category: Category, sub_id: Option<SubscriptionId>) {
        let sub_id = self.resolve(sub_id);
        if let Some(reg) = self.entries.remove(&(category, sub_id)) {
            self.platform.unlisten(reg.platform_id);
            tracing::debug!(?category, ?sub_id, "listener unregistered");
        }
    }

    /// Detach every listener.
    pub fn unregister_all(&mut self) {
        for (_, reg) in self.entries.drain() {
            self.platform.unlisten(reg.platform_id);
        }
    }

    /// Current precise-call leg interest for `sub_id`.
    pub fn leg_interest(&self, sub_id: Option<SubscriptionId>) -> LegInterest {
        self.leg_interest
            .get(&self.resolve(sub_id))
            .copied()
            .unwrap_or_default()
    }

    /// Enable or disable reporting of one precise-call leg.
    pub fn set_leg_interest(
        &mut self,
        sub_id: Option<SubscriptionId>,
        leg: CallLeg,
        enabled: bool,
    ) {
        let sub_id = self.resolve(sub_id);
        let interest = self.leg_interest(Some(sub_id)).with(leg, enabled);
        self.leg_interest.insert(sub_id, interest);
        if let Some(reg) = self.entries.get(&(Category::PreciseCallState, sub_id)) {
            reg.listener.set_interest(interest);
        }
    }

    pub fn is_registered(&self, category: Category, sub_id: Option<SubscriptionId>) -> bool {
        self.entries.contains_key(&(category, self.resolve(sub_id)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for ListenerRegistry {
    fn drop(&mut self) {
        self.unregister_all();
    }
}
