//! Event sink: the single output channel for translated events.

use super::StateEvent;

/// Delivers state events to a remote observer.
///
/// Called from platform callback threads. Implementations take
/// ownership of the event and must be safe to call concurrently.
pub trait EventSink: Send + Sync {
    fn post_event(&self, event: StateEvent);
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;

    /// Sink that records every posted event, for assertions.
    #[derive(Debug, Default)]
    pub struct CollectingSink {
        events: Mutex<Vec<StateEvent>>,
    }

    impl CollectingSink {
        pub fn events(&self) -> Vec<StateEvent> {
            self.events.lock().clone()
        }

        pub fn names(&self) -> Vec<String> {
            self.events.lock().iter().map(|e| e.name.clone()).collect()
        }
    }

    impl EventSink for CollectingSink {
        fn post_event(&self, event: StateEvent) {
            self.events.lock().push(event);
        }
    }
}
