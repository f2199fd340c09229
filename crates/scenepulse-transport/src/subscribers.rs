//! Typed subscriber lists.
//!
//! Callbacks are keyed by [`EventKind`] rather than by string so a typo in
//! a subscription is a compile error. Several callbacks may share a kind;
//! they run synchronously, in registration order, before the next envelope
//! is looked at.

use std::collections::HashMap;

use scenepulse_types::{Envelope, EventKind};

/// A subscriber callback.
pub type Callback = Box<dyn FnMut(&Envelope) + Send>;

/// Mapping from event kind to its ordered callback list.
#[derive(Default)]
pub struct SubscriberRegistry {
    lists: HashMap<EventKind, Vec<Callback>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` to the list for `kind`.
    pub fn on<F>(&mut self, kind: EventKind, callback: F)
    where
        F: FnMut(&Envelope) + Send + 'static,
    {
        self.lists.entry(kind).or_default().push(Box::new(callback));
    }

    /// Number of callbacks registered for `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.lists.get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every callback registered for the envelope's kind.
    ///
    /// Returns how many callbacks ran; `0` is normal when nobody listens.
    pub fn dispatch(&mut self, envelope: &Envelope) -> usize {
        let Some(list) = self.lists.get_mut(&envelope.kind()) else {
            return 0;
        };
        for callback in list.iter_mut() {
            callback(envelope);
        }
        list.len()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            map.entry(&kind, &self.count(kind));
        }
        map.finish()
    }
}
