//! Listener traits and the multicast set that fans notifications out
//!
//! Subscribers implement `RoomDelegate` (session level) or
//! `ParticipantDelegate` (one participant). Every method has a no-op default
//! so a listener only overrides what it cares about. Listeners are invoked
//! synchronously, in registration order.

use crate::error::EngineError;
use crate::participant::{Participant, TrackPublication};
use crate::types::ConnectionState;
use bytes::Bytes;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Session-level listener
#[allow(unused_variables)]
pub trait RoomDelegate: Send + Sync {
    fn on_connection_state_changed(&self, new: &ConnectionState, old: &ConnectionState) {}

    fn on_connected(&self) {}

    fn on_reconnected(&self) {}

    fn on_reconnecting(&self) {}

    /// `error` is the error carried by the new disconnected state
    fn on_disconnected(&self, error: Option<&EngineError>) {}

    /// `error` is the error carried by the connecting state that failed
    fn on_failed_to_connect(&self, error: Option<&EngineError>) {}

    fn on_active_speakers_changed(&self, speakers: &[Participant]) {}

    /// `sender` is `None` for server-originated packets
    fn on_data_received(&self, sender: Option<&Participant>, payload: &Bytes, topic: Option<&str>) {}

    /// Fired asynchronously once per state mutation
    fn on_session_state_invalidated(&self) {}

    fn on_participant_connected(&self, participant: &Participant) {}

    fn on_participant_disconnected(&self, participant: &Participant) {}

    fn on_track_published(&self, participant: &Participant, publication: &TrackPublication) {}

    fn on_track_unpublished(&self, participant: &Participant, publication: &TrackPublication) {}

    fn on_track_subscribed(&self, participant: &Participant, publication: &TrackPublication) {}

    fn on_track_unsubscribed(&self, participant: &Participant, publication: &TrackPublication) {}
}

/// Participant-level listener
#[allow(unused_variables)]
pub trait ParticipantDelegate: Send + Sync {
    fn on_data_received(&self, participant: &Participant, payload: &Bytes, topic: Option<&str>) {}

    fn on_track_subscribed(&self, participant: &Participant, publication: &TrackPublication) {}

    fn on_track_unsubscribed(&self, participant: &Participant, publication: &TrackPublication) {}
}

/// Handle returned on registration, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelegateId(u64);

/// Ordered set of listeners of one capability
pub struct MulticastDelegate<T: ?Sized> {
    delegates: RwLock<Vec<(DelegateId, Arc<T>)>>,
    next_id: AtomicU64,
}

impl<T: ?Sized> Default for MulticastDelegate<T> {
    fn default() -> Self {
        Self {
            delegates: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T: ?Sized> fmt::Debug for MulticastDelegate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulticastDelegate")
            .field("len", &self.len())
            .finish()
    }
}

impl<T: ?Sized> MulticastDelegate<T> {
    /// Register a listener; it is notified after all previously registered ones
    pub fn add(&self, delegate: Arc<T>) -> DelegateId {
        let id = DelegateId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.delegates.write().push((id, delegate));
        id
    }

    /// Unregister a listener, returning whether it was registered
    pub fn remove(&self, id: DelegateId) -> bool {
        let mut delegates = self.delegates.write();
        let before = delegates.len();
        delegates.retain(|(existing, _)| *existing != id);
        delegates.len() != before
    }

    pub fn len(&self) -> usize {
        self.delegates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegates.read().is_empty()
    }

    /// Invoke `f` on every listener in registration order.
    ///
    /// `label` describes the notification for tracing and is only evaluated
    /// when a TRACE-level sink is active. Listeners are called outside the
    /// registry lock, so they may register or unregister listeners.
    pub fn notify<L, F>(&self, label: L, mut f: F)
    where
        L: FnOnce() -> String,
        F: FnMut(&T),
    {
        let delegates: Vec<Arc<T>> = self
            .delegates
            .read()
            .iter()
            .map(|(_, delegate)| delegate.clone())
            .collect();

        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(listeners = delegates.len(), "notify {}", label());
        }

        for delegate in &delegates {
            f(delegate.as_ref());
        }
    }
}
