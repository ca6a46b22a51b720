//! In-memory engine for testing and single-process use
//!
//! Holds a settable `EngineState`, records every side-effect call the room
//! makes, and feeds events to the room through an unbounded channel.

use super::{Engine, EngineEvent};
use crate::error::{EngineError, Result, RoomError};
use crate::participant::TrackPublication;
use crate::types::{EngineState, TrackSid, TrackSubscriptionPermissions};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// A side-effect call received by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    SendPermissions(TrackSubscriptionPermissions),
    ResetTrackSettings(Vec<TrackSid>),
    RepublishTracks(Vec<TrackSid>),
}

/// Which side effects should fail
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryFailures {
    pub send_permissions: bool,
    pub reset_track_settings: bool,
    pub republish_tracks: bool,
}

/// In-memory engine
pub struct MemoryEngine {
    state: RwLock<EngineState>,
    calls: Mutex<Vec<EngineCall>>,
    failures: Mutex<MemoryFailures>,
    call_notify: Notify,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: RwLock::new(EngineState::default()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(MemoryFailures::default()),
            call_notify: Notify::new(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the event stream to hand to `Room::start` (only once)
    pub fn take_events(&self) -> Option<UnboundedReceiverStream<EngineEvent>> {
        self.events_rx.lock().take().map(UnboundedReceiverStream::new)
    }

    /// Queue an event on the stream
    pub fn emit(&self, event: EngineEvent) -> Result<()> {
        self.events_tx
            .send(event)
            .map_err(|_| RoomError::Engine(EngineError::Connection("event stream closed".to_string())))
    }

    /// Replace the engine state without emitting anything
    pub fn set_state(&self, state: EngineState) {
        *self.state.write() = state;
    }

    /// Replace the engine state and emit the matching `StateMutated` event
    pub fn transition(&self, new: EngineState) -> Result<()> {
        let old = std::mem::replace(&mut *self.state.write(), new.clone());
        self.emit(EngineEvent::StateMutated { new, old })
    }

    pub fn set_failures(&self, failures: MemoryFailures) {
        *self.failures.lock() = failures;
    }

    /// All side-effect calls so far, in order
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Wait until at least `count` side-effect calls were recorded
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let notified = self.call_notify.notified();
            if self.calls.lock().len() >= count {
                return;
            }
            notified.await;
        }
    }

    fn record(&self, call: EngineCall, fail: bool, what: &str) -> Result<()> {
        self.calls.lock().push(call);
        self.call_notify.notify_waiters();
        if fail {
            return Err(RoomError::Engine(EngineError::Signal(format!("{} failed", what))));
        }
        Ok(())
    }
}

fn sids(publications: &[TrackPublication]) -> Vec<TrackSid> {
    let mut sids: Vec<TrackSid> = publications.iter().map(|p| p.sid().clone()).collect();
    sids.sort();
    sids
}

#[async_trait]
impl Engine for MemoryEngine {
    fn state(&self) -> EngineState {
        self.state.read().clone()
    }

    async fn send_track_subscription_permissions(
        &self,
        permissions: &TrackSubscriptionPermissions,
    ) -> Result<()> {
        let fail = self.failures.lock().send_permissions;
        self.record(
            EngineCall::SendPermissions(permissions.clone()),
            fail,
            "send permissions",
        )
    }

    async fn reset_track_settings(&self, publications: Vec<TrackPublication>) -> Result<()> {
        let fail = self.failures.lock().reset_track_settings;
        self.record(
            EngineCall::ResetTrackSettings(sids(&publications)),
            fail,
            "reset track settings",
        )
    }

    async fn republish_tracks(&self, publications: Vec<TrackPublication>) -> Result<()> {
        let fail = self.failures.lock().republish_tracks;
        self.record(
            EngineCall::RepublishTracks(sids(&publications)),
            fail,
            "republish tracks",
        )
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConnectionState, ReconnectMode, TrackKind};
    use futures::StreamExt;

    #[tokio::test]
    async fn test_transition_emits_old_and_new() {
        let engine = MemoryEngine::new();
        let mut events = engine.take_events().unwrap();
        assert!(engine.take_events().is_none());

        engine
            .transition(EngineState::new(
                ConnectionState::Connecting { error: None },
                ReconnectMode::None,
            ))
            .unwrap();

        match events.next().await.unwrap() {
            EngineEvent::StateMutated { new, old } => {
                assert!(new.connection_state.is_connecting());
                assert!(old.connection_state.is_disconnected());
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(engine.state().connection_state.is_connecting());
    }

    #[tokio::test]
    async fn test_records_calls_and_failures() {
        let engine = MemoryEngine::new();
        engine
            .send_track_subscription_permissions(&TrackSubscriptionPermissions::default())
            .await
            .unwrap();

        engine.set_failures(MemoryFailures {
            republish_tracks: true,
            ..Default::default()
        });
        let publication = TrackPublication::new("TR_b", TrackKind::Audio, "mic");
        let other = TrackPublication::new("TR_a", TrackKind::Video, "cam");
        let err = engine
            .republish_tracks(vec![publication, other])
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::Engine(EngineError::Signal(_))));

        engine.wait_for_calls(2).await;
        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::SendPermissions(TrackSubscriptionPermissions::default()),
                EngineCall::RepublishTracks(vec!["TR_a".into(), "TR_b".into()]),
            ]
        );
        assert_eq!(engine.name(), "memory");
    }
}
