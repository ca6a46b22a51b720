//! Test helpers shared by the unit tests

use crate::config::RoomOptions;
use crate::delegate::{ParticipantDelegate, RoomDelegate};
use crate::e2ee::E2eeManager;
use crate::engine::memory::MemoryEngine;
use crate::error::EngineError;
use crate::participant::{Participant, TrackPublication};
use crate::room::RoomSession;
use crate::types::{
    ConnectionState, ParticipantInfo, ParticipantStatus, TrackInfo, TrackKind,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Listener that records every notification as a short string
#[derive(Default)]
pub(crate) struct RecordingDelegate {
    events: Mutex<Vec<String>>,
    notify: Notify,
}

impl RecordingDelegate {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    /// Wait until `event` has been recorded
    pub(crate) async fn wait_for(&self, event: &str) {
        self.wait_for_count(event, 1).await;
    }

    /// Wait (up to five seconds) until `event` has been recorded `count` times
    pub(crate) async fn wait_for_count(&self, event: &str, count: usize) {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                if self.count(event) >= count {
                    return;
                }
                notified.await;
            }
        };
        if tokio::time::timeout(Duration::from_secs(5), wait).await.is_err() {
            panic!("timed out waiting for {:?} x{}, got {:?}", event, count, self.events());
        }
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
        self.notify.notify_waiters();
    }
}

fn error_label(error: Option<&EngineError>) -> String {
    error.map(|e| e.to_string()).unwrap_or_else(|| "none".to_string())
}

fn payload_label(payload: &Bytes) -> String {
    String::from_utf8_lossy(payload).to_string()
}

impl RoomDelegate for RecordingDelegate {
    fn on_connection_state_changed(&self, new: &ConnectionState, old: &ConnectionState) {
        self.push(format!("state:{}<-{}", new.as_str(), old.as_str()));
    }

    fn on_connected(&self) {
        self.push("connected".to_string());
    }

    fn on_reconnected(&self) {
        self.push("reconnected".to_string());
    }

    fn on_reconnecting(&self) {
        self.push("reconnecting".to_string());
    }

    fn on_disconnected(&self, error: Option<&EngineError>) {
        self.push(format!("disconnected:{}", error_label(error)));
    }

    fn on_failed_to_connect(&self, error: Option<&EngineError>) {
        self.push(format!("failed_to_connect:{}", error_label(error)));
    }

    fn on_active_speakers_changed(&self, speakers: &[Participant]) {
        let identities: Vec<&str> = speakers.iter().map(|p| p.identity().as_str()).collect();
        self.push(format!("speakers:[{}]", identities.join(",")));
    }

    fn on_data_received(&self, sender: Option<&Participant>, payload: &Bytes, topic: Option<&str>) {
        self.push(format!(
            "data:{}:{}:{}",
            sender.map(|p| p.identity().as_str()).unwrap_or("none"),
            payload_label(payload),
            topic.unwrap_or("none")
        ));
    }

    fn on_session_state_invalidated(&self) {
        self.push("invalidated".to_string());
    }

    fn on_participant_connected(&self, participant: &Participant) {
        self.push(format!("participant_connected:{}", participant.identity()));
    }

    fn on_participant_disconnected(&self, participant: &Participant) {
        self.push(format!("participant_disconnected:{}", participant.identity()));
    }

    fn on_track_published(&self, participant: &Participant, publication: &TrackPublication) {
        self.push(format!(
            "track_published:{}:{}",
            participant.identity(),
            publication.sid()
        ));
    }

    fn on_track_unpublished(&self, participant: &Participant, publication: &TrackPublication) {
        self.push(format!(
            "track_unpublished:{}:{}",
            participant.identity(),
            publication.sid()
        ));
    }

    fn on_track_subscribed(&self, participant: &Participant, publication: &TrackPublication) {
        self.push(format!(
            "track_subscribed:{}:{}",
            participant.identity(),
            publication.sid()
        ));
    }

    fn on_track_unsubscribed(&self, participant: &Participant, publication: &TrackPublication) {
        self.push(format!(
            "track_unsubscribed:{}:{}",
            participant.identity(),
            publication.sid()
        ));
    }
}

impl ParticipantDelegate for RecordingDelegate {
    fn on_data_received(&self, participant: &Participant, payload: &Bytes, topic: Option<&str>) {
        self.push(format!(
            "p_data:{}:{}:{}",
            participant.identity(),
            payload_label(payload),
            topic.unwrap_or("none")
        ));
    }

    fn on_track_subscribed(&self, participant: &Participant, publication: &TrackPublication) {
        self.push(format!(
            "p_track_subscribed:{}:{}",
            participant.identity(),
            publication.sid()
        ));
    }

    fn on_track_unsubscribed(&self, participant: &Participant, publication: &TrackPublication) {
        self.push(format!(
            "p_track_unsubscribed:{}:{}",
            participant.identity(),
            publication.sid()
        ));
    }
}

/// E2EE manager counting cleanups
#[derive(Default)]
pub(crate) struct CountingE2ee {
    cleanups: AtomicUsize,
}

impl CountingE2ee {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

impl E2eeManager for CountingE2ee {
    fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn participant_info(sid: &str, identity: &str, tracks: &[&str]) -> ParticipantInfo {
    ParticipantInfo {
        sid: sid.into(),
        identity: identity.into(),
        name: String::new(),
        state: ParticipantStatus::Active,
        tracks: tracks
            .iter()
            .map(|sid| TrackInfo {
                sid: (*sid).into(),
                kind: TrackKind::Audio,
                name: String::new(),
                muted: false,
            })
            .collect(),
    }
}

/// Session on a memory engine with a recording listener attached
pub(crate) fn test_session(
    options: RoomOptions,
) -> (Arc<RoomSession>, Arc<MemoryEngine>, Arc<RecordingDelegate>) {
    let engine = Arc::new(MemoryEngine::new());
    let session = Arc::new(RoomSession::new(engine.clone(), "me".into(), options));
    let recorder = RecordingDelegate::new();
    session.delegates.add(recorder.clone());
    (session, engine, recorder)
}

/// Register a remote participant directly in the store
pub(crate) fn add_remote(session: &RoomSession, info: ParticipantInfo) -> Participant {
    let participant = Participant::remote(&info);
    session.store.mutate(|state| {
        state
            .remote_participants
            .insert(info.identity.clone(), participant.clone());
    });
    participant
}
