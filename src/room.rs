//! Room session built on a pluggable engine
//!
//! `Room` owns the session state and the listener set, and runs the loop that
//! consumes the engine's event stream. Each event kind is routed to its own
//! lane: a lane handles its events one at a time in arrival order, while
//! lanes progress independently of each other.

use crate::config::RoomOptions;
use crate::delegate::{DelegateId, MulticastDelegate, RoomDelegate};
use crate::e2ee::E2eeManager;
use crate::engine::{Engine, EngineEvent, EventLane};
use crate::error::{Result, RoomError};
use crate::participant::{Participant, TrackPublication};
use crate::state::{RoomState, StateStore};
use crate::types::{
    ConnectionState, EngineState, MediaStream, ParticipantIdentity, ParticipantInfo, RawTrack,
    SpeakerInfo, TrackReceiver, TrackSid, TrackSubscriptionPermissions, UserPacket,
};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

struct RoomHandle {
    session_task: JoinHandle<()>,
    close_emitter: oneshot::Sender<()>,
}

enum LoopState {
    Idle,
    Running(RoomHandle),
    Closed,
}

/// A room session
///
/// Thread-safe; all methods take `&self`.
pub struct Room {
    inner: Arc<RoomSession>,
    handle: AsyncMutex<LoopState>,
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("engine", &self.inner.engine.name())
            .field("connection_state", &self.connection_state())
            .finish()
    }
}

impl Room {
    /// Create a room for the given local identity on top of `engine`.
    ///
    /// Fails with [`RoomError::Config`] when `options` do not validate.
    pub fn new(
        engine: Arc<dyn Engine>,
        local_identity: impl Into<ParticipantIdentity>,
        options: RoomOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            inner: Arc::new(RoomSession::new(engine, local_identity.into(), options)),
            handle: AsyncMutex::new(LoopState::Idle),
        })
    }

    /// Start consuming the engine's event stream
    pub async fn start<S>(&self, events: S) -> Result<()>
    where
        S: Stream<Item = EngineEvent> + Send + Unpin + 'static,
    {
        let mut handle = self.handle.lock().await;
        match *handle {
            LoopState::Running(_) => return Err(RoomError::AlreadyStarted),
            LoopState::Closed => return Err(RoomError::AlreadyClosed),
            LoopState::Idle => {}
        }

        let (close_emitter, close_receiver) = oneshot::channel();
        let session_task = tokio::spawn(room_task(self.inner.clone(), events, close_receiver));
        *handle = LoopState::Running(RoomHandle {
            session_task,
            close_emitter,
        });

        tracing::info!(engine = %self.inner.engine.name(), "Room started");
        Ok(())
    }

    /// Stop the event loop and tear down encryption state.
    ///
    /// Encryption state is torn down even when the loop had failed, in which
    /// case [`RoomError::Internal`] is returned afterwards.
    pub async fn close(&self) -> Result<()> {
        let mut handle = self.handle.lock().await;
        let joined = match std::mem::replace(&mut *handle, LoopState::Closed) {
            LoopState::Closed => return Err(RoomError::AlreadyClosed),
            LoopState::Idle => Ok(()),
            LoopState::Running(running) => {
                let _ = running.close_emitter.send(());
                running.session_task.await
            }
        };

        self.inner.clear_e2ee_manager();
        if let Err(e) = joined {
            tracing::error!(error = %e, "Room task failed");
            return Err(RoomError::Internal(format!("room task failed: {}", e)));
        }
        tracing::info!("Room closed");
        Ok(())
    }

    /// Register a session-level listener
    pub fn add_delegate(&self, delegate: Arc<dyn RoomDelegate>) -> DelegateId {
        self.inner.delegates.add(delegate)
    }

    pub fn remove_delegate(&self, id: DelegateId) -> bool {
        self.inner.delegates.remove(id)
    }

    /// Install (or remove) the end-to-end encryption manager
    ///
    /// Cleared automatically when the session disconnects.
    pub fn set_e2ee_manager(&self, manager: Option<Arc<dyn E2eeManager>>) {
        *self.inner.e2ee_manager.lock() = manager;
    }

    pub fn e2ee_manager(&self) -> Option<Arc<dyn E2eeManager>> {
        self.inner.e2ee_manager.lock().clone()
    }

    /// Consistent copy of the whole session state
    pub fn snapshot(&self) -> RoomState {
        self.inner.store.snapshot()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.store.read(|state| state.connection_state.clone())
    }

    pub fn local_participant(&self) -> Participant {
        self.inner.store.read(|state| state.local_participant.clone())
    }

    pub fn remote_participants(&self) -> HashMap<ParticipantIdentity, Participant> {
        self.inner.store.read(|state| state.remote_participants.clone())
    }

    pub fn remote_participant(&self, identity: &ParticipantIdentity) -> Option<Participant> {
        self.inner
            .store
            .read(|state| state.remote_participants.get(identity).cloned())
    }

    pub fn active_speakers(&self) -> Vec<Participant> {
        self.inner.store.read(|state| state.active_speakers())
    }

    pub fn options(&self) -> &RoomOptions {
        &self.inner.options
    }

    /// Replace the local track-subscription permissions
    ///
    /// The new value is sent right away when connected, and re-sent on every
    /// later (re)connect.
    pub async fn set_track_subscription_permissions(
        &self,
        permissions: TrackSubscriptionPermissions,
    ) -> Result<()> {
        self.inner
            .store
            .mutate(|state| state.permissions = permissions.clone());

        if self.inner.engine.state().connection_state.is_connected() {
            self.inner
                .engine
                .send_track_subscription_permissions(&permissions)
                .await?;
        }
        Ok(())
    }

    /// Register a local publication so a full reconnect republishes it
    pub fn add_local_publication(&self, publication: TrackPublication) {
        self.inner.store.mutate(|state| {
            state
                .local_participant
                .publications
                .insert(publication.sid().clone(), publication);
        });
    }

    pub fn remove_local_publication(&self, sid: &TrackSid) -> Option<TrackPublication> {
        self.inner
            .store
            .mutate(|state| state.local_participant.publications.remove(sid))
    }

    /// Deliver one engine event and wait for its handler, including any
    /// track attach retries
    pub async fn handle_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::TrackAdded {
                track,
                receiver,
                streams,
            } => self.on_track_added(track, receiver, streams).await,
            other => self.inner.handle_event(other).await,
        }
    }

    /// Engine state changed from `old` to `new`
    pub async fn on_state_mutated(&self, new: EngineState, old: EngineState) {
        self.inner.handle_state_mutated(new, old).await;
    }

    pub fn on_speakers_updated(&self, speakers: &[SpeakerInfo]) {
        self.inner.handle_speakers_updated(speakers);
    }

    pub fn on_participant_update(&self, updates: &[ParticipantInfo]) {
        self.inner.handle_participant_update(updates);
    }

    /// Resolve and attach an inbound track, waiting for the retries to finish
    pub async fn on_track_added(
        &self,
        track: RawTrack,
        receiver: TrackReceiver,
        streams: Vec<MediaStream>,
    ) {
        if let Some(target) = self.inner.resolve_track_owner(&track, &streams) {
            self.inner.attach_track(target, track, receiver).await;
        }
    }

    pub fn on_track_removed(&self, track: &RawTrack) {
        self.inner.handle_track_removed(track);
    }

    pub fn on_user_packet(&self, packet: UserPacket) {
        self.inner.handle_user_packet(packet);
    }
}

pub(crate) struct RoomSession {
    pub(crate) engine: Arc<dyn Engine>,
    pub(crate) options: RoomOptions,
    pub(crate) store: StateStore,
    pub(crate) delegates: MulticastDelegate<dyn RoomDelegate>,
    pub(crate) e2ee_manager: Mutex<Option<Arc<dyn E2eeManager>>>,
}

impl RoomSession {
    pub(crate) fn new(
        engine: Arc<dyn Engine>,
        local_identity: ParticipantIdentity,
        options: RoomOptions,
    ) -> Self {
        let permissions = TrackSubscriptionPermissions {
            all_participants_allowed: options.all_participants_allowed,
            track_permissions: Vec::new(),
        };
        let state = RoomState::new(Participant::local(local_identity, None), permissions);

        Self {
            engine,
            options,
            store: StateStore::new(state),
            delegates: MulticastDelegate::default(),
            e2ee_manager: Mutex::new(None),
        }
    }

    pub(crate) async fn handle_event(self: &Arc<Self>, event: EngineEvent) {
        match event {
            EngineEvent::StateMutated { new, old } => self.handle_state_mutated(new, old).await,
            EngineEvent::SpeakersUpdated(speakers) => self.handle_speakers_updated(&speakers),
            EngineEvent::ParticipantUpdate(updates) => self.handle_participant_update(&updates),
            EngineEvent::TrackAdded {
                track,
                receiver,
                streams,
            } => {
                // Resolution registers the pending attach in lane order, so a
                // later TrackRemoved on this lane cancels it.
                if let Some(target) = self.resolve_track_owner(&track, &streams) {
                    let session = self.clone();
                    tokio::spawn(async move {
                        session.attach_track(target, track, receiver).await;
                    });
                }
            }
            EngineEvent::TrackRemoved(track) => self.handle_track_removed(&track),
            EngineEvent::UserPacket(packet) => self.handle_user_packet(packet),
        }
    }

    pub(crate) fn clear_e2ee_manager(&self) {
        if let Some(manager) = self.e2ee_manager.lock().take() {
            tracing::debug!("Clearing e2ee manager");
            manager.cleanup();
        }
    }
}

async fn room_task<S>(
    session: Arc<RoomSession>,
    mut events: S,
    mut close_receiver: oneshot::Receiver<()>,
) where
    S: Stream<Item = EngineEvent> + Send + Unpin + 'static,
{
    let mut lanes: HashMap<EventLane, mpsc::UnboundedSender<EngineEvent>> = HashMap::new();
    let mut workers = Vec::new();

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else {
                    tracing::debug!("Engine event stream ended");
                    break;
                };
                let lane = event.lane();
                let sender = lanes.entry(lane).or_insert_with(|| {
                    let (tx, rx) = mpsc::unbounded_channel();
                    workers.push(tokio::spawn(lane_task(session.clone(), lane, rx)));
                    tx
                });
                if sender.send(event).is_err() {
                    tracing::error!(lane = ?lane, "Event lane closed unexpectedly");
                }
            },
            _ = &mut close_receiver => {
                break;
            }
        }
    }

    // Lanes drain what they already received, then stop
    drop(lanes);
    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "Event lane task failed");
        }
    }

    tracing::debug!("Room task closed");
}

async fn lane_task(
    session: Arc<RoomSession>,
    lane: EventLane,
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
) {
    let warn_after = session.options.slow_event_warning();

    while let Some(event) = events.recv().await {
        let kind = event.kind();
        let handler = session.handle_event(event);
        tokio::pin!(handler);

        let finished = tokio::select! {
            _ = &mut handler => true,
            _ = tokio::time::sleep(warn_after) => false,
        };
        if !finished {
            tracing::error!(
                lane = ?lane,
                event = kind,
                waited_ms = warn_after.as_millis() as u64,
                "Engine event is taking too much time"
            );
            handler.await;
        }
    }

    tracing::trace!(lane = ?lane, "Event lane closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::{EngineCall, MemoryEngine};
    use crate::testing::RecordingDelegate;
    use crate::types::{ReconnectMode, TrackKind};

    fn connected() -> EngineState {
        EngineState::new(ConnectionState::Connected, ReconnectMode::None)
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let engine = Arc::new(MemoryEngine::new());
        let room = Room::new(engine.clone(), "me", RoomOptions::default()).unwrap();
        room.start(engine.take_events().unwrap()).await.unwrap();

        let (_tx, rx) = mpsc::unbounded_channel::<EngineEvent>();
        let second = room
            .start(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
            .await;
        assert!(matches!(second, Err(RoomError::AlreadyStarted)));

        room.close().await.unwrap();
        assert!(matches!(room.close().await, Err(RoomError::AlreadyClosed)));
    }

    #[tokio::test]
    async fn test_close_without_start() {
        let room = Room::new(Arc::new(MemoryEngine::new()), "me", RoomOptions::default()).unwrap();
        room.close().await.unwrap();

        let (_tx, rx) = mpsc::unbounded_channel::<EngineEvent>();
        let start = room
            .start(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
            .await;
        assert!(matches!(start, Err(RoomError::AlreadyClosed)));
    }

    #[tokio::test]
    async fn test_event_loop_drives_state() {
        let engine = Arc::new(MemoryEngine::new());
        let room = Room::new(engine.clone(), "me", RoomOptions::default()).unwrap();
        let recorder = RecordingDelegate::new();
        room.add_delegate(recorder.clone());
        room.start(engine.take_events().unwrap()).await.unwrap();

        engine
            .transition(EngineState::new(
                ConnectionState::Connecting { error: None },
                ReconnectMode::None,
            ))
            .unwrap();
        engine.transition(connected()).unwrap();

        recorder.wait_for("connected").await;
        assert!(room.connection_state().is_connected());
        engine.wait_for_calls(1).await;
        assert!(matches!(engine.calls()[0], EngineCall::SendPermissions(_)));

        room.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_local_publications() {
        let room = Room::new(Arc::new(MemoryEngine::new()), "me", RoomOptions::default()).unwrap();
        room.add_local_publication(TrackPublication::new("TR_mic", TrackKind::Audio, "mic"));
        assert_eq!(room.local_participant().track_publications().len(), 1);

        let removed = room.remove_local_publication(&"TR_mic".into()).unwrap();
        assert_eq!(removed.name(), "mic");
        assert!(room.local_participant().track_publications().is_empty());
        assert!(room.remove_local_publication(&"TR_mic".into()).is_none());
    }

    #[tokio::test]
    async fn test_set_permissions_sends_only_when_connected() {
        let engine = Arc::new(MemoryEngine::new());
        let room = Room::new(engine.clone(), "me", RoomOptions::default()).unwrap();
        let restricted = TrackSubscriptionPermissions {
            all_participants_allowed: false,
            track_permissions: Vec::new(),
        };

        room.set_track_subscription_permissions(restricted.clone())
            .await
            .unwrap();
        assert!(engine.calls().is_empty());
        assert_eq!(room.snapshot().permissions(), &restricted);

        engine.set_state(connected());
        room.set_track_subscription_permissions(restricted.clone())
            .await
            .unwrap();
        assert_eq!(engine.calls(), vec![EngineCall::SendPermissions(restricted)]);
    }

    #[tokio::test]
    async fn test_close_clears_e2ee_manager() {
        let room = Room::new(Arc::new(MemoryEngine::new()), "me", RoomOptions::default()).unwrap();
        let manager = crate::testing::CountingE2ee::new();
        room.set_e2ee_manager(Some(manager.clone()));
        assert!(room.e2ee_manager().is_some());

        room.close().await.unwrap();
        assert!(room.e2ee_manager().is_none());
        assert_eq!(manager.cleanups(), 1);
    }

    #[test]
    fn test_new_rejects_invalid_options() {
        let options = RoomOptions {
            slow_event_warning_ms: 0,
            ..RoomOptions::default()
        };
        let result = Room::new(Arc::new(MemoryEngine::new()), "me", options);
        assert!(matches!(result, Err(RoomError::Config(_))));
    }

    #[tokio::test]
    async fn test_close_reports_failed_loop() {
        let room = Room::new(Arc::new(MemoryEngine::new()), "me", RoomOptions::default()).unwrap();
        let manager = crate::testing::CountingE2ee::new();
        room.set_e2ee_manager(Some(manager.clone()));

        let broken = futures::stream::poll_fn(|_| -> std::task::Poll<Option<EngineEvent>> {
            panic!("event source failed")
        });
        room.start(broken).await.unwrap();
        tokio::task::yield_now().await;

        let closed = room.close().await;
        assert!(matches!(closed, Err(RoomError::Internal(_))));
        assert!(room.e2ee_manager().is_none());
        assert_eq!(manager.cleanups(), 1);
        assert!(matches!(room.close().await, Err(RoomError::AlreadyClosed)));
    }
}
