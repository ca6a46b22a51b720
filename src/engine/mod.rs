//! Engine trait: the transport/media collaborator the room sits on
//!
//! The engine owns the peer connections and signaling. The room consumes its
//! event stream (`EngineEvent`) and calls back into it for the few side
//! effects a connection transition needs.

use crate::error::Result;
use crate::participant::TrackPublication;
use crate::types::{
    EngineState, MediaStream, ParticipantInfo, RawTrack, SpeakerInfo, TrackReceiver,
    TrackSubscriptionPermissions, UserPacket,
};
use async_trait::async_trait;

pub mod memory;

/// Core trait for transport/media engines
#[async_trait]
pub trait Engine: Send + Sync {
    /// Current engine state
    ///
    /// Queried to gate speaker and data notifications on `connected`.
    fn state(&self) -> EngineState;

    /// Send the local participant's track-subscription permissions
    async fn send_track_subscription_permissions(
        &self,
        permissions: &TrackSubscriptionPermissions,
    ) -> Result<()>;

    /// Re-send subscription settings for remote publications after a quick
    /// reconnect
    async fn reset_track_settings(&self, publications: Vec<TrackPublication>) -> Result<()>;

    /// Unpublish and publish again every local track after a full reconnect
    async fn republish_tracks(&self, publications: Vec<TrackPublication>) -> Result<()>;

    /// Engine name (e.g., "webrtc", "memory")
    fn name(&self) -> &str;
}

/// Events produced by the engine, in the order they occurred
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The engine state changed from `old` to `new`
    StateMutated { new: EngineState, old: EngineState },
    /// Currently active speakers
    SpeakersUpdated(Vec<SpeakerInfo>),
    /// A remote participant joined, changed or left
    ParticipantUpdate(Vec<ParticipantInfo>),
    /// An inbound media track arrived
    TrackAdded {
        track: RawTrack,
        receiver: TrackReceiver,
        streams: Vec<MediaStream>,
    },
    /// An inbound media track went away
    TrackRemoved(RawTrack),
    /// Application data from a participant or the server
    UserPacket(UserPacket),
}

/// Independent processing lane of an engine event
///
/// Events on the same lane are handled in arrival order; lanes do not wait
/// for each other. Participant updates share the track lane because track
/// resolution depends on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum EventLane {
    Connection,
    Speakers,
    Tracks,
    Data,
}

impl EngineEvent {
    pub(crate) fn lane(&self) -> EventLane {
        match self {
            EngineEvent::StateMutated { .. } => EventLane::Connection,
            EngineEvent::SpeakersUpdated(_) => EventLane::Speakers,
            EngineEvent::ParticipantUpdate(_)
            | EngineEvent::TrackAdded { .. }
            | EngineEvent::TrackRemoved(_) => EventLane::Tracks,
            EngineEvent::UserPacket(_) => EventLane::Data,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::StateMutated { .. } => "state_mutated",
            EngineEvent::SpeakersUpdated(_) => "speakers_updated",
            EngineEvent::ParticipantUpdate(_) => "participant_update",
            EngineEvent::TrackAdded { .. } => "track_added",
            EngineEvent::TrackRemoved(_) => "track_removed",
            EngineEvent::UserPacket(_) => "user_packet",
        }
    }
}
