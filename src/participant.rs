//! Participant and track publication records
//!
//! Records live inside the room's `RoomState`. Values handed out to callers
//! and listeners are snapshots; the only shared part is the participant's
//! listener set, so registering a `ParticipantDelegate` on a snapshot
//! registers it on the live participant.

use crate::delegate::{DelegateId, MulticastDelegate, ParticipantDelegate};
use crate::types::{
    ParticipantIdentity, ParticipantInfo, ParticipantSid, RawTrack, TrackInfo, TrackKind,
    TrackReceiver, TrackSid,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A media track attached to a publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedTrack {
    pub track: RawTrack,
    /// Receiver for inbound tracks, `None` for local ones
    pub receiver: Option<TrackReceiver>,
}

/// One track's subscription slot
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPublication {
    sid: TrackSid,
    kind: TrackKind,
    name: String,
    muted: bool,
    track: Option<AttachedTrack>,
}

impl TrackPublication {
    pub fn new(sid: impl Into<TrackSid>, kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            kind,
            name: name.into(),
            muted: false,
            track: None,
        }
    }

    pub(crate) fn from_info(info: &TrackInfo) -> Self {
        Self {
            sid: info.sid.clone(),
            kind: info.kind,
            name: info.name.clone(),
            muted: info.muted,
            track: None,
        }
    }

    /// Attach a track up front (local publications)
    pub fn with_track(mut self, track: RawTrack) -> Self {
        self.track = Some(AttachedTrack {
            track,
            receiver: None,
        });
        self
    }

    pub fn sid(&self) -> &TrackSid {
        &self.sid
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn track(&self) -> Option<&AttachedTrack> {
        self.track.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.track.is_some()
    }

    pub(crate) fn attach(&mut self, track: RawTrack, receiver: TrackReceiver) {
        self.track = Some(AttachedTrack {
            track,
            receiver: Some(receiver),
        });
    }

    pub(crate) fn detach(&mut self) -> Option<AttachedTrack> {
        self.track.take()
    }

    /// Whether the attached track is the raw track with this id
    pub(crate) fn holds_track(&self, track_id: &str) -> bool {
        self.track
            .as_ref()
            .map(|attached| attached.track.id == track_id)
            .unwrap_or(false)
    }
}

/// Publications added and removed by a participant info update
#[derive(Debug, Default)]
pub(crate) struct PublicationChanges {
    pub published: Vec<TrackPublication>,
    pub unpublished: Vec<TrackPublication>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantKind {
    Local,
    Remote,
}

/// Local or remote participant
#[derive(Clone)]
pub struct Participant {
    pub(crate) kind: ParticipantKind,
    pub(crate) identity: ParticipantIdentity,
    pub(crate) sid: Option<ParticipantSid>,
    pub(crate) name: String,
    pub(crate) audio_level: f32,
    pub(crate) is_speaking: bool,
    pub(crate) publications: HashMap<TrackSid, TrackPublication>,
    delegates: Arc<MulticastDelegate<dyn ParticipantDelegate>>,
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("kind", &self.kind)
            .field("identity", &self.identity)
            .field("sid", &self.sid)
            .field("audio_level", &self.audio_level)
            .field("is_speaking", &self.is_speaking)
            .field("publications", &self.publications.len())
            .finish()
    }
}

impl Participant {
    /// Create the local participant; its sid is assigned by the server later
    pub fn local(identity: impl Into<ParticipantIdentity>, sid: Option<ParticipantSid>) -> Self {
        Self::with_kind(ParticipantKind::Local, identity.into(), sid, String::new())
    }

    /// Create a remote participant from server metadata
    pub fn remote(info: &ParticipantInfo) -> Self {
        let mut participant = Self::with_kind(
            ParticipantKind::Remote,
            info.identity.clone(),
            Some(info.sid.clone()),
            info.name.clone(),
        );
        for track in &info.tracks {
            participant
                .publications
                .insert(track.sid.clone(), TrackPublication::from_info(track));
        }
        participant
    }

    fn with_kind(
        kind: ParticipantKind,
        identity: ParticipantIdentity,
        sid: Option<ParticipantSid>,
        name: String,
    ) -> Self {
        Self {
            kind,
            identity,
            sid,
            name,
            audio_level: 0.0,
            is_speaking: false,
            publications: HashMap::new(),
            delegates: Arc::new(MulticastDelegate::default()),
        }
    }

    pub fn kind(&self) -> ParticipantKind {
        self.kind
    }

    pub fn is_local(&self) -> bool {
        self.kind == ParticipantKind::Local
    }

    pub fn identity(&self) -> &ParticipantIdentity {
        &self.identity
    }

    pub fn sid(&self) -> Option<&ParticipantSid> {
        self.sid.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn audio_level(&self) -> f32 {
        self.audio_level
    }

    pub fn is_speaking(&self) -> bool {
        self.is_speaking
    }

    pub fn track_publications(&self) -> &HashMap<TrackSid, TrackPublication> {
        &self.publications
    }

    pub fn publication(&self, sid: &TrackSid) -> Option<&TrackPublication> {
        self.publications.get(sid)
    }

    /// Register a listener for this participant's notifications
    pub fn add_delegate(&self, delegate: Arc<dyn ParticipantDelegate>) -> DelegateId {
        self.delegates.add(delegate)
    }

    pub fn remove_delegate(&self, id: DelegateId) -> bool {
        self.delegates.remove(id)
    }

    pub(crate) fn delegates(&self) -> &MulticastDelegate<dyn ParticipantDelegate> {
        &self.delegates
    }

    pub(crate) fn has_sid(&self, sid: &ParticipantSid) -> bool {
        self.sid.as_ref() == Some(sid)
    }

    pub(crate) fn set_speaking(&mut self, level: f32) {
        self.audio_level = level.clamp(0.0, 1.0);
        self.is_speaking = true;
    }

    pub(crate) fn reset_speaking(&mut self) {
        self.audio_level = 0.0;
        self.is_speaking = false;
    }

    /// Apply server metadata: name, sid and the publication set.
    ///
    /// Existing publications keep their attached track; publications no
    /// longer announced are removed and returned as they were, track
    /// included.
    pub(crate) fn update_from_info(&mut self, info: &ParticipantInfo) -> PublicationChanges {
        self.sid = Some(info.sid.clone());
        if !info.name.is_empty() {
            self.name = info.name.clone();
        }

        let mut changes = PublicationChanges::default();
        if self.is_local() {
            // Local publications are owned by the client, not the server's view
            return changes;
        }

        for track in &info.tracks {
            match self.publications.get_mut(&track.sid) {
                Some(existing) => existing.muted = track.muted,
                None => {
                    let publication = TrackPublication::from_info(track);
                    changes.published.push(publication.clone());
                    self.publications.insert(track.sid.clone(), publication);
                }
            }
        }

        let gone: Vec<TrackSid> = self
            .publications
            .keys()
            .filter(|sid| !info.tracks.iter().any(|t| &t.sid == *sid))
            .cloned()
            .collect();
        for sid in gone {
            if let Some(publication) = self.publications.remove(&sid) {
                changes.unpublished.push(publication);
            }
        }

        changes
    }
}
