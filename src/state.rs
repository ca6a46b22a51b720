//! Room state snapshot store
//!
//! `RoomState` is the single authoritative record of the session: connection
//! state, participants and active speakers. `StateStore` guards it behind one
//! lock; every write goes through `StateStore::mutate`, which runs the whole
//! read-modify-write under the lock and hands back whatever the caller needs
//! from it. Readers get either a full clone or a closure over a consistent
//! view, never a half-applied mutation.

use crate::participant::Participant;
use crate::types::{
    ConnectionState, ParticipantIdentity, ParticipantSid, ReconnectMode,
    TrackSubscriptionPermissions,
};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Complete session state
#[derive(Debug, Clone)]
pub struct RoomState {
    pub(crate) connection_state: ConnectionState,
    pub(crate) reconnect_mode: ReconnectMode,
    pub(crate) local_participant: Participant,
    pub(crate) remote_participants: HashMap<ParticipantIdentity, Participant>,
    pub(crate) active_speakers: Vec<ParticipantIdentity>,
    pub(crate) permissions: TrackSubscriptionPermissions,
    /// Inbound tracks resolved but not attached yet, by raw track id
    pub(crate) pending_attaches: HashMap<String, u64>,
    pub(crate) next_attach_token: u64,
}

impl RoomState {
    pub fn new(local_participant: Participant, permissions: TrackSubscriptionPermissions) -> Self {
        Self {
            connection_state: ConnectionState::default(),
            reconnect_mode: ReconnectMode::None,
            local_participant,
            remote_participants: HashMap::new(),
            active_speakers: Vec::new(),
            permissions,
            pending_attaches: HashMap::new(),
            next_attach_token: 0,
        }
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection_state
    }

    pub fn reconnect_mode(&self) -> ReconnectMode {
        self.reconnect_mode
    }

    pub fn local_participant(&self) -> &Participant {
        &self.local_participant
    }

    pub fn remote_participants(&self) -> &HashMap<ParticipantIdentity, Participant> {
        &self.remote_participants
    }

    pub fn remote_participant(&self, identity: &ParticipantIdentity) -> Option<&Participant> {
        self.remote_participants.get(identity)
    }

    pub fn remote_participant_by_sid(&self, sid: &ParticipantSid) -> Option<&Participant> {
        self.remote_participants.values().find(|p| p.has_sid(sid))
    }

    pub(crate) fn remote_participant_by_sid_mut(
        &mut self,
        sid: &ParticipantSid,
    ) -> Option<&mut Participant> {
        self.remote_participants.values_mut().find(|p| p.has_sid(sid))
    }

    /// Participants from the last speaker update, in notification order
    pub fn active_speakers(&self) -> Vec<Participant> {
        self.active_speakers
            .iter()
            .filter_map(|identity| self.participant(identity))
            .cloned()
            .collect()
    }

    pub fn permissions(&self) -> &TrackSubscriptionPermissions {
        &self.permissions
    }

    /// Look up the local or a remote participant by identity
    pub fn participant(&self, identity: &ParticipantIdentity) -> Option<&Participant> {
        if &self.local_participant.identity == identity {
            Some(&self.local_participant)
        } else {
            self.remote_participants.get(identity)
        }
    }
}

/// Lock-guarded owner of the `RoomState`
#[derive(Debug)]
pub struct StateStore {
    state: RwLock<RoomState>,
}

impl StateStore {
    pub fn new(state: RoomState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Clone the current state
    pub fn snapshot(&self) -> RoomState {
        self.state.read().clone()
    }

    /// Read from a consistent view without cloning the whole state
    pub fn read<R>(&self, f: impl FnOnce(&RoomState) -> R) -> R {
        f(&*self.state.read())
    }

    /// Apply a mutation atomically and return its result.
    ///
    /// Mutations are serialized. `f` must not call back into the store or
    /// notify listeners; do that with the returned value after the lock is
    /// released.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut RoomState) -> R) -> R {
        f(&mut *self.state.write())
    }
}
