//! Active-speaker reconciliation

use crate::participant::Participant;
use crate::room::RoomSession;
use crate::state::RoomState;
use crate::types::{ParticipantIdentity, ParticipantSid, SpeakerInfo};
use std::collections::HashSet;

/// Apply a speaker update to `state` and return the speakers, in input order.
///
/// Resolved entries take the supplied level and are marked speaking; every
/// participant not named in the update is reset to silent. Unknown sids are
/// dropped.
pub(crate) fn reconcile(state: &mut RoomState, speakers: &[SpeakerInfo]) -> Vec<Participant> {
    let seen: HashSet<&ParticipantSid> = speakers.iter().map(|s| &s.sid).collect();
    let mut active: Vec<ParticipantIdentity> = Vec::with_capacity(speakers.len());

    for speaker in speakers {
        let participant = if state.local_participant.has_sid(&speaker.sid) {
            Some(&mut state.local_participant)
        } else {
            state.remote_participant_by_sid_mut(&speaker.sid)
        };

        match participant {
            Some(participant) => {
                participant.set_speaking(speaker.level);
                if !active.contains(&participant.identity) {
                    active.push(participant.identity.clone());
                }
            }
            None => {
                tracing::trace!(participant_sid = %speaker.sid, "Dropping unknown speaker");
            }
        }
    }

    let silent = std::iter::once(&mut state.local_participant)
        .chain(state.remote_participants.values_mut())
        .filter(|p| p.sid.as_ref().map_or(true, |sid| !seen.contains(sid)));
    for participant in silent {
        participant.reset_speaking();
    }

    state.active_speakers = active;
    state.active_speakers()
}

impl RoomSession {
    pub(crate) fn handle_speakers_updated(&self, speakers: &[SpeakerInfo]) {
        let active = self.store.mutate(|state| reconcile(state, speakers));
        tracing::debug!(
            reported = speakers.len(),
            active = active.len(),
            "Active speakers updated"
        );

        if !self.engine.state().connection_state.is_connected() {
            return;
        }

        self.delegates.notify(
            || format!("active_speakers_changed ({})", active.len()),
            |d| d.on_active_speakers_changed(&active),
        );
    }
}
