//! Remote participant registry
//!
//! Participant updates from the server create, update or remove remote
//! participants. Each update is applied to the state in one mutation; the
//! notifications it implies are dispatched afterwards from the returned
//! outcome.

use crate::participant::{Participant, PublicationChanges, TrackPublication};
use crate::room::RoomSession;
use crate::state::RoomState;
use crate::types::{ParticipantInfo, ParticipantStatus};

/// What a single participant update did to the registry
#[derive(Debug)]
enum UpdateOutcome {
    /// Update addressed to the local participant
    Local,
    Connected(Participant),
    Updated {
        participant: Participant,
        changes: PublicationChanges,
    },
    Disconnected(Participant),
    /// Departure of a participant that was never registered
    Ignored,
}

fn apply_update(state: &mut RoomState, info: &ParticipantInfo) -> UpdateOutcome {
    let local = &mut state.local_participant;
    if local.has_sid(&info.sid) || local.identity == info.identity {
        local.update_from_info(info);
        return UpdateOutcome::Local;
    }

    if info.state == ParticipantStatus::Disconnected {
        return match state.remote_participants.remove(&info.identity) {
            Some(participant) => {
                state.active_speakers.retain(|identity| identity != &info.identity);
                UpdateOutcome::Disconnected(participant)
            }
            None => UpdateOutcome::Ignored,
        };
    }

    match state.remote_participants.get_mut(&info.identity) {
        Some(participant) => {
            let changes = participant.update_from_info(info);
            UpdateOutcome::Updated {
                participant: participant.clone(),
                changes,
            }
        }
        None => {
            let participant = Participant::remote(info);
            state
                .remote_participants
                .insert(info.identity.clone(), participant.clone());
            UpdateOutcome::Connected(participant)
        }
    }
}

fn sorted_publications(participant: &Participant) -> Vec<TrackPublication> {
    let mut publications: Vec<TrackPublication> =
        participant.track_publications().values().cloned().collect();
    publications.sort_by(|a, b| a.sid().cmp(b.sid()));
    publications
}

impl RoomSession {
    pub(crate) fn handle_participant_update(&self, updates: &[ParticipantInfo]) {
        for info in updates {
            let outcome = self.store.mutate(|state| apply_update(state, info));

            match outcome {
                UpdateOutcome::Local => {
                    tracing::debug!(participant_sid = %info.sid, "Local participant updated");
                }
                UpdateOutcome::Connected(participant) => {
                    tracing::info!(
                        participant = %participant.identity(),
                        participant_sid = %info.sid,
                        "Participant connected"
                    );
                    self.delegates.notify(
                        || format!("participant_connected {}", participant.identity()),
                        |d| d.on_participant_connected(&participant),
                    );
                    for publication in sorted_publications(&participant) {
                        self.notify_published(&participant, &publication);
                    }
                }
                UpdateOutcome::Updated {
                    participant,
                    mut changes,
                } => {
                    changes.published.sort_by(|a, b| a.sid().cmp(b.sid()));
                    changes.unpublished.sort_by(|a, b| a.sid().cmp(b.sid()));
                    for publication in &changes.published {
                        self.notify_published(&participant, publication);
                    }
                    for publication in changes.unpublished {
                        self.notify_unpublished(&participant, publication);
                    }
                }
                UpdateOutcome::Disconnected(participant) => {
                    tracing::info!(
                        participant = %participant.identity(),
                        participant_sid = %info.sid,
                        "Participant disconnected"
                    );
                    for publication in sorted_publications(&participant) {
                        self.notify_unpublished(&participant, publication);
                    }
                    self.delegates.notify(
                        || format!("participant_disconnected {}", participant.identity()),
                        |d| d.on_participant_disconnected(&participant),
                    );
                }
                UpdateOutcome::Ignored => {
                    tracing::trace!(participant_sid = %info.sid, "Unknown participant left");
                }
            }
        }
    }

    fn notify_published(&self, participant: &Participant, publication: &TrackPublication) {
        self.delegates.notify(
            || format!("track_published {}", publication.sid()),
            |d| d.on_track_published(participant, publication),
        );
    }

    /// Unsubscribe (if attached) and unpublish a publication that went away
    fn notify_unpublished(&self, participant: &Participant, mut publication: TrackPublication) {
        if publication.is_subscribed() {
            self.delegates.notify(
                || format!("track_unsubscribed {}", publication.sid()),
                |d| d.on_track_unsubscribed(participant, &publication),
            );
            participant.delegates().notify(
                || format!("participant track_unsubscribed {}", publication.sid()),
                |d| d.on_track_unsubscribed(participant, &publication),
            );
            publication.detach();
        }

        self.delegates.notify(
            || format!("track_unpublished {}", publication.sid()),
            |d| d.on_track_unpublished(participant, &publication),
        );
    }
}
