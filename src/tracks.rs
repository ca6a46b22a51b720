//! Inbound track attachment
//!
//! A raw track may arrive before the participant update that announces its
//! publication. Owner resolution happens once, from the stream id; attaching
//! to the publication is retried with a fixed delay until the metadata shows
//! up or the retry budget runs out.
//!
//! A resolved track stays pending, keyed by its raw id, until its attach
//! finishes. Removing the track drops the pending entry, and any attempt
//! still in flight then stops without attaching.

use crate::error::{Result, RoomError};
use crate::participant::{Participant, TrackPublication};
use crate::retry::with_retry;
use crate::room::RoomSession;
use crate::types::{parse_stream_id, MediaStream, ParticipantSid, RawTrack, TrackReceiver, TrackSid};

/// Where an inbound track belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TrackTarget {
    pub participant_sid: ParticipantSid,
    pub track_sid: TrackSid,
    /// Pending-attach token registered when the owner was resolved
    pub token: u64,
}

/// Derive the owner and publication of a track from its stream metadata.
///
/// A stream id without a track part falls back to the raw track's own id.
pub(crate) fn resolve_track_target(track: &RawTrack, streams: &[MediaStream]) -> Result<TrackTarget> {
    let stream = streams
        .first()
        .ok_or_else(|| RoomError::InvalidStreamId(String::new()))?;
    let (participant_sid, track_sid) = parse_stream_id(&stream.id)?;

    Ok(TrackTarget {
        participant_sid,
        track_sid: track_sid.unwrap_or_else(|| TrackSid::from(track.id.as_str())),
        token: 0,
    })
}

impl RoomSession {
    /// Resolve the registered participant owning `track`, without retrying.
    ///
    /// On success the track is registered as pending until `attach_track`
    /// finishes with the returned target.
    pub(crate) fn resolve_track_owner(
        &self,
        track: &RawTrack,
        streams: &[MediaStream],
    ) -> Option<TrackTarget> {
        let mut target = match resolve_track_target(track, streams) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(track_id = %track.id, error = %e, "Dropping track with unusable stream");
                return None;
            }
        };

        let token = self.store.mutate(|state| {
            state.remote_participant_by_sid(&target.participant_sid)?;
            state.next_attach_token += 1;
            let token = state.next_attach_token;
            state.pending_attaches.insert(track.id.clone(), token);
            Some(token)
        });
        let Some(token) = token else {
            tracing::warn!(
                participant_sid = %target.participant_sid,
                track_sid = %target.track_sid,
                "Track for unknown participant"
            );
            return None;
        };

        target.token = token;
        Some(target)
    }

    /// Attach `track` to its publication, retrying while the publication is
    /// not known yet
    pub(crate) async fn attach_track(
        &self,
        target: TrackTarget,
        track: RawTrack,
        receiver: TrackReceiver,
    ) {
        let result = with_retry(&self.options.attach_retry, RoomError::is_retryable, |_| {
            std::future::ready(self.try_attach(&target, &track, &receiver))
        })
        .await;

        self.store.mutate(|state| {
            if state.pending_attaches.get(&track.id) == Some(&target.token) {
                state.pending_attaches.remove(&track.id);
            }
        });

        match result {
            Ok(Some((participant, publication))) => {
                tracing::debug!(
                    participant_sid = %target.participant_sid,
                    track_sid = %target.track_sid,
                    "Track subscribed"
                );
                self.delegates.notify(
                    || format!("track_subscribed {}", publication.sid()),
                    |d| d.on_track_subscribed(&participant, &publication),
                );
                participant.delegates().notify(
                    || format!("participant track_subscribed {}", publication.sid()),
                    |d| d.on_track_subscribed(&participant, &publication),
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    participant_sid = %target.participant_sid,
                    track_sid = %target.track_sid,
                    error = %e,
                    "Failed to attach track"
                );
            }
        }
    }

    /// One attach attempt against the current state.
    ///
    /// Returns `Ok(None)` when there is nothing to do: the track was removed
    /// or resolved again, the participant left, or the track is already
    /// attached.
    fn try_attach(
        &self,
        target: &TrackTarget,
        track: &RawTrack,
        receiver: &TrackReceiver,
    ) -> Result<Option<(Participant, TrackPublication)>> {
        self.store.mutate(|state| {
            if state.pending_attaches.get(&track.id) != Some(&target.token) {
                tracing::debug!(track_id = %track.id, "Track removed before attach");
                return Ok(None);
            }
            let Some(participant) = state.remote_participant_by_sid_mut(&target.participant_sid)
            else {
                tracing::debug!(
                    participant_sid = %target.participant_sid,
                    "Participant left before track attached"
                );
                return Ok(None);
            };
            let Some(publication) = participant.publications.get_mut(&target.track_sid) else {
                return Err(RoomError::PublicationNotFound {
                    participant_sid: target.participant_sid.to_string(),
                    track_sid: target.track_sid.to_string(),
                });
            };
            if publication.holds_track(&track.id) {
                return Ok(None);
            }

            publication.attach(track.clone(), receiver.clone());
            let publication = publication.clone();
            Ok(Some((participant.clone(), publication)))
        })
    }

    pub(crate) fn handle_track_removed(&self, track: &RawTrack) {
        let detached = self.store.mutate(|state| {
            state.pending_attaches.remove(&track.id);
            for participant in state.remote_participants.values_mut() {
                let sid = participant
                    .publications
                    .values()
                    .find(|p| p.holds_track(&track.id))
                    .map(|p| p.sid().clone());
                let Some(sid) = sid else {
                    continue;
                };
                if let Some(publication) = participant.publications.get_mut(&sid) {
                    publication.detach();
                    let publication = publication.clone();
                    return Some((participant.clone(), publication));
                }
            }
            None::<(Participant, TrackPublication)>
        });

        let Some((participant, publication)) = detached else {
            tracing::trace!(track_id = %track.id, "Removed track was not attached");
            return;
        };

        tracing::debug!(
            participant = %participant.identity(),
            track_sid = %publication.sid(),
            "Track unsubscribed"
        );
        self.delegates.notify(
            || format!("track_unsubscribed {}", publication.sid()),
            |d| d.on_track_unsubscribed(&participant, &publication),
        );
        participant.delegates().notify(
            || format!("participant track_unsubscribed {}", publication.sid()),
            |d| d.on_track_unsubscribed(&participant, &publication),
        );
    }
}
