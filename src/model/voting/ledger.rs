use chrono::{DateTime, Utc};
use log::debug;

use crate::error::{Error, Result};
use crate::model::{
    db::{Meeting, MeetingCore},
    store::MeetingStore,
};

use super::{classify, VotingPhase, VotingPolicy};

/// Check that `voter` may vote for `voted_for` in this meeting at `now`.
pub fn check_vote(
    meeting: &Meeting,
    voter: &str,
    voted_for: &str,
    now: DateTime<Utc>,
    policy: &VotingPolicy,
) -> Result<()> {
    if meeting.winner_declared || classify(meeting, now) != VotingPhase::Active {
        return Err(Error::WindowClosed(meeting.id));
    }
    for identity in [voter, voted_for] {
        if !meeting.is_participant(identity) {
            return Err(Error::NotParticipant {
                meeting: meeting.id,
                identity: identity.to_string(),
            });
        }
    }
    if voter == voted_for && !policy.allow_self_vote {
        return Err(Error::SelfVote(voter.to_string()));
    }
    Ok(())
}

/// Record `voter`'s choice, replacing any earlier one.
///
/// Only the voter's own ledger entry is written, so concurrent votes by
/// other participants are never lost. The store re-checks the window and the
/// declaration at write time, so a stale `meeting` cannot reopen the ledger.
pub async fn cast_vote(
    store: &dyn MeetingStore,
    meeting: &Meeting,
    voter: &str,
    voted_for: &str,
    now: DateTime<Utc>,
    policy: &VotingPolicy,
) -> Result<()> {
    check_vote(meeting, voter, voted_for, now, policy)?;
    if let Some(previous) = vote_of(meeting, voter) {
        debug!("{voter} is changing their vote in meeting {} from {previous}", meeting.id);
    }
    if !store.patch_vote(meeting.id, voter, voted_for, now).await? {
        return Err(Error::WindowClosed(meeting.id));
    }
    debug!("Recorded vote by {voter} in meeting {}", meeting.id);
    Ok(())
}

pub fn has_voted(meeting: &MeetingCore, voter: &str) -> bool {
    meeting.votes.contains_key(voter)
}

/// Who `voter` currently has their vote on.
pub fn vote_of<'m>(meeting: &'m MeetingCore, voter: &str) -> Option<&'m str> {
    meeting.votes.get(voter).map(String::as_str)
}
