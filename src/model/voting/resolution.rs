use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use log::{debug, error, info};

use crate::error::{Error, Result};
use crate::model::{
    common::{Identity, Winner},
    db::{Meeting, MeetingCore},
    mongodb::Id,
    store::{meeting_by_id, MeetingStore},
};

use super::{classify, VotingPhase, VotingPolicy};

/// What happened when a meeting was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// This call committed the outcome. `None` means nobody received a vote.
    Declared(Option<Winner>),
    /// An outcome had already been committed; it is returned unchanged.
    AlreadyDeclared(Option<Winner>),
    /// Nobody voted and the policy leaves such meetings for a later sweep.
    Deferred,
}

impl Resolution {
    /// The outcome now on record, if one is.
    pub fn winner(&self) -> Option<&Winner> {
        match self {
            Self::Declared(winner) | Self::AlreadyDeclared(winner) => winner.as_ref(),
            Self::Deferred => None,
        }
    }
}

/// Count the votes each participant received.
pub fn tally(meeting: &MeetingCore) -> BTreeMap<&str, u32> {
    let mut counts = BTreeMap::new();
    for voted_for in meeting.votes.values() {
        *counts.entry(voted_for.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Everyone with the highest vote count. A tie is returned whole.
pub fn determine_winner(meeting: &MeetingCore) -> Option<Winner> {
    let counts = tally(meeting);
    let max_votes = counts.values().copied().max()?;
    let candidates: BTreeSet<Identity> = counts
        .into_iter()
        .filter(|(_, count)| *count == max_votes)
        .map(|(identity, _)| identity.to_string())
        .collect();
    Winner::from_candidates(candidates)
}

/// Resolve a meeting whose voting has ended. Safe to call any number of
/// times, concurrently: at most one call ever commits an outcome.
pub async fn resolve_winner(
    store: &dyn MeetingStore,
    meeting: &Meeting,
    now: DateTime<Utc>,
    policy: &VotingPolicy,
) -> Result<Resolution> {
    if classify(meeting, now) != VotingPhase::Ended {
        return Err(Error::VotingNotEnded(meeting.id));
    }
    if meeting.winner_declared {
        return Ok(Resolution::AlreadyDeclared(meeting.winner.clone()));
    }

    let winner = determine_winner(meeting);
    if winner.is_none() && policy.retry_empty_meetings {
        debug!("Meeting {} has no votes, leaving it for a later sweep", meeting.id);
        return Ok(Resolution::Deferred);
    }

    if store.patch_winner(meeting.id, winner.clone()).await? {
        match &winner {
            Some(winner) => info!("Declared winner for meeting {}: {winner:?}", meeting.id),
            None => info!("Meeting {} ended with no votes", meeting.id),
        }
        Ok(Resolution::Declared(winner))
    } else {
        // Somebody else got there first; report what they committed.
        let stored = meeting_by_id(store, meeting.id).await?;
        debug!("Meeting {} was already resolved concurrently", meeting.id);
        Ok(Resolution::AlreadyDeclared(stored.meeting.winner))
    }
}

/// Summary of a resolution sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Meetings this sweep declared, with their outcome.
    pub declared: Vec<(Id, Option<Winner>)>,
    /// Meetings resolved by somebody else while the sweep ran.
    pub already_declared: usize,
    /// Empty meetings left for a later sweep.
    pub deferred: usize,
    /// Meetings that could not be resolved, with the reason.
    pub failed: Vec<(Id, String)>,
}

/// Resolve every meeting whose voting has ended without a declared winner.
///
/// A failure on one meeting does not stop the others; failures are logged
/// and reported. Only the initial query failing aborts the sweep.
pub async fn resolve_pending(
    store: &dyn MeetingStore,
    now: DateTime<Utc>,
    policy: &VotingPolicy,
) -> Result<SweepReport> {
    let pending = store.find_meetings_needing_resolution(now).await?;
    debug!("Resolution sweep found {} pending meetings", pending.len());

    let mut report = SweepReport::default();
    for meeting in pending {
        match resolve_winner(store, &meeting, now, policy).await {
            Ok(Resolution::Declared(winner)) => report.declared.push((meeting.id, winner)),
            Ok(Resolution::AlreadyDeclared(_)) => report.already_declared += 1,
            Ok(Resolution::Deferred) => report.deferred += 1,
            Err(e) => {
                error!("Failed to resolve meeting {}: {e}", meeting.id);
                report.failed.push((meeting.id, e.to_string()));
            }
        }
    }

    if !report.declared.is_empty() || !report.failed.is_empty() {
        info!(
            "Resolution sweep declared {} meetings, {} failed",
            report.declared.len(),
            report.failed.len()
        );
    }
    Ok(report)
}
