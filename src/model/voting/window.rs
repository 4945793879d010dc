use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::db::MeetingCore;

/// Where a meeting is in its voting lifecycle.
///
/// Never stored: always recomputed from the stored window and the current time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingPhase {
    /// Voting has not opened yet.
    NotStarted,
    /// Votes are being accepted.
    Active,
    /// Voting has closed. Terminal.
    Ended,
}

/// Classify `now` against the meeting's voting window. Both bounds are inclusive.
pub fn classify(meeting: &MeetingCore, now: DateTime<Utc>) -> VotingPhase {
    if now < meeting.voting_start_time {
        VotingPhase::NotStarted
    } else if now <= meeting.voting_end_time {
        VotingPhase::Active
    } else {
        VotingPhase::Ended
    }
}

impl VotingPhase {
    /// The next instant at which the phase changes, if any.
    pub fn countdown_target(self, meeting: &MeetingCore) -> Option<DateTime<Utc>> {
        match self {
            Self::NotStarted => Some(meeting.voting_start_time),
            Self::Active => Some(meeting.voting_end_time),
            Self::Ended => None,
        }
    }
}
