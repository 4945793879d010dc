use chrono::{serde::ts_milliseconds_option, DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{Identity, Winner},
    db::Meeting,
    voting::{classify, vote_of, SweepReport, VotingPhase},
};

use super::meeting::MeetingDescription;

/// A request to cast, or change, the caller's vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub voted_for: Identity,
}

/// Everything a client needs to render the voting screen for one meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingStatus {
    pub meeting: MeetingDescription,
    pub phase: VotingPhase,
    /// When the phase next changes, if it ever does.
    #[serde(with = "ts_milliseconds_option")]
    pub countdown_target: Option<DateTime<Utc>>,
    pub my_vote: Option<Identity>,
    pub has_voted: bool,
}

impl VotingStatus {
    /// The status of `meeting` at `now`, as seen by `caller`.
    pub fn new(meeting: Meeting, caller: &str, now: DateTime<Utc>) -> Self {
        let phase = classify(&meeting, now);
        let countdown_target = phase.countdown_target(&meeting);
        let my_vote = vote_of(&meeting, caller).map(str::to_string);
        Self {
            meeting: MeetingDescription::new(meeting, now),
            phase,
            countdown_target,
            has_voted: my_vote.is_some(),
            my_vote,
        }
    }
}

/// A meeting declared by a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredMeeting {
    pub id: String,
    pub winner: Option<Winner>,
}

/// The outcome of an on-demand resolution sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepDescription {
    pub declared: Vec<DeclaredMeeting>,
    pub already_declared: usize,
    pub deferred: usize,
    /// Meetings that could not be resolved, with the reason.
    pub failed: Vec<(String, String)>,
}

impl From<SweepReport> for SweepDescription {
    fn from(report: SweepReport) -> Self {
        Self {
            declared: report
                .declared
                .into_iter()
                .map(|(id, winner)| DeclaredMeeting {
                    id: id.to_string(),
                    winner,
                })
                .collect(),
            already_declared: report.already_declared,
            deferred: report.deferred,
            failed: report
                .failed
                .into_iter()
                .map(|(id, reason)| (id.to_string(), reason))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use rocket::serde::json::serde_json;

    use crate::model::db::meeting::examples::{nine_am, ALEX, DAVE, RICK};
    use crate::model::{db::MeetingCore, mongodb::Id};

    fn meeting() -> Meeting {
        Meeting {
            id: Id::new(),
            meeting: MeetingCore::example().with_votes(&[(RICK, DAVE)]),
        }
    }

    #[test]
    fn status_for_voter() {
        let status = VotingStatus::new(meeting(), RICK, nine_am());
        assert_eq!(status.phase, VotingPhase::Active);
        assert_eq!(status.countdown_target, Some(nine_am() + Duration::minutes(5)));
        assert_eq!(status.my_vote.as_deref(), Some(DAVE));
        assert!(status.has_voted);

        let status = VotingStatus::new(meeting(), ALEX, nine_am());
        assert_eq!(status.my_vote, None);
        assert!(!status.has_voted);
    }

    #[test]
    fn status_after_voting() {
        let status = VotingStatus::new(meeting(), RICK, nine_am() + Duration::hours(1));
        assert_eq!(status.phase, VotingPhase::Ended);
        let json = serde_json::to_value(&status).unwrap();
        assert!(json["countdown_target"].is_null());
    }

    #[test]
    fn sweep_ids_are_hex() {
        let id = Id::new();
        let report = SweepReport {
            declared: vec![(id, Some(Winner::Single(DAVE.to_string())))],
            already_declared: 1,
            deferred: 0,
            failed: Vec::new(),
        };
        let desc = SweepDescription::from(report);
        assert_eq!(desc.declared[0].id, id.to_string());
        assert_eq!(desc.already_declared, 1);
    }
}
