use std::collections::{BTreeMap, BTreeSet};

use chrono::{
    serde::{ts_milliseconds, ts_milliseconds_option},
    DateTime, FixedOffset, Utc,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    common::{Identity, Winner},
    db::{Meeting, NewMeeting},
    voting::{classify, expand, MeetingTemplate, RepeatRule, VotingPhase},
};

fn once() -> RepeatRule {
    RepeatRule::Once
}

fn one() -> u32 {
    1
}

/// A request to schedule a meeting, possibly recurring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingSpec {
    pub meeting_name: String,
    pub participants: BTreeSet<Identity>,
    /// Start of the first occurrence.
    #[serde(with = "ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(default = "once")]
    pub repeat: RepeatRule,
    #[serde(default = "one")]
    pub occurrences: u32,
}

impl MeetingSpec {
    /// Expand into meetings, doing calendar arithmetic at the given offset.
    pub fn expand(&self, offset: &FixedOffset, now: DateTime<Utc>) -> Result<Vec<NewMeeting>> {
        let template = MeetingTemplate {
            meeting_name: self.meeting_name.clone(),
            participants: self.participants.clone(),
        };
        expand(
            &template,
            self.repeat,
            self.occurrences,
            self.start_time.with_timezone(offset),
            now,
        )
    }
}

/// Changes to an existing meeting. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingEdit {
    #[serde(default)]
    pub meeting_name: Option<String>,
    #[serde(default)]
    pub participants: Option<BTreeSet<Identity>>,
    #[serde(default, with = "ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
}

impl MeetingEdit {
    /// Apply the edit. Returns whether the schedule moved.
    ///
    /// Nothing is changed unless every field is valid.
    pub fn apply(self, meeting: &mut Meeting, now: DateTime<Utc>) -> Result<bool> {
        let mut edited = meeting.meeting.clone();
        if let Some(name) = self.meeting_name {
            edited.rename(name, now)?;
        }
        if let Some(participants) = self.participants {
            edited.set_participants(participants, now)?;
        }
        let moved = match self.start_time {
            Some(start_time) if start_time != edited.start_time => {
                edited.reschedule(start_time, now);
                true
            }
            _ => false,
        };
        meeting.meeting = edited;
        Ok(moved)
    }
}

/// A meeting as presented to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingDescription {
    pub id: String,
    pub meeting_name: String,
    #[serde(with = "ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub voting_start_time: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub voting_end_time: DateTime<Utc>,
    pub participants: BTreeSet<Identity>,
    pub votes: BTreeMap<Identity, Identity>,
    pub winner: Option<Winner>,
    pub winner_declared: bool,
    /// The voting phase at the time of the request.
    pub phase: VotingPhase,
}

impl MeetingDescription {
    pub fn new(meeting: Meeting, now: DateTime<Utc>) -> Self {
        let phase = classify(&meeting, now);
        Self {
            id: meeting.id.to_string(),
            phase,
            meeting_name: meeting.meeting.meeting_name,
            start_time: meeting.meeting.start_time,
            voting_start_time: meeting.meeting.voting_start_time,
            voting_end_time: meeting.meeting.voting_end_time,
            participants: meeting.meeting.participants,
            votes: meeting.meeting.votes,
            winner: meeting.meeting.winner,
            winner_declared: meeting.meeting.winner_declared,
        }
    }
}

#[cfg(test)]
pub(crate) mod examples {
    use super::*;

    use crate::model::db::meeting::examples::{ALEX, ANNE, DAVE, RICK};

    impl MeetingSpec {
        pub fn example(start_time: DateTime<Utc>) -> Self {
            Self {
                meeting_name: "Daily standup".to_string(),
                participants: [RICK, DAVE, ALEX, ANNE].map(String::from).into_iter().collect(),
                start_time,
                repeat: RepeatRule::Once,
                occurrences: 1,
            }
        }
    }
}
