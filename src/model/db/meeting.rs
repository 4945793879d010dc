use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{Identity, Winner},
    mongodb::{serde_escaped_map, Id},
};

/// How long before and after the start time voting stays open.
pub const VOTING_PADDING_MINUTES: i64 = 5;

/// The voting window for a meeting starting at `start_time`.
pub fn voting_window(start_time: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let padding = Duration::minutes(VOTING_PADDING_MINUTES);
    (start_time - padding, start_time + padding)
}

/// Core meeting data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct MeetingCore {
    /// Display label.
    pub meeting_name: String,
    /// When the meeting begins.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Voting opens. Stored explicitly, only recomputed by [`MeetingCore::reschedule`].
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voting_start_time: DateTime<Utc>,
    /// Voting closes (inclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voting_end_time: DateTime<Utc>,
    /// Who may vote and be voted for.
    pub participants: BTreeSet<Identity>,
    /// The ledger: voter -> voted-for.
    #[serde(default, with = "serde_escaped_map")]
    pub votes: BTreeMap<Identity, Identity>,
    /// The declared outcome, if any.
    #[serde(default)]
    pub winner: Option<Winner>,
    /// Set exactly once, by the resolution that commits `winner`.
    #[serde(default)]
    pub winner_declared: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// A meeting without an ID.
pub type NewMeeting = MeetingCore;

impl MeetingCore {
    /// Create a fresh, unresolved meeting with its voting window derived from `start_time`.
    pub fn new(
        meeting_name: impl Into<String>,
        start_time: DateTime<Utc>,
        participants: impl IntoIterator<Item = Identity>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let meeting_name = validate_name(meeting_name.into())?;
        let participants = validate_participants(participants)?;
        let (voting_start_time, voting_end_time) = voting_window(start_time);
        Ok(Self {
            meeting_name,
            start_time,
            voting_start_time,
            voting_end_time,
            participants,
            votes: BTreeMap::new(),
            winner: None,
            winner_declared: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Move the meeting, overwriting the stored voting window.
    pub fn reschedule(&mut self, start_time: DateTime<Utc>, now: DateTime<Utc>) {
        let (voting_start_time, voting_end_time) = voting_window(start_time);
        self.start_time = start_time;
        self.voting_start_time = voting_start_time;
        self.voting_end_time = voting_end_time;
        self.updated_at = now;
    }

    pub fn rename(&mut self, meeting_name: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        self.meeting_name = validate_name(meeting_name.into())?;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_participants(
        &mut self,
        participants: impl IntoIterator<Item = Identity>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.participants = validate_participants(participants)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_participant(&self, identity: &str) -> bool {
        self.participants.contains(identity)
    }
}

fn validate_name(name: String) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidMeeting("meeting name is empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn validate_participants(
    participants: impl IntoIterator<Item = Identity>,
) -> Result<BTreeSet<Identity>> {
    let participants: BTreeSet<Identity> = participants
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if participants.is_empty() {
        return Err(Error::InvalidMeeting(
            "at least one participant is required".to_string(),
        ));
    }
    Ok(participants)
}

/// A meeting from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Meeting {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub meeting: MeetingCore,
}

impl Deref for Meeting {
    type Target = MeetingCore;

    fn deref(&self) -> &Self::Target {
        &self.meeting
    }
}

impl DerefMut for Meeting {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.meeting
    }
}

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use super::*;

    use chrono::TimeZone;

    pub const RICK: &str = "rick@example.com";
    pub const DAVE: &str = "dave@example.com";
    pub const ALEX: &str = "alex@example.com";
    pub const ANNE: &str = "anne@example.com";

    /// 2024-01-01 09:00 UTC.
    pub fn nine_am() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    impl MeetingCore {
        pub fn example_at(start_time: DateTime<Utc>) -> Self {
            Self::new(
                "Daily standup",
                start_time,
                [RICK, DAVE, ALEX, ANNE].map(String::from),
                start_time - Duration::days(1),
            )
            .unwrap()
        }

        pub fn example() -> Self {
            Self::example_at(nine_am())
        }

        /// Add ledger entries directly, bypassing window checks.
        pub fn with_votes(mut self, votes: &[(&str, &str)]) -> Self {
            for (voter, voted_for) in votes {
                self.votes.insert(voter.to_string(), voted_for.to_string());
            }
            self
        }
    }

    impl Meeting {
        pub fn example() -> Self {
            Self {
                id: Id::new(),
                meeting: MeetingCore::example(),
            }
        }
    }
}
