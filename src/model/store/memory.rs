use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::{
    common::Winner,
    db::{Meeting, NewMeeting, User},
    mongodb::Id,
    voting::{classify, VotingPhase},
};

use super::MeetingStore;

/// A store that keeps everything in process memory.
///
/// Used by the test suite and for running the server without a database.
/// Every operation takes the relevant lock once, so per-key vote updates and
/// the winner test-and-set are atomic with respect to each other.
#[derive(Default)]
pub struct MemoryMeetingStore {
    meetings: Mutex<BTreeMap<Id, Meeting>>,
    users: Mutex<BTreeMap<String, User>>,
    unavailable: AtomicBool,
}

impl MemoryMeetingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while set, every operation fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable(
                "in-memory store is marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    async fn select<F>(&self, mut predicate: F) -> Result<Vec<Meeting>>
    where
        F: FnMut(&Meeting) -> bool + Send,
    {
        self.check_available()?;
        let mut selected: Vec<Meeting> = self
            .meetings
            .lock()
            .await
            .values()
            .filter(|m| predicate(m))
            .cloned()
            .collect();
        selected.sort_by_key(|m| m.start_time);
        Ok(selected)
    }
}

#[rocket::async_trait]
impl MeetingStore for MemoryMeetingStore {
    async fn find_meetings_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Meeting>> {
        self.select(|m| start <= m.start_time && m.start_time < end)
            .await
    }

    async fn find_meetings_needing_resolution(&self, now: DateTime<Utc>) -> Result<Vec<Meeting>> {
        self.select(|m| m.voting_end_time < now && !m.winner_declared)
            .await
    }

    async fn find_unresolved_meetings(&self) -> Result<Vec<Meeting>> {
        self.select(|m| !m.winner_declared).await
    }

    async fn find_active_meeting(&self, now: DateTime<Utc>) -> Result<Option<Meeting>> {
        let active = self
            .select(|m| m.voting_start_time <= now && now <= m.voting_end_time)
            .await?;
        Ok(active.into_iter().last())
    }

    async fn find_upcoming_meetings(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Meeting>> {
        let mut upcoming = self.select(|m| m.start_time >= now).await?;
        upcoming.truncate(limit);
        Ok(upcoming)
    }

    async fn find_most_recent_meeting(&self, now: DateTime<Utc>) -> Result<Option<Meeting>> {
        let started = self.select(|m| m.start_time < now).await?;
        Ok(started.into_iter().last())
    }

    async fn find_meeting(&self, id: Id) -> Result<Option<Meeting>> {
        self.check_available()?;
        Ok(self.meetings.lock().await.get(&id).cloned())
    }

    async fn insert_meetings(&self, meetings: Vec<NewMeeting>) -> Result<Vec<Meeting>> {
        self.check_available()?;
        let mut stored = self.meetings.lock().await;
        let inserted: Vec<Meeting> = meetings
            .into_iter()
            .map(|meeting| Meeting {
                id: Id::new(),
                meeting,
            })
            .collect();
        for meeting in &inserted {
            stored.insert(meeting.id, meeting.clone());
        }
        Ok(inserted)
    }

    async fn upsert_meeting(&self, meeting: &Meeting) -> Result<()> {
        self.check_available()?;
        let mut stored = self.meetings.lock().await;
        match stored.get_mut(&meeting.id) {
            Some(existing) => {
                existing.meeting_name = meeting.meeting_name.clone();
                existing.start_time = meeting.start_time;
                existing.voting_start_time = meeting.voting_start_time;
                existing.voting_end_time = meeting.voting_end_time;
                existing.participants = meeting.participants.clone();
                existing.updated_at = meeting.updated_at;
            }
            None => {
                stored.insert(meeting.id, meeting.clone());
            }
        }
        Ok(())
    }

    async fn patch_vote(
        &self,
        id: Id,
        voter: &str,
        voted_for: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.check_available()?;
        let mut stored = self.meetings.lock().await;
        let meeting = stored
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("Meeting with ID '{id}'")))?;
        if meeting.winner_declared || classify(meeting, now) != VotingPhase::Active {
            return Ok(false);
        }
        meeting
            .votes
            .insert(voter.to_string(), voted_for.to_string());
        meeting.updated_at = Utc::now();
        Ok(true)
    }

    async fn patch_winner(&self, id: Id, winner: Option<Winner>) -> Result<bool> {
        self.check_available()?;
        let mut stored = self.meetings.lock().await;
        let meeting = stored
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("Meeting with ID '{id}'")))?;
        if meeting.winner_declared {
            return Ok(false);
        }
        meeting.winner = winner;
        meeting.winner_declared = true;
        meeting.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete_meeting(&self, id: Id) -> Result<bool> {
        self.check_available()?;
        Ok(self.meetings.lock().await.remove(&id).is_some())
    }

    async fn list_meetings(&self) -> Result<Vec<Meeting>> {
        self.select(|_| true).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.check_available()?;
        Ok(self.users.lock().await.values().cloned().collect())
    }

    async fn find_user(&self, uid: &str) -> Result<Option<User>> {
        self.check_available()?;
        Ok(self.users.lock().await.get(uid).cloned())
    }

    async fn ensure_user(&self, user: User) -> Result<User> {
        self.check_available()?;
        let mut users = self.users.lock().await;
        Ok(users.entry(user.uid.clone()).or_insert(user).clone())
    }
}
