//! The meeting record store: everything the voting engine needs from
//! persistence, independent of the database behind it.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    common::Winner,
    db::{Meeting, NewMeeting, User},
    mongodb::Id,
};

mod memory;

pub use memory::MemoryMeetingStore;

/// Shared handle on whichever store the application was built with.
pub type Store = Arc<dyn MeetingStore>;

#[rocket::async_trait]
pub trait MeetingStore: Send + Sync {
    /// Meetings with `start <= start_time < end`, ascending by start time.
    async fn find_meetings_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Meeting>>;

    /// Meetings whose voting ended before `now` and that have no declared winner.
    async fn find_meetings_needing_resolution(&self, now: DateTime<Utc>) -> Result<Vec<Meeting>>;

    /// Every meeting without a declared winner, past or future.
    async fn find_unresolved_meetings(&self) -> Result<Vec<Meeting>>;

    /// The meeting whose voting window contains `now`.
    /// If several do, the most recently started one.
    async fn find_active_meeting(&self, now: DateTime<Utc>) -> Result<Option<Meeting>>;

    /// The next `limit` meetings starting at or after `now`, ascending.
    async fn find_upcoming_meetings(&self, now: DateTime<Utc>, limit: usize)
        -> Result<Vec<Meeting>>;

    /// The latest meeting that started before `now`.
    async fn find_most_recent_meeting(&self, now: DateTime<Utc>) -> Result<Option<Meeting>>;

    async fn find_meeting(&self, id: Id) -> Result<Option<Meeting>>;

    /// Insert new meetings, returning them with their assigned IDs, in input order.
    async fn insert_meetings(&self, meetings: Vec<NewMeeting>) -> Result<Vec<Meeting>>;

    /// Create or update a meeting's schedule and details.
    ///
    /// The ledger, winner and declaration flag of an existing record are left
    /// untouched; they are only written on insert.
    async fn upsert_meeting(&self, meeting: &Meeting) -> Result<()>;

    /// Set a single voter's ledger entry, leaving every other entry as it is.
    ///
    /// The write only happens while the stored voting window contains `now`
    /// and no winner has been declared. Returns whether it happened.
    async fn patch_vote(
        &self,
        id: Id,
        voter: &str,
        voted_for: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Commit a winner iff none has been declared yet.
    /// Returns whether this call made the declaration.
    async fn patch_winner(&self, id: Id, winner: Option<Winner>) -> Result<bool>;

    /// Returns whether a meeting was deleted.
    async fn delete_meeting(&self, id: Id) -> Result<bool>;

    async fn list_meetings(&self) -> Result<Vec<Meeting>>;

    async fn list_users(&self) -> Result<Vec<User>>;

    async fn find_user(&self, uid: &str) -> Result<Option<User>>;

    /// Insert the user if no record with that UID exists. Returns the stored record.
    async fn ensure_user(&self, user: User) -> Result<User>;
}

/// Helper for looking a meeting up by ID and turning absence into an error.
pub async fn meeting_by_id(store: &dyn MeetingStore, id: Id) -> Result<Meeting> {
    store
        .find_meeting(id)
        .await?
        .ok_or_else(|| crate::error::Error::not_found(format!("Meeting with ID '{id}'")))
}

