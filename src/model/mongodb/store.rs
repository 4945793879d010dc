use chrono::{DateTime, Utc};
use log::{debug, warn};
use mongodb::{
    bson::{doc, Bson, DateTime as BsonDateTime, Document},
    options::{FindOneOptions, FindOptions, UpdateOptions},
    Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    common::Winner,
    db::{Meeting, NewMeeting, User},
    store::MeetingStore,
};

use super::{errors::is_duplicate_key_error, escape_key, vote_field_path, Coll, Id};

/// Matches records whose winner has not been declared. Records written
/// before the flag existed count as undeclared.
fn undeclared() -> Bson {
    Bson::Document(doc! { "$ne": true })
}

fn bson_time(time: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_chrono(time)
}

pub(crate) fn range_filter(start: DateTime<Utc>, end: DateTime<Utc>) -> Document {
    doc! {
        "start_time": { "$gte": bson_time(start), "$lt": bson_time(end) },
    }
}

pub(crate) fn needing_resolution_filter(now: DateTime<Utc>) -> Document {
    doc! {
        "voting_end_time": { "$lt": bson_time(now) },
        "winner_declared": undeclared(),
    }
}

pub(crate) fn active_filter(now: DateTime<Utc>) -> Document {
    doc! {
        "voting_start_time": { "$lte": bson_time(now) },
        "voting_end_time": { "$gte": bson_time(now) },
    }
}

/// Only matches while the ledger is open: inside the window and undeclared.
pub(crate) fn vote_filter(id: Id, now: DateTime<Utc>) -> Document {
    let mut filter = id.as_doc();
    filter.extend(active_filter(now));
    filter.insert("winner_declared", undeclared());
    filter
}

/// Set one voter's ledger entry without touching any other.
pub(crate) fn vote_update(voter: &str, voted_for: &str, now: DateTime<Utc>) -> Document {
    let mut set = Document::new();
    set.insert(vote_field_path(voter), voted_for);
    set.insert("updated_at", bson_time(now));
    doc! { "$set": set }
}

/// Only matches while no winner has been declared, making the write a test-and-set.
pub(crate) fn winner_filter(id: Id) -> Document {
    let mut filter = id.as_doc();
    filter.insert("winner_declared", undeclared());
    filter
}

pub(crate) fn winner_update(winner: Option<Winner>, now: DateTime<Utc>) -> Document {
    doc! {
        "$set": {
            "winner": winner,
            "winner_declared": true,
            "updated_at": bson_time(now),
        },
    }
}

/// Schedule and details are overwritten; the ledger and outcome are only
/// written when the record is created.
pub(crate) fn upsert_update(meeting: &Meeting) -> Document {
    let participants: Vec<String> = meeting.participants.iter().cloned().collect();
    let mut votes = Document::new();
    for (voter, voted_for) in &meeting.votes {
        votes.insert(escape_key(voter), voted_for.clone());
    }
    doc! {
        "$set": {
            "meeting_name": meeting.meeting_name.clone(),
            "start_time": bson_time(meeting.start_time),
            "voting_start_time": bson_time(meeting.voting_start_time),
            "voting_end_time": bson_time(meeting.voting_end_time),
            "participants": participants,
            "updated_at": bson_time(meeting.updated_at),
        },
        "$setOnInsert": {
            "votes": votes,
            "winner": meeting.winner.clone(),
            "winner_declared": meeting.winner_declared,
            "created_at": bson_time(meeting.created_at),
        },
    }
}

fn by_start(direction: i32) -> Document {
    doc! { "start_time": direction }
}

/// The production store, backed by MongoDB.
#[derive(Clone)]
pub struct MongoMeetingStore {
    meetings: Coll<Meeting>,
    new_meetings: Coll<NewMeeting>,
    users: Coll<User>,
}

impl MongoMeetingStore {
    pub fn new(db: &Database) -> Self {
        Self {
            meetings: Coll::from_db(db),
            new_meetings: Coll::from_db(db),
            users: Coll::from_db(db),
        }
    }

    async fn find_sorted(&self, filter: Document) -> Result<Vec<Meeting>> {
        let options = FindOptions::builder().sort(by_start(1)).build();
        Ok(self
            .meetings
            .find(filter, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn find_latest(&self, filter: Document) -> Result<Option<Meeting>> {
        let options = FindOneOptions::builder().sort(by_start(-1)).build();
        Ok(self.meetings.find_one(filter, options).await?)
    }
}

#[rocket::async_trait]
impl MeetingStore for MongoMeetingStore {
    async fn find_meetings_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Meeting>> {
        self.find_sorted(range_filter(start, end)).await
    }

    async fn find_meetings_needing_resolution(&self, now: DateTime<Utc>) -> Result<Vec<Meeting>> {
        self.find_sorted(needing_resolution_filter(now)).await
    }

    async fn find_unresolved_meetings(&self) -> Result<Vec<Meeting>> {
        self.find_sorted(doc! { "winner_declared": undeclared() })
            .await
    }

    async fn find_active_meeting(&self, now: DateTime<Utc>) -> Result<Option<Meeting>> {
        self.find_latest(active_filter(now)).await
    }

    async fn find_upcoming_meetings(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Meeting>> {
        let filter = doc! { "start_time": { "$gte": bson_time(now) } };
        let options = FindOptions::builder()
            .sort(by_start(1))
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();
        Ok(self
            .meetings
            .find(filter, options)
            .await?
            .try_collect()
            .await?)
    }

    async fn find_most_recent_meeting(&self, now: DateTime<Utc>) -> Result<Option<Meeting>> {
        self.find_latest(doc! { "start_time": { "$lt": bson_time(now) } })
            .await
    }

    async fn find_meeting(&self, id: Id) -> Result<Option<Meeting>> {
        Ok(self.meetings.find_one(id.as_doc(), None).await?)
    }

    async fn insert_meetings(&self, meetings: Vec<NewMeeting>) -> Result<Vec<Meeting>> {
        if meetings.is_empty() {
            return Ok(Vec::new());
        }
        let result = self.new_meetings.insert_many(&meetings, None).await?;
        meetings
            .into_iter()
            .enumerate()
            .map(|(index, meeting)| {
                let id = result
                    .inserted_ids
                    .get(&index)
                    .and_then(Bson::as_object_id)
                    .ok_or_else(|| {
                        Error::StoreUnavailable(format!("No ID returned for meeting {index}"))
                    })?;
                Ok(Meeting {
                    id: id.into(),
                    meeting,
                })
            })
            .collect()
    }

    async fn upsert_meeting(&self, meeting: &Meeting) -> Result<()> {
        let options = UpdateOptions::builder().upsert(true).build();
        let result = self
            .meetings
            .update_one(meeting.id.as_doc(), upsert_update(meeting), options)
            .await?;
        if result.upserted_id.is_some() {
            debug!("Inserted meeting {} by upsert", meeting.id);
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
        let result = self
            .meetings
            .update_one(vote_filter(id, now), vote_update(voter, voted_for, Utc::now()), None)
            .await?;
        if result.matched_count == 1 {
            return Ok(true);
        }
        // Either the ledger is closed, or the meeting is gone.
        match self.find_meeting(id).await? {
            Some(_) => Ok(false),
            None => Err(Error::not_found(format!("Meeting with ID '{id}'"))),
        }
    }

    async fn patch_winner(&self, id: Id, winner: Option<Winner>) -> Result<bool> {
        let result = self
            .meetings
            .update_one(winner_filter(id), winner_update(winner, Utc::now()), None)
            .await?;
        if result.matched_count == 1 {
            return Ok(true);
        }
        // Either somebody else declared first, or the meeting is gone.
        match self.find_meeting(id).await? {
            Some(_) => Ok(false),
            None => Err(Error::not_found(format!("Meeting with ID '{id}'"))),
        }
    }

    async fn delete_meeting(&self, id: Id) -> Result<bool> {
        let result = self.meetings.delete_one(id.as_doc(), None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn list_meetings(&self) -> Result<Vec<Meeting>> {
        self.find_sorted(doc! {}).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.find(None, None).await?.try_collect().await?)
    }

    async fn find_user(&self, uid: &str) -> Result<Option<User>> {
        Ok(self.users.find_one(doc! { "_id": uid }, None).await?)
    }

    async fn ensure_user(&self, user: User) -> Result<User> {
        if let Some(existing) = self.find_user(&user.uid).await? {
            return Ok(existing);
        }
        match self.users.insert_one(&user, None).await {
            Ok(_) => {
                debug!("Created user record for {}", user.email);
                Ok(user)
            }
            // Lost a race with a concurrent first sign-in.
            Err(e) if is_duplicate_key_error(&e) => {
                warn!("User {} was created concurrently", user.uid);
                self.find_user(&user.uid)
                    .await?
                    .ok_or_else(|| Error::Db(e))
            }
            Err(e) => Err(e.into()),
        }
    }
}
