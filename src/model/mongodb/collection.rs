use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{Meeting, MeetingCore, User};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Meeting collections
const MEETINGS: &str = "meetings";
impl MongoCollection for Meeting {
    const NAME: &'static str = MEETINGS;
}
impl MongoCollection for MeetingCore {
    const NAME: &'static str = MEETINGS;
}

// User collection
const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    // Calendar and upcoming-meeting queries.
    let start_index = IndexModel::builder()
        .keys(doc! {"start_time": 1})
        .build();
    Coll::<Meeting>::from_db(db)
        .create_index(start_index, None)
        .await?;

    // The resolution sweep.
    let pending_index = IndexModel::builder()
        .keys(doc! {"voting_end_time": 1, "winner_declared": 1})
        .build();
    Coll::<Meeting>::from_db(db)
        .create_index(pending_index, None)
        .await?;

    // User collection.
    let unique = IndexOptions::builder().unique(true).build();
    let email_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique)
        .build();
    Coll::<User>::from_db(db)
        .create_index(email_index, None)
        .await?;

    Ok(())
}
