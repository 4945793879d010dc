//! MongoDB plumbing: IDs, collections, and the production [`MeetingStore`](crate::model::store::MeetingStore).

mod bson;
mod collection;
mod errors;
mod store;

pub use bson::{escape_key, serde_escaped_map, unescape_key, vote_field_path, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use store::MongoMeetingStore;
