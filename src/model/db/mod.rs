//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Ledger keys are escaped so email addresses are valid field names.

pub mod meeting;
pub mod resolver;
pub mod user;

pub use meeting::{voting_window, Meeting, MeetingCore, NewMeeting};
pub use resolver::{MeetingResolvers, ResolverFairing};
pub use user::User;
