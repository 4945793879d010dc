//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as millisecond timestamps.

pub mod account;
pub mod auth;
pub mod meeting;
pub mod voting;
