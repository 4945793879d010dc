//! The voting engine: window classification, the vote ledger, winner
//! resolution, statistics and meeting recurrence.
//!
//! Everything here takes the acting identity and the current time as
//! explicit arguments. Persistence goes through [`MeetingStore`](crate::model::store::MeetingStore).

mod ledger;
mod policy;
mod recurrence;
mod resolution;
pub mod stats;
mod window;

pub use ledger::{cast_vote, check_vote, has_voted, vote_of};
pub use policy::VotingPolicy;
pub use recurrence::{expand, MeetingTemplate, RepeatRule, MAX_OCCURRENCES};
pub use resolution::{
    determine_winner, resolve_pending, resolve_winner, tally, Resolution, SweepReport,
};
pub use window::{classify, VotingPhase};
