mod winner;

pub use winner::Winner;

/// Participants, voters and winners are identified by email address.
pub type Identity = String;
