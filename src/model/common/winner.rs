use std::collections::BTreeSet;

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

use super::Identity;

/// The declared outcome of a meeting.
///
/// Stored as a plain string for a single winner and as an array for a tie,
/// matching the shape the dashboard already reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Winner {
    /// One participant received strictly the most votes.
    Single(Identity),
    /// Several participants share the highest vote count. Never broken.
    Tie(BTreeSet<Identity>),
}

impl Winner {
    /// Build the outcome for a non-empty candidate set.
    /// Returns `None` for an empty set.
    pub fn from_candidates(mut candidates: BTreeSet<Identity>) -> Option<Self> {
        match candidates.len() {
            0 => None,
            1 => candidates.pop_first().map(Self::Single),
            _ => Some(Self::Tie(candidates)),
        }
    }

    /// Every identity sharing this outcome.
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        let (single, tie) = match self {
            Self::Single(identity) => (Some(identity), None),
            Self::Tie(identities) => (None, Some(identities.iter())),
        };
        single.into_iter().chain(tie.into_iter().flatten())
    }

    pub fn is_tie(&self) -> bool {
        matches!(self, Self::Tie(_))
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.identities().any(|i| i == identity)
    }
}

impl From<Winner> for Bson {
    fn from(winner: Winner) -> Self {
        to_bson(&winner).expect("Serialisation is infallible")
    }
}
