use std::collections::BTreeSet;

use crate::model::common::Identity;

/// The behaviours that differ between deployments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotingPolicy {
    /// Whether a participant may vote for themselves.
    pub allow_self_vote: bool,
    /// Whether a tie counts as a win for every tied participant.
    /// If not, tied meetings award nobody.
    pub tie_awards_all_winners: bool,
    /// Whether a meeting that ended with no votes stays unresolved so a later
    /// sweep can pick it up, instead of being declared without a winner.
    pub retry_empty_meetings: bool,
    /// Administrative or system identities hidden from leaderboards.
    pub excluded_identities: BTreeSet<Identity>,
}

impl VotingPolicy {
    pub fn is_excluded(&self, identity: &str) -> bool {
        self.excluded_identities.contains(identity)
    }
}

impl Default for VotingPolicy {
    fn default() -> Self {
        Self {
            allow_self_vote: false,
            tie_awards_all_winners: true,
            retry_empty_meetings: false,
            excluded_identities: BTreeSet::new(),
        }
    }
}
