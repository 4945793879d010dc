//! Read-only projections over meetings and users for dashboards and leaderboards.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{Identity, Winner},
    db::{MeetingCore, User},
};

use super::VotingPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopWinner {
    pub identity: Identity,
    pub wins: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MostVoted {
    pub identity: Identity,
    pub votes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub identity: Identity,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub wins: u32,
    pub votes_received: u32,
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_users: usize,
    pub total_votes: usize,
    pub top_winner: Option<TopWinner>,
    pub most_voted: Option<MostVoted>,
}

/// One user's voting history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVotingStats {
    /// Meetings the user voted in.
    pub votes_cast: u32,
    /// Who the user voted for, and how often.
    pub votes_by_recipient: BTreeMap<Identity, u32>,
    /// Who voted for the user, and how often.
    pub votes_received_from: BTreeMap<Identity, u32>,
    /// Votes the user cast, by the calendar date of the meeting.
    pub votes_by_date: BTreeMap<NaiveDate, u32>,
}

/// Counts that remember which key was seen first, for "first wins" tie-breaks.
#[derive(Default)]
struct OrderedCounts<'a> {
    counts: HashMap<&'a str, (u32, usize)>,
}

impl<'a> OrderedCounts<'a> {
    fn add(&mut self, key: &'a str) {
        let next = self.counts.len();
        self.counts.entry(key).or_insert((0, next)).0 += 1;
    }

    /// The highest count; ties go to the key seen earliest.
    fn max_by_first_seen(&self, policy: &VotingPolicy) -> Option<(&'a str, u32)> {
        self.counts
            .iter()
            .filter(|(key, _)| !policy.is_excluded(key))
            .max_by(|(_, (a, a_seen)), (_, (b, b_seen))| a.cmp(b).then(b_seen.cmp(a_seen)))
            .map(|(key, (count, _))| (*key, *count))
    }
}

/// Identities credited with a win in this meeting.
fn credited<'m>(
    meeting: &'m MeetingCore,
    policy: &VotingPolicy,
) -> Box<dyn Iterator<Item = &'m Identity> + 'm> {
    match &meeting.winner {
        Some(Winner::Single(identity)) => Box::new(std::iter::once(identity)),
        Some(winner @ Winner::Tie(_)) if policy.tie_awards_all_winners => {
            Box::new(winner.identities())
        }
        _ => Box::new(std::iter::empty()),
    }
}

/// Meetings won per identity.
pub fn win_counts_by_user<'m, I>(meetings: I, policy: &VotingPolicy) -> BTreeMap<Identity, u32>
where
    I: IntoIterator<Item = &'m MeetingCore>,
{
    let mut counts = BTreeMap::new();
    for meeting in meetings {
        for identity in credited(meeting, policy) {
            *counts.entry(identity.clone()).or_insert(0) += 1;
        }
    }
    counts
}

pub fn total_votes_cast<'m, I>(meetings: I) -> usize
where
    I: IntoIterator<Item = &'m MeetingCore>,
{
    meetings.into_iter().map(|m| m.votes.len()).sum()
}

/// Votes received per identity, optionally counting only one voter's votes.
pub fn votes_received_by_recipient<'m, I>(
    meetings: I,
    voter_filter: Option<&str>,
) -> BTreeMap<Identity, u32>
where
    I: IntoIterator<Item = &'m MeetingCore>,
{
    let mut counts = BTreeMap::new();
    for meeting in meetings {
        for (voter, voted_for) in &meeting.votes {
            if voter_filter.map_or(true, |filter| filter == voter) {
                *counts.entry(voted_for.clone()).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// How many times each voter voted for `target`.
pub fn votes_received_for_user<'m, I>(meetings: I, target: &str) -> BTreeMap<Identity, u32>
where
    I: IntoIterator<Item = &'m MeetingCore>,
{
    let mut counts = BTreeMap::new();
    for meeting in meetings {
        for (voter, voted_for) in &meeting.votes {
            if voted_for == target {
                *counts.entry(voter.clone()).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Votes bucketed by the local calendar date of the meeting's start.
pub fn votes_by_calendar_date<'m, I, Tz>(
    meetings: I,
    voter_filter: Option<&str>,
    tz: &Tz,
) -> BTreeMap<NaiveDate, u32>
where
    I: IntoIterator<Item = &'m MeetingCore>,
    Tz: TimeZone,
{
    let mut counts = BTreeMap::new();
    for meeting in meetings {
        let votes = match voter_filter {
            Some(voter) => u32::from(meeting.votes.contains_key(voter)),
            None => u32::try_from(meeting.votes.len()).unwrap_or(u32::MAX),
        };
        if votes > 0 {
            let date = meeting.start_time.with_timezone(tz).date_naive();
            *counts.entry(date).or_insert(0) += votes;
        }
    }
    counts
}

/// The identity with the most wins.
///
/// Ties go to whoever was first credited with a win, scanning meetings in
/// the order given.
pub fn top_winner<'m, I>(meetings: I, policy: &VotingPolicy) -> Option<TopWinner>
where
    I: IntoIterator<Item = &'m MeetingCore>,
{
    let mut counts = OrderedCounts::default();
    for meeting in meetings {
        for identity in credited(meeting, policy) {
            counts.add(identity);
        }
    }
    counts
        .max_by_first_seen(policy)
        .map(|(identity, wins)| TopWinner {
            identity: identity.to_string(),
            wins,
        })
}

/// The identity that received the most votes overall.
pub fn most_voted<'m, I>(meetings: I, policy: &VotingPolicy) -> Option<MostVoted>
where
    I: IntoIterator<Item = &'m MeetingCore>,
{
    let mut counts = OrderedCounts::default();
    for meeting in meetings {
        for voted_for in meeting.votes.values() {
            counts.add(voted_for);
        }
    }
    counts
        .max_by_first_seen(policy)
        .map(|(identity, votes)| MostVoted {
            identity: identity.to_string(),
            votes,
        })
}

/// Every non-excluded user, most wins first.
pub fn leaderboard(
    users: &[User],
    meetings: &[&MeetingCore],
    policy: &VotingPolicy,
) -> Vec<LeaderboardEntry> {
    let wins = win_counts_by_user(meetings.iter().copied(), policy);
    let received = votes_received_by_recipient(meetings.iter().copied(), None);
    let mut entries: Vec<_> = users
        .iter()
        .filter(|user| !policy.is_excluded(&user.email))
        .map(|user| LeaderboardEntry {
            identity: user.email.clone(),
            display_name: user.label().to_string(),
            photo_url: user.photo_url.clone(),
            wins: wins.get(&user.email).copied().unwrap_or(0),
            votes_received: received.get(&user.email).copied().unwrap_or(0),
        })
        .collect();
    entries.sort_by(|a, b| b.wins.cmp(&a.wins));
    entries
}

pub fn dashboard_metrics(
    users: &[User],
    meetings: &[&MeetingCore],
    policy: &VotingPolicy,
) -> DashboardMetrics {
    DashboardMetrics {
        total_users: users
            .iter()
            .filter(|user| !policy.is_excluded(&user.email))
            .count(),
        total_votes: total_votes_cast(meetings.iter().copied()),
        top_winner: top_winner(meetings.iter().copied(), policy),
        most_voted: most_voted(meetings.iter().copied(), policy),
    }
}

pub fn user_voting_stats<Tz: TimeZone>(
    meetings: &[&MeetingCore],
    identity: &str,
    tz: &Tz,
) -> UserVotingStats {
    UserVotingStats {
        votes_cast: u32::try_from(
            meetings
                .iter()
                .filter(|m| m.votes.contains_key(identity))
                .count(),
        )
        .unwrap_or(u32::MAX),
        votes_by_recipient: votes_received_by_recipient(meetings.iter().copied(), Some(identity)),
        votes_received_from: votes_received_for_user(meetings.iter().copied(), identity),
        votes_by_date: votes_by_calendar_date(meetings.iter().copied(), Some(identity), tz),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    use chrono::{Duration, FixedOffset};

    use crate::model::db::meeting::examples::{nine_am, ALEX, ANNE, DAVE, RICK};

    fn resolved(winner: Option<Winner>) -> MeetingCore {
        let mut meeting = MeetingCore::example();
        meeting.winner = winner;
        meeting.winner_declared = true;
        meeting
    }

    fn single(identity: &str) -> Option<Winner> {
        Some(Winner::Single(identity.to_string()))
    }

    fn tie(identities: &[&str]) -> Option<Winner> {
        let set: BTreeSet<Identity> = identities.iter().map(|i| i.to_string()).collect();
        Some(Winner::Tie(set))
    }

    #[test]
    fn total_votes() {
        let meetings = [
            MeetingCore::example().with_votes(&[(RICK, DAVE), (DAVE, RICK)]),
            MeetingCore::example(),
            MeetingCore::example().with_votes(&[
                (RICK, DAVE),
                (DAVE, ALEX),
                (ALEX, ANNE),
                (ANNE, RICK),
                ("gemma@example.com", RICK),
            ]),
        ];
        assert_eq!(total_votes_cast(&meetings), 7);
        assert_eq!(total_votes_cast([]), 0);
    }

    #[test]
    fn tie_policy_changes_win_counts() {
        let meetings = [
            resolved(single(RICK)),
            resolved(tie(&[RICK, DAVE])),
            resolved(None),
        ];

        let all = win_counts_by_user(&meetings, &VotingPolicy::default());
        assert_eq!(all.get(RICK), Some(&2));
        assert_eq!(all.get(DAVE), Some(&1));

        let strict = VotingPolicy {
            tie_awards_all_winners: false,
            ..VotingPolicy::default()
        };
        let singles = win_counts_by_user(&meetings, &strict);
        assert_eq!(singles.get(RICK), Some(&1));
        assert_eq!(singles.get(DAVE), None);
    }

    #[test]
    fn top_winner_ties_go_to_first_winner() {
        let policy = VotingPolicy::default();
        let meetings = [
            resolved(single(DAVE)),
            resolved(single(ALEX)),
            resolved(single(ALEX)),
            resolved(single(DAVE)),
        ];
        let top = top_winner(&meetings, &policy).unwrap();
        assert_eq!(
            top,
            TopWinner {
                identity: DAVE.to_string(),
                wins: 2
            }
        );

        let reversed: Vec<_> = meetings.iter().rev().collect();
        let top = top_winner(reversed, &policy).unwrap();
        assert_eq!(top.identity, DAVE);

        let meetings = [resolved(single(ALEX)), resolved(single(DAVE)), resolved(single(DAVE))];
        assert_eq!(top_winner(&meetings, &policy).unwrap().identity, DAVE);
        assert_eq!(top_winner([], &policy), None);
    }

    #[test]
    fn directional_vote_counts() {
        let meetings = [
            MeetingCore::example().with_votes(&[(RICK, DAVE), (ALEX, DAVE), (DAVE, RICK)]),
            MeetingCore::example().with_votes(&[(RICK, ALEX), (ALEX, DAVE)]),
        ];

        let received = votes_received_by_recipient(&meetings, None);
        assert_eq!(received.get(DAVE), Some(&3));
        assert_eq!(received.get(RICK), Some(&1));

        let ricks_choices = votes_received_by_recipient(&meetings, Some(RICK));
        assert_eq!(ricks_choices.get(DAVE), Some(&1));
        assert_eq!(ricks_choices.get(ALEX), Some(&1));

        let for_dave = votes_received_for_user(&meetings, DAVE);
        assert_eq!(for_dave.get(ALEX), Some(&2));
        assert_eq!(for_dave.get(RICK), Some(&1));
        assert_eq!(for_dave.get(DAVE), None);
    }

    #[test]
    fn dates_follow_the_calendar_offset() {
        // 23:30 UTC is already the next day in UTC+1.
        let late = MeetingCore::example_at(nine_am() + Duration::minutes(870))
            .with_votes(&[(RICK, DAVE)]);
        let early = MeetingCore::example().with_votes(&[(RICK, ALEX), (DAVE, ALEX)]);
        let meetings = [early, late];

        let utc = FixedOffset::east_opt(0).unwrap();
        let cet = FixedOffset::east_opt(3600).unwrap();
        let jan = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();

        let by_date = votes_by_calendar_date(&meetings, Some(RICK), &utc);
        assert_eq!(by_date, BTreeMap::from([(jan(1), 2)]));
        let by_date = votes_by_calendar_date(&meetings, Some(RICK), &cet);
        assert_eq!(by_date, BTreeMap::from([(jan(1), 1), (jan(2), 1)]));
        let everyone = votes_by_calendar_date(&meetings, None, &utc);
        assert_eq!(everyone, BTreeMap::from([(jan(1), 3)]));
    }

    #[test]
    fn daily_totals_match_votes_cast() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let meetings: Vec<_> = (0..3)
            .map(|hour| {
                MeetingCore::example_at(nine_am() + Duration::hours(hour))
                    .with_votes(&[(RICK, DAVE), (DAVE, ALEX), (ALEX, ANNE), (ANNE, RICK)])
            })
            .collect();
        let by_date = votes_by_calendar_date(&meetings, None, &utc);
        assert_eq!(by_date.len(), 1);
        let total: u32 = by_date.values().sum();
        assert_eq!(usize::try_from(total).unwrap(), total_votes_cast(&meetings));
    }

    #[test]
    fn excluded_identities_are_hidden() {
        let admin = User::example_admin();
        let policy = VotingPolicy {
            excluded_identities: [admin.email.clone()].into_iter().collect(),
            ..VotingPolicy::default()
        };
        let mut users = User::example_team();
        users.push(admin.clone());

        let mut first = resolved(single(&admin.email));
        first.votes.insert(RICK.to_string(), admin.email.clone());
        first.votes.insert(DAVE.to_string(), admin.email.clone());
        let second = resolved(single(ANNE)).with_votes(&[(RICK, ANNE)]);
        let meetings = [&first, &second];

        let board = leaderboard(&users, &meetings, &policy);
        assert_eq!(board.len(), users.len() - 1);
        assert!(board.iter().all(|entry| entry.identity != admin.email));
        assert_eq!(board[0].identity, ANNE);
        assert_eq!(board[0].wins, 1);
        assert_eq!(board[0].votes_received, 1);

        let metrics = dashboard_metrics(&users, &meetings, &policy);
        assert_eq!(metrics.total_users, users.len() - 1);
        assert_eq!(metrics.total_votes, 3);
        assert_eq!(metrics.top_winner.unwrap().identity, ANNE);
        assert_eq!(
            metrics.most_voted.unwrap(),
            MostVoted {
                identity: ANNE.to_string(),
                votes: 1
            }
        );
    }

    #[test]
    fn empty_meetings_contribute_nothing() {
        let meetings = [&resolved(None)];
        let metrics = dashboard_metrics(&[], &meetings, &VotingPolicy::default());
        assert_eq!(metrics.total_votes, 0);
        assert_eq!(metrics.top_winner, None);
        assert_eq!(metrics.most_voted, None);
        assert!(win_counts_by_user(meetings, &VotingPolicy::default()).is_empty());
    }

    #[test]
    fn personal_stats() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let first = MeetingCore::example().with_votes(&[(RICK, DAVE), (DAVE, RICK)]);
        let second = MeetingCore::example_at(nine_am() + Duration::days(1))
            .with_votes(&[(RICK, DAVE), (ALEX, RICK), (ANNE, RICK)]);
        let stats = user_voting_stats(&[&first, &second], RICK, &utc);
        assert_eq!(stats.votes_cast, 2);
        assert_eq!(
            stats.votes_by_recipient,
            BTreeMap::from([(DAVE.to_string(), 2)])
        );
        assert_eq!(stats.votes_received_from.values().sum::<u32>(), 3);
        assert_eq!(stats.votes_by_date.len(), 2);
    }
}
