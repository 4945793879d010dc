use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::auth::{AuthToken, Member},
    store::Store,
    voting::stats::{
        dashboard_metrics, leaderboard, user_voting_stats, DashboardMetrics, LeaderboardEntry,
        UserVotingStats,
    },
};
use crate::Config;

use super::common::cores;

pub fn routes() -> Vec<Route> {
    routes![metrics, leaders, my_stats]
}

#[get("/stats/metrics")]
async fn metrics(
    _token: AuthToken<Member>,
    store: &State<Store>,
    config: &State<Config>,
) -> Result<Json<DashboardMetrics>> {
    let users = store.list_users().await?;
    let meetings = store.list_meetings().await?;
    Ok(Json(dashboard_metrics(
        &users,
        &cores(&meetings),
        &config.policy(),
    )))
}

#[get("/stats/leaderboard")]
async fn leaders(
    _token: AuthToken<Member>,
    store: &State<Store>,
    config: &State<Config>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let users = store.list_users().await?;
    let meetings = store.list_meetings().await?;
    Ok(Json(leaderboard(&users, &cores(&meetings), &config.policy())))
}

/// The caller's own voting history.
#[get("/stats/me")]
async fn my_stats(
    token: AuthToken<Member>,
    store: &State<Store>,
    config: &State<Config>,
) -> Result<Json<UserVotingStats>> {
    let meetings = store.list_meetings().await?;
    Ok(Json(user_voting_stats(
        &cores(&meetings),
        &token.email,
        &config.calendar_offset(),
    )))
}
