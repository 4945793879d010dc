use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        auth::{AuthToken, Member},
        voting::{VoteRequest, VotingStatus},
    },
    mongodb::Id,
    store::{meeting_by_id, Store},
    voting::cast_vote,
};
use crate::Config;

pub fn routes() -> Vec<Route> {
    routes![active_voting, meeting_voting, vote]
}

/// The meeting currently open for votes, if any, from the caller's point of view.
#[get("/voting/active")]
async fn active_voting(
    token: AuthToken<Member>,
    store: &State<Store>,
) -> Result<Json<Option<VotingStatus>>> {
    let now = Utc::now();
    let meeting = store.find_active_meeting(now).await?;
    Ok(Json(
        meeting.map(|meeting| VotingStatus::new(meeting, &token.email, now)),
    ))
}

#[get("/meetings/<meeting_id>/voting")]
async fn meeting_voting(
    token: AuthToken<Member>,
    meeting_id: Id,
    store: &State<Store>,
) -> Result<Json<VotingStatus>> {
    let meeting = meeting_by_id(store.inner().as_ref(), meeting_id).await?;
    Ok(Json(VotingStatus::new(meeting, &token.email, Utc::now())))
}

/// Cast the caller's vote, replacing any earlier one.
#[post("/meetings/<meeting_id>/votes", data = "<request>", format = "json")]
async fn vote(
    token: AuthToken<Member>,
    meeting_id: Id,
    request: Json<VoteRequest>,
    store: &State<Store>,
    config: &State<Config>,
) -> Result<Json<VotingStatus>> {
    let store = store.inner().as_ref();
    let now = Utc::now();
    let meeting = meeting_by_id(store, meeting_id).await?;
    cast_vote(
        store,
        &meeting,
        &token.email,
        &request.voted_for,
        now,
        &config.policy(),
    )
    .await?;

    let meeting = meeting_by_id(store, meeting_id).await?;
    Ok(Json(VotingStatus::new(meeting, &token.email, now)))
}
