use chrono::Utc;
use log::info;
use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{Admin, AuthToken, Member},
        meeting::{MeetingDescription, MeetingEdit, MeetingSpec},
    },
    mongodb::Id,
    store::{meeting_by_id, Store},
};
use crate::{Config, MeetingResolvers};

use super::common::from_millis;

/// Upper bound on how many upcoming meetings one request may ask for.
const MAX_UPCOMING: usize = 50;

pub fn routes() -> Vec<Route> {
    routes![
        list_meetings,
        upcoming_meetings,
        recent_meeting,
        get_meeting,
        create_meetings,
        edit_meeting,
        delete_meeting,
    ]
}

/// All meetings, or those starting in `[from, to)` if both bounds are given.
#[get("/meetings?<from>&<to>")]
async fn list_meetings(
    _token: AuthToken<Member>,
    from: Option<i64>,
    to: Option<i64>,
    store: &State<Store>,
) -> Result<Json<Vec<MeetingDescription>>> {
    let meetings = match (from, to) {
        (Some(from), Some(to)) => {
            store
                .find_meetings_in_range(from_millis(from)?, from_millis(to)?)
                .await?
        }
        (None, None) => store.list_meetings().await?,
        _ => {
            return Err(Error::BadRequest(
                "`from` and `to` must be given together".to_string(),
            ))
        }
    };
    let now = Utc::now();
    Ok(Json(
        meetings
            .into_iter()
            .map(|meeting| MeetingDescription::new(meeting, now))
            .collect(),
    ))
}

#[get("/meetings/upcoming?<limit>")]
async fn upcoming_meetings(
    _token: AuthToken<Member>,
    limit: Option<usize>,
    store: &State<Store>,
) -> Result<Json<Vec<MeetingDescription>>> {
    let limit = limit.unwrap_or(5).min(MAX_UPCOMING);
    let now = Utc::now();
    let meetings = store.find_upcoming_meetings(now, limit).await?;
    Ok(Json(
        meetings
            .into_iter()
            .map(|meeting| MeetingDescription::new(meeting, now))
            .collect(),
    ))
}

/// The latest meeting that has already started, if any.
#[get("/meetings/recent")]
async fn recent_meeting(
    _token: AuthToken<Member>,
    store: &State<Store>,
) -> Result<Json<Option<MeetingDescription>>> {
    let now = Utc::now();
    let meeting = store.find_most_recent_meeting(now).await?;
    Ok(Json(meeting.map(|meeting| MeetingDescription::new(meeting, now))))
}

#[get("/meetings/<meeting_id>")]
async fn get_meeting(
    _token: AuthToken<Member>,
    meeting_id: Id,
    store: &State<Store>,
) -> Result<Json<MeetingDescription>> {
    let meeting = meeting_by_id(store.inner().as_ref(), meeting_id).await?;
    Ok(Json(MeetingDescription::new(meeting, Utc::now())))
}

/// Schedule a meeting, or a whole series of them.
#[post("/meetings", data = "<spec>", format = "json")]
async fn create_meetings(
    token: AuthToken<Admin>,
    spec: Json<MeetingSpec>,
    store: &State<Store>,
    config: &State<Config>,
    resolvers: &State<MeetingResolvers>,
) -> Result<Json<Vec<MeetingDescription>>> {
    let now = Utc::now();
    let new_meetings = spec.expand(&config.calendar_offset(), now)?;
    let meetings = store.insert_meetings(new_meetings).await?;
    for meeting in &meetings {
        resolvers.schedule_meeting(meeting).await;
    }
    info!(
        "{} scheduled {} occurrence(s) of '{}'",
        token.email,
        meetings.len(),
        spec.meeting_name
    );

    Ok(Json(
        meetings
            .into_iter()
            .map(|meeting| MeetingDescription::new(meeting, now))
            .collect(),
    ))
}

#[put("/meetings/<meeting_id>", data = "<edit>", format = "json")]
async fn edit_meeting(
    _token: AuthToken<Admin>,
    meeting_id: Id,
    edit: Json<MeetingEdit>,
    store: &State<Store>,
    resolvers: &State<MeetingResolvers>,
) -> Result<Json<MeetingDescription>> {
    let now = Utc::now();
    let mut meeting = meeting_by_id(store.inner().as_ref(), meeting_id).await?;
    let moved = edit.into_inner().apply(&mut meeting, now)?;
    store.upsert_meeting(&meeting).await?;
    if moved {
        resolvers.schedule_meeting(&meeting).await;
    }

    // The ledger may have changed concurrently; report what is stored.
    let meeting = meeting_by_id(store.inner().as_ref(), meeting_id).await?;
    Ok(Json(MeetingDescription::new(meeting, now)))
}

#[delete("/meetings/<meeting_id>")]
async fn delete_meeting(
    _token: AuthToken<Admin>,
    meeting_id: Id,
    store: &State<Store>,
    resolvers: &State<MeetingResolvers>,
) -> Result<()> {
    if !store.delete_meeting(meeting_id).await? {
        return Err(Error::not_found(format!("Meeting with ID '{meeting_id}'")));
    }
    resolvers.cancel_meeting(meeting_id).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration};
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use crate::model::{
        db::{
            meeting::examples::{DAVE, RICK},
            MeetingCore,
        },
        voting::{RepeatRule, VotingPhase},
    };

    use super::*;

    async fn create(client: &Client, spec: &MeetingSpec) -> Vec<MeetingDescription> {
        let response = client
            .post(uri!(create_meetings))
            .header(ContentType::JSON)
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        response.into_json().await.unwrap()
    }

    /// A whole number of milliseconds, so values survive the JSON round trip.
    fn tomorrow() -> DateTime<Utc> {
        from_millis((Utc::now() + Duration::days(1)).timestamp_millis()).unwrap()
    }

    #[backend_test(admin)]
    async fn create_series(client: Client, store: Store) {
        let spec = MeetingSpec {
            repeat: RepeatRule::Weekly,
            occurrences: 3,
            ..MeetingSpec::example(tomorrow())
        };
        let created = create(&client, &spec).await;
        assert_eq!(created.len(), 3);
        assert_eq!(created[0].start_time, spec.start_time);
        assert_eq!(created[2].start_time, spec.start_time + Duration::weeks(2));
        assert!(created.iter().all(|m| m.phase == VotingPhase::NotStarted));
        assert_eq!(store.list_meetings().await.unwrap().len(), 3);

        let response = client
            .get(uri!(get_meeting(created[1].id.parse::<Id>().unwrap())))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let fetched: MeetingDescription = response.into_json().await.unwrap();
        assert_eq!(fetched, created[1]);
    }

    #[backend_test(admin)]
    async fn bad_specs(client: Client, store: Store) {
        for spec in [
            MeetingSpec {
                occurrences: 0,
                repeat: RepeatRule::Weekly,
                ..MeetingSpec::example(tomorrow())
            },
            MeetingSpec {
                meeting_name: " ".to_string(),
                ..MeetingSpec::example(tomorrow())
            },
            MeetingSpec {
                participants: Default::default(),
                ..MeetingSpec::example(tomorrow())
            },
        ] {
            let response = client
                .post(uri!(create_meetings))
                .header(ContentType::JSON)
                .body(serde_json::to_string(&spec).unwrap())
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::BadRequest);
        }
        assert!(store.list_meetings().await.unwrap().is_empty());
    }

    #[backend_test]
    async fn signed_out_users_see_nothing(client: Client) {
        let response = client.get(uri!(list_meetings(_, _))).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[backend_test(member)]
    async fn range_and_upcoming(client: Client, store: Store) {
        let now = Utc::now();
        let times = [
            now - Duration::days(2),
            now - Duration::hours(1),
            now + Duration::hours(1),
            now + Duration::days(2),
        ];
        let meetings: Vec<_> = times.iter().map(|t| MeetingCore::example_at(*t)).collect();
        store.insert_meetings(meetings).await.unwrap();

        let from = (now - Duration::days(1)).timestamp_millis();
        let to = (now + Duration::days(1)).timestamp_millis();
        let in_range: Vec<MeetingDescription> = client
            .get(uri!(list_meetings(Some(from), Some(to))))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(in_range.len(), 2);
        assert!(in_range[0].start_time < in_range[1].start_time);

        let response = client
            .get(uri!(list_meetings(Some(from), _)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let upcoming: Vec<MeetingDescription> = client
            .get(uri!(upcoming_meetings(Some(1))))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(upcoming.len(), 1);
        assert!(upcoming[0].start_time > now);

        let recent: Option<MeetingDescription> = client
            .get(uri!(recent_meeting))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(recent.unwrap().start_time < now);
    }

    #[backend_test(member)]
    async fn members_cannot_manage_meetings(client: Client, store: Store) {
        let response = client
            .post(uri!(create_meetings))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&MeetingSpec::example(tomorrow())).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
        assert!(store.list_meetings().await.unwrap().is_empty());

        let meeting = store
            .insert_meetings(vec![MeetingCore::example_at(tomorrow())])
            .await
            .unwrap()
            .remove(0);
        let response = client
            .delete(uri!(delete_meeting(meeting.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
        assert!(store.find_meeting(meeting.id).await.unwrap().is_some());
    }

    #[backend_test(admin)]
    async fn edit_keeps_votes(client: Client, store: Store) {
        let meeting = store
            .insert_meetings(vec![
                MeetingCore::example_at(tomorrow()).with_votes(&[(RICK, DAVE)])
            ])
            .await
            .unwrap()
            .remove(0);
        let later = meeting.start_time + Duration::hours(3);
        let edit = MeetingEdit {
            meeting_name: Some("Planning".to_string()),
            start_time: Some(later),
            ..MeetingEdit::default()
        };
        let response = client
            .put(uri!(edit_meeting(meeting.id)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&edit).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let edited: MeetingDescription = response.into_json().await.unwrap();
        assert_eq!(edited.meeting_name, "Planning");
        assert_eq!(edited.voting_start_time, later - Duration::minutes(5));
        assert_eq!(edited.votes.get(RICK).map(String::as_str), Some(DAVE));
    }

    #[backend_test(admin)]
    async fn delete(client: Client, store: Store) {
        let meeting = store
            .insert_meetings(vec![MeetingCore::example_at(tomorrow())])
            .await
            .unwrap()
            .remove(0);
        let response = client
            .delete(uri!(delete_meeting(meeting.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert!(store.find_meeting(meeting.id).await.unwrap().is_none());

        let response = client
            .delete(uri!(delete_meeting(meeting.id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
