use chrono::Utc;
use log::info;
use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{
        account::UserDescription,
        auth::{Admin, AuthToken},
        voting::SweepDescription,
    },
    store::Store,
    voting::resolve_pending,
};
use crate::Config;

pub fn routes() -> Vec<Route> {
    routes![get_users, resolve]
}

#[get("/admin/users")]
async fn get_users(
    _token: AuthToken<Admin>,
    store: &State<Store>,
) -> Result<Json<Vec<UserDescription>>> {
    let users = store.list_users().await?;
    Ok(Json(users.into_iter().map(UserDescription::from).collect()))
}

/// Resolve every meeting whose voting has ended without a declared winner.
#[post("/admin/resolve")]
async fn resolve(
    token: AuthToken<Admin>,
    store: &State<Store>,
    config: &State<Config>,
) -> Result<Json<SweepDescription>> {
    let report = resolve_pending(store.inner().as_ref(), Utc::now(), &config.policy()).await?;
    info!(
        "{} ran a resolution sweep: {} declared, {} failed",
        token.email,
        report.declared.len(),
        report.failed.len()
    );
    Ok(Json(report.into()))
}
