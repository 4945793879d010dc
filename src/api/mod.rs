use rocket::Route;

mod admin;
pub(crate) mod auth;
mod common;
mod meetings;
mod stats;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(meetings::routes());
    routes.extend(voting::routes());
    routes.extend(stats::routes());
    routes.extend(admin::routes());
    routes
}
