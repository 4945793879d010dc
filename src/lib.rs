#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{figment::Figment, Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduled_task;

pub use config::Config;
pub use model::db::MeetingResolvers;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;
use model::{db::ResolverFairing, store::Store};

/// Build the server from `Rocket.toml` and the environment, backed by MongoDB.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(ResolverFairing)
        .attach(LoggerFairing)
}

/// Build the server from the given figment over an already-constructed store.
pub fn rocket_for_store(figment: Figment, store: Store) -> Rocket<Build> {
    rocket::custom(figment)
        .mount("/", api::routes())
        .manage(store)
        .attach(ConfigFairing)
        .attach(ResolverFairing)
        .attach(LoggerFairing)
}

/// Configuration for unit tests.
#[cfg(test)]
pub(crate) fn test_figment() -> Figment {
    Figment::from(rocket::Config::debug_default())
        .merge(("log_level", "off"))
        .merge(("auth_ttl", 3600))
        .merge(("jwt_secret", "session test secret"))
        .merge(("idp_secret", model::api::auth::TEST_IDP_SECRET))
}
