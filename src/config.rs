use std::sync::Arc;

use chrono::{Duration, FixedOffset, Offset, Utc};
use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    mongodb::{ensure_indexes_exist, MongoMeetingStore},
    store::Store,
    voting::VotingPolicy,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    #[serde(default)]
    allow_self_vote: bool,
    #[serde(default = "default_tie_awards_all_winners")]
    tie_awards_all_winners: bool,
    #[serde(default)]
    retry_empty_meetings: bool,
    #[serde(default)]
    leaderboard_exclusions: Vec<String>,
    /// Minutes east of UTC.
    #[serde(default)]
    calendar_utc_offset: i32,
    // secrets
    jwt_secret: String,
    idp_secret: String,
}

fn default_tie_awards_all_winners() -> bool {
    true
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign session JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Secret key the identity provider signs its tokens with.
    pub fn idp_secret(&self) -> &[u8] {
        self.idp_secret.as_bytes()
    }

    /// The configured voting behaviour.
    pub fn policy(&self) -> VotingPolicy {
        VotingPolicy {
            allow_self_vote: self.allow_self_vote,
            tie_awards_all_winners: self.tie_awards_all_winners,
            retry_empty_meetings: self.retry_empty_meetings,
            excluded_identities: self.leaderboard_exclusions.iter().cloned().collect(),
        }
    }

    fn checked_calendar_offset(&self) -> Option<FixedOffset> {
        self.calendar_utc_offset
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    /// The offset used for calendar arithmetic and date bucketing.
    pub fn calendar_offset(&self) -> FixedOffset {
        // Validated when the config is loaded.
        self.checked_calendar_offset().unwrap_or_else(|| Utc.fix())
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.checked_calendar_offset().is_none() {
            error!(
                "calendar_utc_offset of {} minutes is out of range",
                config.calendar_utc_offset
            );
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: String,
}

fn default_db_name() -> String {
    "firstin".to_string()
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places a MongoDB-backed [`Store`]
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        let store: Store = Arc::new(MongoMeetingStore::new(&db));
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}
