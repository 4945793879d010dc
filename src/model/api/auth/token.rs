use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{common::Identity, db::User, store::Store};

use super::user::{Rights, Role};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user, usable wherever
/// role `R` is required.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<R> {
    pub uid: String,
    #[serde(rename = "eml")]
    pub email: Identity,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<R>,
}

impl<R> AuthToken<R> {
    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights >= target
    }
}

impl<R> AuthToken<R>
where
    R: Role,
{
    /// Create a new [`AuthToken`] for the given user, with the rights their record grants.
    pub fn new(user: &User) -> Self {
        Self {
            uid: user.uid.clone(),
            email: user.email.clone(),
            rights: Rights::of(user),
            phantom: PhantomData,
        }
    }

    #[allow(clippy::missing_panics_doc)]
    /// Serialize this cookie into a token.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<R>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<R> {
    #[serde(flatten, bound = "")]
    token: AuthToken<R>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, R> FromRequest<'r> for AuthToken<R>
where
    R: Role + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that it grants the rights this role
    /// needs.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let (config, store) = match (
            req.rocket().state::<Config>(),
            req.rocket().state::<Store>(),
        ) {
            (Some(config), Some(store)) => (config, store),
            _ => {
                let err = Error::StoreUnavailable("Application state is not managed".to_string());
                return Outcome::Failure((Status::InternalServerError, err));
            }
        };

        let cookie = match req.cookies().get(AUTH_TOKEN_COOKIE) {
            Some(cookie) => cookie,
            None => {
                let err = Error::Unauthorized("Not signed in".to_string());
                return Outcome::Failure((Status::Unauthorized, err));
            }
        };

        // Decode the token.
        let token: Self = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(_) => {
                let err = Error::Unauthorized("Invalid or expired session".to_string());
                return Outcome::Failure((Status::Unauthorized, err));
            }
        };

        // Check it represents the correct rights.
        if !token.permits(R::RIGHTS) {
            let err = Error::Forbidden(format!("Requires {} rights", R::RIGHTS));
            return Outcome::Failure((Status::Forbidden, err));
        }

        // Check the user actually exists.
        match store.find_user(&token.uid).await {
            Ok(Some(_)) => Outcome::Success(token),
            Ok(None) => {
                let err = Error::Unauthorized(format!("User {} no longer exists", token.uid));
                Outcome::Failure((Status::Unauthorized, err))
            }
            Err(e) => Outcome::Failure((e.status(), e)),
        }
    }
}
