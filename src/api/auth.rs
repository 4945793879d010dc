use log::info;
use rocket::{
    http::{Cookie, CookieJar},
    serde::json::Json,
    Route, State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        account::UserDescription,
        auth::{AuthToken, Member, SessionRequest, AUTH_TOKEN_COOKIE},
    },
    store::Store,
};
use crate::Config;

pub fn routes() -> Vec<Route> {
    routes![sign_in, current_user, sign_out]
}

/// Exchange an identity-provider token for a session, creating the user on first sign-in.
#[post("/auth/session", data = "<request>", format = "json")]
pub async fn sign_in(
    cookies: &CookieJar<'_>,
    request: Json<SessionRequest>,
    config: &State<Config>,
    store: &State<Store>,
) -> Result<Json<UserDescription>> {
    let claims = request.verify(config)?;
    let user = store.ensure_user(claims.into_user()).await?;

    let token = AuthToken::<Member>::new(&user);
    cookies.add(token.into_cookie(config));
    info!("{} signed in", user.email);

    Ok(Json(user.into()))
}

#[get("/auth/session")]
async fn current_user(
    token: AuthToken<Member>,
    store: &State<Store>,
) -> Result<Json<UserDescription>> {
    let user = store
        .find_user(&token.uid)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {}", token.uid)))?;
    Ok(Json(user.into()))
}

#[delete("/auth/session")]
async fn sign_out(cookies: &CookieJar<'_>) {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
}
