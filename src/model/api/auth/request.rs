use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{common::Identity, db::User};

/// A sign-in request carrying a token issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub id_token: String,
}

/// What the identity provider vouches for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// The provider's user ID.
    pub sub: String,
    pub email: Identity,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    /// Expiry, in seconds since the epoch.
    pub exp: i64,
}

impl SessionRequest {
    /// Check the provider's signature and expiry, revealing the identity if successful.
    pub fn verify(&self, config: &Config) -> Result<IdentityClaims> {
        let claims = jsonwebtoken::decode::<IdentityClaims>(
            &self.id_token,
            &DecodingKey::from_secret(config.idp_secret()),
            &Validation::new(Algorithm::HS256),
        )?
        .claims;
        if claims.sub.is_empty() || claims.email.trim().is_empty() {
            return Err(Error::Unauthorized(
                "Identity token lacks a subject or email".to_string(),
            ));
        }
        Ok(claims)
    }
}

impl IdentityClaims {
    /// The local user record to create on first sign-in.
    pub fn into_user(self) -> User {
        User {
            uid: self.sub,
            email: self.email.trim().to_string(),
            display_name: self.name.unwrap_or_default(),
            photo_url: self.picture,
            is_admin: false,
        }
    }
}

#[cfg(test)]
pub(crate) mod examples {
    use super::*;

    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header};

    pub const TEST_IDP_SECRET: &str = "identity provider test secret";

    impl IdentityClaims {
        pub fn for_user(user: &User) -> Self {
            Self {
                sub: user.uid.clone(),
                email: user.email.clone(),
                name: Some(user.display_name.clone()),
                picture: user.photo_url.clone(),
                exp: (Utc::now() + Duration::hours(1)).timestamp(),
            }
        }

        /// Sign these claims the way the identity provider would.
        pub fn issue(&self, secret: &[u8]) -> String {
            jsonwebtoken::encode(
                &Header::new(Algorithm::HS256),
                self,
                &EncodingKey::from_secret(secret),
            )
            .unwrap()
        }
    }

    impl SessionRequest {
        pub fn for_user(user: &User) -> Self {
            Self {
                id_token: IdentityClaims::for_user(user).issue(TEST_IDP_SECRET.as_bytes()),
            }
        }
    }
}
