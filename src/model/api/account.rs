use serde::{Deserialize, Serialize};

use crate::model::{common::Identity, db::User};

/// A user as presented to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDescription {
    pub uid: String,
    pub email: Identity,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub is_admin: bool,
}

impl From<User> for UserDescription {
    fn from(user: User) -> Self {
        Self {
            display_name: user.label().to_string(),
            uid: user.uid,
            email: user.email,
            photo_url: user.photo_url,
            is_admin: user.is_admin,
        }
    }
}
