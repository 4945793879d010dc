use serde::{Deserialize, Serialize};

use crate::model::common::Identity;

/// A user record. Identities are owned by the external identity provider;
/// this is the local copy created on first sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identity-provider user ID.
    #[serde(rename = "_id")]
    pub uid: String,
    pub email: Identity,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl User {
    /// Name to show for this user, falling back to the local part of their email.
    pub fn label(&self) -> &str {
        if !self.display_name.is_empty() {
            return &self.display_name;
        }
        self.email.split('@').next().unwrap_or(&self.email)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_falls_back_to_email() {
        let mut user = User::example("u1", "lilia@example.com", "");
        assert_eq!(user.label(), "lilia");
        user.display_name = "Lilia F".to_string();
        assert_eq!(user.label(), "Lilia F");
    }
}
