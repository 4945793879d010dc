use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::db::User;

/// A role a route can require, having defined rights.
pub trait Role {
    /// The rights this role needs.
    const RIGHTS: Rights;
}

/// Any signed-in team member.
pub struct Member;

/// A member allowed to edit the schedule and run resolution.
pub struct Admin;

impl Role for Member {
    const RIGHTS: Rights = Rights::Member;
}

impl Role for Admin {
    const RIGHTS: Rights = Rights::Admin;
}

/// Different privilege levels, in increasing order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Member = 0,
    Admin = 1,
}

impl Rights {
    /// The rights a stored user record grants.
    pub fn of(user: &User) -> Self {
        if user.is_admin {
            Self::Admin
        } else {
            Self::Member
        }
    }
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Member => "member",
                Self::Admin => "admin",
            }
        )
    }
}
