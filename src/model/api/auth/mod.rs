mod request;
mod token;
mod user;

pub use request::{IdentityClaims, SessionRequest};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{Admin, Member, Rights, Role};

#[cfg(test)]
pub(crate) use request::examples::TEST_IDP_SECRET;
