//! Data types and the voting engine built on them.
//!
//! - [`api`]: request and response bodies.
//! - [`db`]: records as they are stored.
//! - [`voting`]: the rules of the game.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
pub mod store;
pub mod voting;
