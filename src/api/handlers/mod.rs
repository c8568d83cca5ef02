//! Route handlers for the accounts API.

pub mod auth;
pub mod health;
pub mod lifecycle;
pub mod register;
pub mod roles;
pub mod users;
