//! Account domain: users, roles, lifecycle tokens, and credential handling.

pub mod models;
pub mod password;
pub mod service;
pub mod session;
pub mod tokens;

mod error;

pub use self::error::Error;
