//! varco — user accounts and authentication service.
//!
//! Registration, credential verification, JWT session issuance, email
//! confirmation, password reset, and role assignment, exposed as a JSON API.

pub mod accounts;
pub mod api;
pub mod cli;
pub mod notify;
pub mod storage;
