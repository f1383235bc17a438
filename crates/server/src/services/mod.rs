//! Business logic services on top of the repositories.

pub mod audit;
pub mod auth;
pub mod email;
pub mod permissions;
