//! Domain models mapped from database rows.
//!
//! Structs here derive `sqlx::FromRow` and `serde::Serialize`; they are
//! what repositories return and what route handlers serialize. Request
//! payload types live next to their handlers in `routes/`.

pub mod announcement;
pub mod audit;
pub mod cart;
pub mod catalog;
pub mod chat;
pub mod order;
pub mod organization;
pub mod payment;
pub mod refund;
pub mod review;
pub mod ticket;
pub mod user;
pub mod voucher;

pub use user::{CurrentUser, User, session_keys};
