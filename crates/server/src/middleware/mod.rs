//! HTTP middleware: authentication extractors, sessions, request IDs, and
//! rate limiting.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;
