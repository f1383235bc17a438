//! Merchkins server library.
//!
//! The API surface lives here as a library so handlers, repositories, and
//! services can be tested and reused; the binary in `main.rs` is a thin
//! wrapper.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod search;
pub mod services;
pub mod state;
