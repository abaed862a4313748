//! Kirana storefront library.
//!
//! The JSON API server for the Kirana grocery store: catalog, cart,
//! checkout with Razorpay or cash on delivery, and the admin console API.
//! Exposed as a library so the CLI and integration tests can reuse it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
