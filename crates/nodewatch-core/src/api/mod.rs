//! Backend REST API client
//!
//! The backend owns alerts, machines and users; this module only consumes it.

mod client;

pub use client::ApiClient;
