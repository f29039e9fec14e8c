#![doc = "The `taskhaven` library crate."]
#![doc = ""]
#![doc = "This crate contains the domain models, authentication and session machinery,"]
#![doc = "routing configuration, and error handling for the TaskHaven application."]
#![doc = "It is used by the main binary (`main.rs`) to construct and run the server."]

pub mod auth;
pub mod avatar;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod routes;
