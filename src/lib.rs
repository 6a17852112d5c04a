//! Meeti - a server-rendered event coordination web application
//!
//! Users create interest groups, schedule meetis tied to those groups,
//! confirm attendance, comment, and search events by category, proximity
//! and text. Page handlers assemble view models; rendering them to HTML is
//! an external collaborator.

// Allow dead code for reserved/future-use structures in entity and error modules
#![allow(dead_code)]

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod flash;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod routes;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
