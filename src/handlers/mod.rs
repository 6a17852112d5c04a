//! Request handlers module

pub mod account;
pub mod admin;
pub mod auth;
pub mod comment;
pub mod event;
pub mod event_public;
pub mod group;
pub mod home;
pub mod search;
pub mod upload;
