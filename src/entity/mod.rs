//! Entity module - SeaORM entity definitions
//!
//! One module per database table. Cross-entity relations are resolved with
//! manual queries instead of ORM relation declarations.

pub mod category;
pub mod comment;
pub mod event;
pub mod group;
pub mod user;
