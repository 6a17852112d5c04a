//! Group entity
//!
//! Table: grupo. A categorized community owned by a user; the owner is
//! assigned at creation and never changes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "grupo")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "String(Some(100))")]
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub category_id: i32,

    /// External site of the group
    #[sea_orm(column_type = "String(Some(200))", nullable)]
    pub url: Option<String>,

    /// Image filename under uploads/grupos
    #[sea_orm(column_type = "String(Some(120))", nullable)]
    pub image: Option<String>,

    /// Owner; immutable after creation
    pub user_id: i64,

    /// Optimistic concurrency guard, bumped on every edit
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Validate fields before persisting; returns human-readable messages
pub fn validate(name: &str, description: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if name.trim().is_empty() {
        errors.push("Agrega un nombre para el grupo".to_string());
    }
    if description.trim().is_empty() {
        errors.push("Agrega una descripción".to_string());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_collects_all_errors() {
        let errors = validate("", "  ");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_validate_ok() {
        assert!(validate("Rustaceans CDMX", "Meetups de Rust").is_empty());
    }
}
