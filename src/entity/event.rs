//! Event (meeti) entity
//!
//! Table: evento. A scheduled gathering belonging to a group, with a
//! geolocation point (lat/lng columns, distance math delegated to the
//! database) and the list of interested user ids.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "evento")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "String(Some(150))")]
    pub title: String,

    /// Derived from the title at creation, immutable
    #[sea_orm(column_type = "String(Some(180))", unique)]
    pub slug: String,

    /// Invited guest / speaker
    #[sea_orm(column_type = "String(Some(150))", nullable)]
    pub guest: Option<String>,

    /// 0 means unlimited
    pub capacity: i32,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub date: Date,

    pub time: Time,

    #[sea_orm(column_type = "String(Some(200))")]
    pub address: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub city: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub state: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub country: String,

    pub lat: f64,

    pub lng: f64,

    /// Ids of users who confirmed attendance
    pub interested: Vec<i64>,

    /// Owner; also the owner of the group
    pub user_id: i64,

    pub group_id: Uuid,

    /// Optimistic concurrency guard, bumped on every edit
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Lowercase the title and collapse everything non-alphanumeric into dashes
fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Build the unique slug: slugified title plus a random suffix
pub fn make_slug(title: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", slugify(title), &suffix[..8])
}

/// Empty capacity means an explicit default of 0
pub fn parse_capacity(raw: &str) -> Result<i32, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<i32>()
        .map_err(|_| "El cupo debe ser un número".to_string())
        .and_then(|n| {
            if n < 0 {
                Err("El cupo no puede ser negativo".to_string())
            } else {
                Ok(n)
            }
        })
}

/// Validate required text fields; returns human-readable messages
pub fn validate(title: &str, description: &str, address: &str, city: &str, state: &str, country: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if title.trim().is_empty() {
        errors.push("Agrega un título".to_string());
    }
    if description.trim().is_empty() {
        errors.push("Agrega una descripción".to_string());
    }
    if address.trim().is_empty() {
        errors.push("Agrega una dirección".to_string());
    }
    if city.trim().is_empty() {
        errors.push("Agrega una ciudad".to_string());
    }
    if state.trim().is_empty() {
        errors.push("Agrega un estado".to_string());
    }
    if country.trim().is_empty() {
        errors.push("Agrega un país".to_string());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Noche de Rust & WebAssembly"), "noche-de-rust-webassembly");
        assert_eq!(slugify("  Hola!!  "), "hola");
    }

    #[test]
    fn test_make_slug_has_random_suffix() {
        let a = make_slug("Tech Talk");
        let b = make_slug("Tech Talk");
        assert!(a.starts_with("tech-talk-"));
        assert_ne!(a, b);
        // suffix is 8 hex chars
        assert_eq!(a.len(), "tech-talk-".len() + 8);
    }

    #[test]
    fn test_parse_capacity_empty_defaults_to_zero() {
        assert_eq!(parse_capacity(""), Ok(0));
        assert_eq!(parse_capacity("   "), Ok(0));
    }

    #[test]
    fn test_parse_capacity() {
        assert_eq!(parse_capacity("25"), Ok(25));
        assert!(parse_capacity("-3").is_err());
        assert!(parse_capacity("veinte").is_err());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let errors = validate("", "", "", "", "", "");
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&"Agrega un título".to_string()));
    }

    #[test]
    fn test_validate_ok() {
        let errors = validate("Meetup", "Charlas", "Av. Central 1", "CDMX", "CDMX", "México");
        assert!(errors.is_empty());
    }
}
