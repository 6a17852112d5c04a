//! User entity
//!
//! Table: usuario. Accounts start inactive and are activated through the
//! email confirmation link.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usuario")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Display name
    #[sea_orm(column_type = "String(Some(100))")]
    pub name: String,

    /// Profile image filename under uploads/perfiles
    #[sea_orm(column_type = "String(Some(120))", nullable)]
    pub image: Option<String>,

    /// Profile description
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(column_type = "String(Some(120))", unique)]
    pub email: String,

    /// bcrypt hash
    #[sea_orm(column_type = "String(Some(128))")]
    #[serde(skip_serializing)]
    pub password: String,

    /// Set once the confirmation link is visited
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Compare a candidate password against the stored bcrypt hash
    pub fn verify_password(&self, candidate: &str) -> bool {
        bcrypt::verify(candidate, &self.password).unwrap_or(false)
    }
}

/// Hash a plaintext password for storage
pub fn hash_password(plain: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plain, bcrypt::DEFAULT_COST)
}

/// User display projection for public views (attendee lists, comment authors)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
}

impl From<Model> for UserSummary {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            image: model.image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(hash: String) -> Model {
        Model {
            id: 1,
            name: "Ana".to_string(),
            image: None,
            description: None,
            email: "ana@example.com".to_string(),
            password: hash,
            active: true,
        }
    }

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correcto").unwrap();
        let user = sample_user(hash);
        assert!(user.verify_password("correcto"));
        assert!(!user.verify_password("incorrecto"));
    }

    #[test]
    fn test_verify_tolerates_bad_hash() {
        let user = sample_user("not-a-bcrypt-hash".to_string());
        assert!(!user.verify_password("anything"));
    }

    #[test]
    fn test_summary_drops_private_fields() {
        let user = sample_user("hash".to_string());
        let summary = UserSummary::from(user);
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("email").is_none());
        assert_eq!(json["name"], "Ana");
    }
}
