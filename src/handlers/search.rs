//! Text/category search
//!
//! Case-insensitive substring match over event text fields, optionally
//! narrowed to one category via the owning group (manual join: category ->
//! group ids -> events).

use axum::{
    extract::Query,
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::user::UserSummary;
use crate::entity::{event, group, user};
use crate::middleware::DbConn;

/// Search query parameters; every field may be absent or empty
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "categoria", default)]
    pub category: String,
    #[serde(rename = "titulo", default)]
    pub title: String,
    #[serde(rename = "ciudad", default)]
    pub city: String,
    #[serde(rename = "pais", default)]
    pub country: String,
}

/// One search hit: the event joined with group and owner summaries
#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub event: event::Model,
    pub group: Option<group::Model>,
    pub owner: Option<UserSummary>,
}

/// View model for the results page
#[derive(Debug, Serialize)]
pub struct SearchView {
    pub page_title: String,
    pub results: Vec<SearchHit>,
}

/// Substring conditions over the event text fields; an empty term matches
/// everything, mirroring `ILIKE '%%'`
fn search_condition(title: &str, city: &str, country: &str) -> Condition {
    Condition::all()
        .add(Expr::col(event::Column::Title).ilike(format!("%{}%", title)))
        .add(Expr::col(event::Column::City).ilike(format!("%{}%", city)))
        .add(Expr::col(event::Column::Country).ilike(format!("%{}%", country)))
}

/// GET /busqueda
pub async fn search(
    Extension(db): Extension<DbConn>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let mut select = event::Entity::find().filter(search_condition(
        &query.title,
        &query.city,
        &query.country,
    ));

    // Empty category means no category filter
    if !query.category.trim().is_empty() {
        let Ok(category_id) = query.category.trim().parse::<i32>() else {
            return Redirect::to("/").into_response();
        };
        let group_ids: Vec<Uuid> = match group::Entity::find()
            .filter(group::Column::CategoryId.eq(category_id))
            .all(&*db)
            .await
        {
            Ok(groups) => groups.into_iter().map(|g| g.id).collect(),
            Err(e) => {
                tracing::error!("Database error: {}", e);
                return Redirect::to("/").into_response();
            }
        };
        select = select.filter(event::Column::GroupId.is_in(group_ids));
    }

    let events = match select.all(&*db).await {
        Ok(events) => events,
        Err(e) => {
            tracing::error!("Search failed: {}", e);
            return Redirect::to("/").into_response();
        }
    };

    let group_ids: Vec<Uuid> = events.iter().map(|e| e.group_id).collect();
    let owner_ids: Vec<i64> = events.iter().map(|e| e.user_id).collect();

    let groups_query = group::Entity::find()
        .filter(group::Column::Id.is_in(group_ids))
        .all(&*db);
    let owners_query = user::Entity::find()
        .filter(user::Column::Id.is_in(owner_ids))
        .all(&*db);

    let (groups, owners) = match tokio::try_join!(groups_query, owners_query) {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!("Search join failed: {}", e);
            return Redirect::to("/").into_response();
        }
    };

    let results = events
        .into_iter()
        .map(|e| {
            let group = groups.iter().find(|g| g.id == e.group_id).cloned();
            let owner = owners
                .iter()
                .find(|u| u.id == e.user_id)
                .cloned()
                .map(UserSummary::from);
            SearchHit {
                event: e,
                group,
                owner,
            }
        })
        .collect();

    Json(SearchView {
        page_title: "Resultados Búsqueda".to_string(),
        results,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, QueryTrait};

    fn sql_for(title: &str, city: &str, country: &str) -> String {
        event::Entity::find()
            .filter(search_condition(title, city, country))
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let sql = sql_for("Tech", "", "");
        assert!(sql.contains("ILIKE"));
        assert!(sql.contains("'%Tech%'"));
    }

    #[test]
    fn test_empty_terms_match_everything() {
        // titulo="Tech", ciudad="", pais="" must only constrain the title
        let sql = sql_for("Tech", "", "");
        assert!(sql.contains("'%%'"));
    }

    #[test]
    fn test_all_three_fields_are_constrained() {
        let sql = sql_for("a", "b", "c");
        assert_eq!(sql.matches("ILIKE").count(), 3);
    }
}
