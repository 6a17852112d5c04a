//! Public read views: home, user profiles and group pages

use axum::{
    extract::Path,
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use tower_sessions::Session;

use crate::entity::user::UserSummary;
use crate::entity::{category, event, group, user};
use crate::flash::{self, FlashMessage};
use crate::middleware::DbConn;

/// How many upcoming events the home page shows
const HOME_EVENT_LIMIT: u64 = 3;

/// An upcoming event joined with its group and owner summaries
#[derive(Debug, Serialize)]
pub struct UpcomingEvent {
    pub event: event::Model,
    pub group: Option<group::Model>,
    pub owner: Option<UserSummary>,
}

/// View model for the home page
#[derive(Debug, Serialize)]
pub struct HomeView {
    pub page_title: String,
    pub messages: Vec<FlashMessage>,
    pub categories: Vec<category::Model>,
    pub events: Vec<UpcomingEvent>,
}

/// View model for a public user profile
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub page_title: String,
    pub user: UserSummary,
    pub description: Option<String>,
    pub groups: Vec<group::Model>,
}

/// View model for a public group page
#[derive(Debug, Serialize)]
pub struct GroupView {
    pub page_title: String,
    pub group: group::Model,
    pub events: Vec<event::Model>,
}

/// Whole-page fallback: any failed read empties the page instead of
/// rendering a partially joined listing
fn empty_home() -> Response {
    Json(HomeView {
        page_title: "Inicio".to_string(),
        messages: Vec::new(),
        categories: Vec::new(),
        events: Vec::new(),
    })
    .into_response()
}

/// GET /
pub async fn home(Extension(db): Extension<DbConn>, session: Session) -> Response {
    let today = Utc::now().date_naive();

    let categories_query = category::Entity::find().all(&*db);
    let events_query = event::Entity::find()
        .filter(event::Column::Date.gte(today))
        .order_by_asc(event::Column::Date)
        .order_by_asc(event::Column::Time)
        .limit(HOME_EVENT_LIMIT)
        .all(&*db);

    let (categories, events) = match tokio::try_join!(categories_query, events_query) {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!("Failed to load home page: {}", e);
            return empty_home();
        }
    };

    let group_ids: Vec<uuid::Uuid> = events.iter().map(|e| e.group_id).collect();
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
            tracing::error!("Failed to load home page joins: {}", e);
            return empty_home();
        }
    };

    let events = events
        .into_iter()
        .map(|e| {
            let group = groups.iter().find(|g| g.id == e.group_id).cloned();
            let owner = owners
                .iter()
                .find(|u| u.id == e.user_id)
                .cloned()
                .map(UserSummary::from);
            UpcomingEvent {
                event: e,
                group,
                owner,
            }
        })
        .collect();

    Json(HomeView {
        page_title: "Inicio".to_string(),
        messages: flash::take(&session).await,
        categories,
        events,
    })
    .into_response()
}

/// GET /usuarios/:id
pub async fn show_user(Extension(db): Extension<DbConn>, Path(user_id): Path<i64>) -> Response {
    // Both reads are independent, run them together
    let user_query = user::Entity::find_by_id(user_id).one(&*db);
    let groups_query = group::Entity::find()
        .filter(group::Column::UserId.eq(user_id))
        .all(&*db);

    match tokio::try_join!(user_query, groups_query) {
        Ok((Some(u), groups)) => Json(ProfileView {
            page_title: format!("Perfil Usuario: {}", u.name),
            description: u.description.clone(),
            user: UserSummary::from(u),
            groups,
        })
        .into_response(),
        Ok((None, _)) => Redirect::to("/").into_response(),
        Err(e) => {
            tracing::error!("Failed to load profile: {}", e);
            Redirect::to("/").into_response()
        }
    }
}

/// GET /grupos/:id
pub async fn show_group(
    Extension(db): Extension<DbConn>,
    Path(group_id): Path<uuid::Uuid>,
) -> Response {
    let today = Utc::now().date_naive();

    let group_query = group::Entity::find_by_id(group_id).one(&*db);
    let events_query = event::Entity::find()
        .filter(event::Column::GroupId.eq(group_id))
        .filter(event::Column::Date.gte(today))
        .order_by_asc(event::Column::Date)
        .order_by_asc(event::Column::Time)
        .all(&*db);

    match tokio::try_join!(group_query, events_query) {
        Ok((Some(g), events)) => Json(GroupView {
            page_title: format!("Grupo: {}", g.name),
            group: g,
            events,
        })
        .into_response(),
        Ok((None, _)) => Redirect::to("/").into_response(),
        Err(e) => {
            tracing::error!("Failed to load group page: {}", e);
            Redirect::to("/").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use chrono::{NaiveDate, NaiveTime};
    use sea_orm::{DbBackend, DbErr, MockDatabase};
    use std::sync::Arc;
    use tower_sessions::MemoryStore;
    use uuid::Uuid;

    fn sample_category() -> category::Model {
        category::Model {
            id: 1,
            name: "Tecnología".to_string(),
            slug: "tecnologia".to_string(),
        }
    }

    fn sample_event() -> event::Model {
        event::Model {
            id: Uuid::nil(),
            title: "Tech Talk".to_string(),
            slug: "tech-talk-abc123".to_string(),
            guest: None,
            capacity: 0,
            description: "Charlas".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
            time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            address: "Av. Central 1".to_string(),
            city: "CDMX".to_string(),
            state: "CDMX".to_string(),
            country: "México".to_string(),
            lat: 19.4326,
            lng: -99.1332,
            interested: Vec::new(),
            user_id: 1,
            group_id: Uuid::nil(),
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_home_empties_when_summary_reads_fail() {
        // categories and events load, the group/owner fan-out fails
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![sample_category()]])
            .append_query_results([vec![sample_event()]])
            .append_query_errors([DbErr::Custom("connection reset".to_string())])
            .into_connection();
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        let response = home(Extension(DbConn(Arc::new(db))), session).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        // the page empties instead of listing the event without its
        // group/owner summaries
        assert!(json["events"].as_array().unwrap().is_empty());
        assert!(json["categories"].as_array().unwrap().is_empty());
    }
}
