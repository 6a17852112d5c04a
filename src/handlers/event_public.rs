//! Public event views and attendance tracking
//!
//! Event detail with nearby events and comments, the confirm/cancel
//! attendance endpoint, the attendee list and the per-category listing.
//! Distance math is delegated to the database; this module only owns the
//! filter/order/limit policy on top of it.

use axum::{
    extract::Path,
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, Statement,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::entity::{category, comment, event, group, user};
use crate::entity::user::UserSummary;
use crate::error::{AppResult, OptionExt};
use crate::flash::{self, FlashMessage};
use crate::middleware::{CurrentUser, DbConn};

/// Nearby events are capped to this great-circle distance, in meters
const NEARBY_RADIUS_METERS: f64 = 2000.0;
/// At most this many nearby events are shown
const NEARBY_LIMIT: i64 = 3;

/// Attendance form body
#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    #[serde(rename = "accion")]
    pub action: String,
}

/// A nearby event row, with its distance in meters
#[derive(Debug, Serialize, FromQueryResult)]
pub struct NearbyEvent {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub date: chrono::NaiveDate,
    pub time: chrono::NaiveTime,
    pub distance: f64,
}

/// A comment joined with its author's display record
#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub message: String,
    pub author: Option<UserSummary>,
}

/// View model for the event detail page
#[derive(Debug, Serialize)]
pub struct EventDetailView {
    pub page_title: String,
    pub messages: Vec<FlashMessage>,
    pub event: event::Model,
    pub group: Option<group::Model>,
    pub owner: Option<UserSummary>,
    pub nearby: Vec<NearbyEvent>,
    pub comments: Vec<CommentView>,
}

/// View model for the attendee list page
#[derive(Debug, Serialize)]
pub struct AttendeeListView {
    pub page_title: String,
    pub attendees: Vec<UserSummary>,
}

/// View model for the category listing page
#[derive(Debug, Serialize)]
pub struct CategoryView {
    pub page_title: String,
    pub events: Vec<event::Model>,
}

/// Nearby query: events within the radius, closest first, the shown event
/// excluded by id (not by result offset)
fn nearby_statement(lat: f64, lng: f64, exclude: Uuid) -> Statement {
    Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"SELECT "id", "title", "slug", "date", "time",
                  ST_DistanceSphere(ST_MakePoint("lng", "lat"), ST_MakePoint($1, $2)) AS "distance"
           FROM "evento"
           WHERE "id" <> $3
             AND ST_DistanceSphere(ST_MakePoint("lng", "lat"), ST_MakePoint($1, $2)) <= $4
           ORDER BY "distance" ASC
           LIMIT $5"#,
        [
            lng.into(),
            lat.into(),
            exclude.into(),
            NEARBY_RADIUS_METERS.into(),
            NEARBY_LIMIT.into(),
        ],
    )
}

/// Confirm attendance: a single atomic append with set semantics, so a user
/// who already confirmed is a no-op instead of a duplicate entry
fn confirm_statement(slug: &str, user_id: i64) -> Statement {
    Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"UPDATE "evento"
           SET "interested" = array_append("interested", $1)
           WHERE "slug" = $2 AND NOT ("interested" @> ARRAY[$1]::bigint[])"#,
        [user_id.into(), slug.into()],
    )
}

/// Cancel attendance: atomically remove every occurrence of the user id
fn cancel_statement(slug: &str, user_id: i64) -> Statement {
    Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"UPDATE "evento"
           SET "interested" = array_remove("interested", $1)
           WHERE "slug" = $2"#,
        [user_id.into(), slug.into()],
    )
}

/// GET /meeti/:slug
pub async fn show_event(
    Extension(db): Extension<DbConn>,
    session: Session,
    Path(slug): Path<String>,
) -> Response {
    let found = event::Entity::find()
        .filter(event::Column::Slug.eq(slug.as_str()))
        .one(&*db)
        .await;

    let meeti = match found {
        Ok(Some(meeti)) => meeti,
        Ok(None) => return Redirect::to("/").into_response(),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            return Redirect::to("/").into_response();
        }
    };

    let nearby_query =
        NearbyEvent::find_by_statement(nearby_statement(meeti.lat, meeti.lng, meeti.id)).all(&*db);
    let comments_query = comment::Entity::find()
        .filter(comment::Column::EventId.eq(meeti.id))
        .all(&*db);
    let group_query = group::Entity::find_by_id(meeti.group_id).one(&*db);
    let owner_query = user::Entity::find_by_id(meeti.user_id).one(&*db);

    let (nearby, comments, group, owner) =
        match tokio::try_join!(nearby_query, comments_query, group_query, owner_query) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!("Failed to load event page: {}", e);
                return Redirect::to("/").into_response();
            }
        };

    // Resolve comment authors in one query; a failed lookup fails the page
    // rather than rendering authorless comments
    let author_ids: Vec<i64> = comments.iter().map(|c| c.user_id).collect();
    let authors = if author_ids.is_empty() {
        Vec::new()
    } else {
        match user::Entity::find()
            .filter(user::Column::Id.is_in(author_ids))
            .all(&*db)
            .await
        {
            Ok(authors) => authors,
            Err(e) => {
                tracing::error!("Failed to load comment authors: {}", e);
                return Redirect::to("/").into_response();
            }
        }
    };

    let comments = comments
        .into_iter()
        .map(|c| {
            let author = authors
                .iter()
                .find(|u| u.id == c.user_id)
                .cloned()
                .map(UserSummary::from);
            CommentView {
                id: c.id,
                message: c.message,
                author,
            }
        })
        .collect();

    Json(EventDetailView {
        page_title: meeti.title.clone(),
        messages: flash::take(&session).await,
        owner: owner.map(UserSummary::from),
        group,
        nearby,
        comments,
        event: meeti,
    })
    .into_response()
}

/// POST /confirmar-asistencia/:slug
pub async fn confirm_attendance(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Form(req): Form<AttendanceRequest>,
) -> AppResult<Response> {
    event::Entity::find()
        .filter(event::Column::Slug.eq(slug.as_str()))
        .one(&*db)
        .await?
        .ok_or_not_found("meeti")?;

    let (statement, reply) = if req.action == "confirmar" {
        (confirm_statement(&slug, current_user.id), "Has Confirmado tu Asistencia")
    } else {
        (cancel_statement(&slug, current_user.id), "Has Cancelado tu Asistencia")
    };

    db.execute(statement).await?;
    Ok(reply.into_response())
}

/// GET /asistentes/:slug
pub async fn show_attendees(
    Extension(db): Extension<DbConn>,
    Path(slug): Path<String>,
) -> Response {
    let found = event::Entity::find()
        .filter(event::Column::Slug.eq(slug.as_str()))
        .one(&*db)
        .await;

    let meeti = match found {
        Ok(Some(meeti)) => meeti,
        Ok(None) => return Redirect::to("/").into_response(),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            return Redirect::to("/").into_response();
        }
    };

    let attendees = if meeti.interested.is_empty() {
        Vec::new()
    } else {
        match user::Entity::find()
            .filter(user::Column::Id.is_in(meeti.interested.clone()))
            .all(&*db)
            .await
        {
            Ok(users) => users.into_iter().map(UserSummary::from).collect(),
            Err(e) => {
                tracing::error!("Failed to load attendees: {}", e);
                return Redirect::to("/").into_response();
            }
        }
    };

    Json(AttendeeListView {
        page_title: "Listado de Asistentes".to_string(),
        attendees,
    })
    .into_response()
}

/// GET /categoria/:categoria
pub async fn show_category(
    Extension(db): Extension<DbConn>,
    Path(slug): Path<String>,
) -> Response {
    let found = category::Entity::find()
        .filter(category::Column::Slug.eq(slug.as_str()))
        .one(&*db)
        .await;

    let cat = match found {
        Ok(Some(cat)) => cat,
        Ok(None) => return Redirect::to("/").into_response(),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            return Redirect::to("/").into_response();
        }
    };

    // Manual join: groups in the category, then their events
    let group_ids: Vec<Uuid> = match group::Entity::find()
        .filter(group::Column::CategoryId.eq(cat.id))
        .all(&*db)
        .await
    {
        Ok(groups) => groups.into_iter().map(|g| g.id).collect(),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            return Redirect::to("/").into_response();
        }
    };

    let events = if group_ids.is_empty() {
        Vec::new()
    } else {
        match event::Entity::find()
            .filter(event::Column::GroupId.is_in(group_ids))
            .order_by_asc(event::Column::Date)
            .order_by_asc(event::Column::Time)
            .all(&*db)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Database error: {}", e);
                return Redirect::to("/").into_response();
            }
        }
    };

    Json(CategoryView {
        page_title: format!("Categoría: {}", cat.name),
        events,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::{NaiveDate, NaiveTime};
    use sea_orm::{DbErr, MockDatabase};
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

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

    fn sample_comment() -> comment::Model {
        comment::Model {
            id: 1,
            message: "Buen meeti".to_string(),
            user_id: 7,
            event_id: Uuid::nil(),
        }
    }

    #[tokio::test]
    async fn test_event_detail_fails_closed_when_author_lookup_fails() {
        // slug lookup, nearby, comments, group and owner all answer; the
        // comment-author resolution fails
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![sample_event()]])
            .append_query_results([Vec::<event::Model>::new()])
            .append_query_results([vec![sample_comment()]])
            .append_query_results([Vec::<group::Model>::new()])
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_errors([DbErr::Custom("connection reset".to_string())])
            .into_connection();
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        let response = show_event(
            Extension(DbConn(Arc::new(db))),
            session,
            Path("tech-talk-abc123".to_string()),
        )
        .await;

        // the page must not render the comment with `author: None`
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get("location").unwrap(), "/");
    }

    #[test]
    fn test_nearby_statement_policy() {
        let stmt = nearby_statement(19.4326, -99.1332, Uuid::nil());
        let sql = stmt.sql.as_str();
        assert!(sql.contains("ST_DistanceSphere"));
        assert!(sql.contains(r#"ORDER BY "distance" ASC"#));
        assert!(sql.contains(r#""id" <> $3"#));
        let values = stmt.values.as_ref().unwrap();
        // lng first (x), lat second (y), then exclusion id, radius, limit
        assert_eq!(values.0.len(), 5);
        assert_eq!(values.0[3], sea_orm::Value::from(2000.0));
        assert_eq!(values.0[4], sea_orm::Value::from(3i64));
    }

    #[test]
    fn test_confirm_statement_has_set_semantics() {
        let stmt = confirm_statement("tech-talk-abc123", 42);
        let sql = stmt.sql.as_str();
        assert!(sql.contains("array_append"));
        assert!(sql.contains(r#"NOT ("interested" @> ARRAY[$1]::bigint[])"#));
        assert!(sql.contains(r#""slug" = $2"#));
    }

    #[test]
    fn test_cancel_statement_removes_all_occurrences() {
        let stmt = cancel_statement("tech-talk-abc123", 42);
        let sql = stmt.sql.as_str();
        assert!(sql.contains("array_remove"));
        assert!(!sql.contains("array_append"));
    }

    #[test]
    fn test_unknown_action_falls_back_to_cancel() {
        // Mirrors the two-branch contract: anything that is not an explicit
        // confirmation cancels
        let req = AttendanceRequest {
            action: "cancelar".to_string(),
        };
        assert_ne!(req.action, "confirmar");
    }
}
