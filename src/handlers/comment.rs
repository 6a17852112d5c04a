//! Comment handlers
//!
//! Any authenticated user can comment on an event; deletion is restricted
//! to the comment's author or the owner of the parent event.

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use tower_sessions::Session;

use crate::entity::{comment, event};
use crate::error::{AppError, AppResult, OptionExt};
use crate::flash::{self, FlashMessage};
use crate::middleware::{CurrentUser, DbConn};

/// Add-comment form body
#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    #[serde(rename = "comentario")]
    pub message: String,
}

/// Delete-comment form body
#[derive(Debug, Deserialize)]
pub struct DeleteCommentRequest {
    #[serde(rename = "comentarioId")]
    pub comment_id: i64,
}

/// POST /meeti/:slug
pub async fn add_comment(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Path(slug): Path<String>,
    Form(req): Form<AddCommentRequest>,
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

    let back = format!("/meeti/{}", meeti.slug);

    if req.message.trim().is_empty() {
        flash::push(&session, FlashMessage::error("El comentario no puede ir vacío")).await;
        return Redirect::to(&back).into_response();
    }

    let new_comment = comment::ActiveModel {
        message: Set(req.message.trim().to_string()),
        user_id: Set(current_user.id),
        event_id: Set(meeti.id),
        ..Default::default()
    };

    if let Err(e) = new_comment.insert(&*db).await {
        tracing::error!("Failed to create comment: {}", e);
        flash::push(&session, FlashMessage::error("No se pudo agregar el comentario")).await;
    }

    Redirect::to(&back).into_response()
}

/// POST /eliminar-comentario
///
/// Plain-text API endpoint: 404 when the comment is missing, 403 when the
/// requester is neither the author nor the event owner.
pub async fn delete_comment(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Form(req): Form<DeleteCommentRequest>,
) -> AppResult<Response> {
    let target = comment::Entity::find_by_id(req.comment_id)
        .one(&*db)
        .await?
        .ok_or_not_found("comentario")?;

    // Parent event, looked up through the comment's own event id
    let parent = event::Entity::find_by_id(target.event_id)
        .one(&*db)
        .await?
        .ok_or_not_found("meeti")?;

    if !can_delete(&target, &parent, current_user.id) {
        return Err(AppError::Forbidden);
    }

    comment::Entity::delete_many()
        .filter(comment::Column::Id.eq(target.id))
        .exec(&*db)
        .await?;

    Ok((StatusCode::OK, "Comentario Eliminado Correctamente").into_response())
}

/// The comment's author and the event's owner may delete the comment
fn can_delete(target: &comment::Model, parent: &event::Model, requester: i64) -> bool {
    target.user_id == requester || parent.user_id == requester
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use uuid::Uuid;

    fn sample_comment(author: i64) -> comment::Model {
        comment::Model {
            id: 1,
            message: "Buen meeti".to_string(),
            user_id: author,
            event_id: Uuid::nil(),
        }
    }

    fn sample_event(owner: i64) -> event::Model {
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
            user_id: owner,
            group_id: Uuid::nil(),
            version: 0,
        }
    }

    #[test]
    fn test_author_can_delete() {
        assert!(can_delete(&sample_comment(7), &sample_event(1), 7));
    }

    #[test]
    fn test_event_owner_can_delete_foreign_comment() {
        assert!(can_delete(&sample_comment(7), &sample_event(1), 1));
    }

    #[test]
    fn test_third_party_cannot_delete() {
        assert!(!can_delete(&sample_comment(7), &sample_event(1), 99));
    }
}
