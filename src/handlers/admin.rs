//! Administration dashboard
//!
//! Fans out the three independent reads (my groups, upcoming events, past
//! events) and awaits them together; if any one fails the request fails.

use axum::{
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use tower_sessions::Session;

use crate::entity::{event, group};
use crate::flash::{self, FlashMessage};
use crate::middleware::{CurrentUser, DbConn};

/// View model for the dashboard
#[derive(Debug, Serialize)]
pub struct AdminView {
    pub page_title: String,
    pub messages: Vec<FlashMessage>,
    pub groups: Vec<group::Model>,
    pub upcoming: Vec<event::Model>,
    pub previous: Vec<event::Model>,
}

/// GET /administracion
pub async fn dashboard(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
) -> Response {
    let today = Utc::now().date_naive();

    let groups_query = group::Entity::find()
        .filter(group::Column::UserId.eq(current_user.id))
        .all(&*db);
    let upcoming_query = event::Entity::find()
        .filter(event::Column::UserId.eq(current_user.id))
        .filter(event::Column::Date.gte(today))
        .order_by_asc(event::Column::Date)
        .order_by_asc(event::Column::Time)
        .all(&*db);
    let previous_query = event::Entity::find()
        .filter(event::Column::UserId.eq(current_user.id))
        .filter(event::Column::Date.lt(today))
        .order_by_desc(event::Column::Date)
        .all(&*db);

    match tokio::try_join!(groups_query, upcoming_query, previous_query) {
        Ok((groups, upcoming, previous)) => Json(AdminView {
            page_title: "Panel de Administración".to_string(),
            messages: flash::take(&session).await,
            groups,
            upcoming,
            previous,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to load dashboard: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            Redirect::to("/").into_response()
        }
    }
}
