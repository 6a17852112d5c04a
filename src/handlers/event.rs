//! Event (meeti) management handlers
//!
//! Owner-scoped CRUD. The slug is derived once at creation; edits overwrite
//! every field (including the geolocation point) under a version guard.

use axum::{
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use axum::extract::Path;
use chrono::{NaiveDate, NaiveTime};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::entity::{comment, event, group};
use crate::flash::{self, FlashMessage};
use crate::middleware::{CurrentUser, DbConn};

/// Create/edit form body; everything arrives as text fields
#[derive(Debug, Deserialize)]
pub struct EventRequest {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "invitado", default)]
    pub guest: String,
    #[serde(rename = "cupo", default)]
    pub capacity: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "fecha")]
    pub date: String,
    #[serde(rename = "hora")]
    pub time: String,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "ciudad")]
    pub city: String,
    #[serde(rename = "estado")]
    pub state: String,
    #[serde(rename = "pais")]
    pub country: String,
    pub lat: String,
    pub lng: String,
    #[serde(rename = "grupoId")]
    pub group_id: Uuid,
    /// Present on edits only
    #[serde(default)]
    pub version: i32,
}

/// Parsed and validated event fields
#[derive(Debug)]
struct EventFields {
    title: String,
    guest: Option<String>,
    capacity: i32,
    description: String,
    date: NaiveDate,
    time: NaiveTime,
    address: String,
    city: String,
    state: String,
    country: String,
    lat: f64,
    lng: f64,
}

/// View model for the creation form
#[derive(Debug, Serialize)]
pub struct NewEventView {
    pub page_title: String,
    pub messages: Vec<FlashMessage>,
    pub groups: Vec<group::Model>,
}

/// View model for the edit form
#[derive(Debug, Serialize)]
pub struct EditEventView {
    pub page_title: String,
    pub messages: Vec<FlashMessage>,
    pub groups: Vec<group::Model>,
    pub event: event::Model,
}

/// View model for the delete confirmation form
#[derive(Debug, Serialize)]
pub struct DeleteEventView {
    pub page_title: String,
    pub messages: Vec<FlashMessage>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| "Agrega una fecha válida para el meeti".to_string())
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| "Agrega una hora válida para el meeti".to_string())
}

fn parse_coordinate(raw: &str, label: &str) -> Result<f64, String> {
    // f64::parse accepts NaN/inf, which the distance SQL cannot use
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("Agrega una {} válida", label))
}

/// Validate and convert the raw form; aggregates every error message
fn parse_event_form(req: &EventRequest) -> Result<EventFields, Vec<String>> {
    let mut errors = event::validate(
        &req.title,
        &req.description,
        &req.address,
        &req.city,
        &req.state,
        &req.country,
    );

    let capacity = event::parse_capacity(&req.capacity).map_err(|e| errors.push(e)).ok();
    let date = parse_date(&req.date).map_err(|e| errors.push(e)).ok();
    let time = parse_time(&req.time).map_err(|e| errors.push(e)).ok();
    let lat = parse_coordinate(&req.lat, "latitud").map_err(|e| errors.push(e)).ok();
    let lng = parse_coordinate(&req.lng, "longitud").map_err(|e| errors.push(e)).ok();

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(EventFields {
        title: req.title.trim().to_string(),
        guest: Some(req.guest.trim().to_string()).filter(|g| !g.is_empty()),
        capacity: capacity.unwrap(),
        description: req.description.clone(),
        date: date.unwrap(),
        time: time.unwrap(),
        address: req.address.trim().to_string(),
        city: req.city.trim().to_string(),
        state: req.state.trim().to_string(),
        country: req.country.trim().to_string(),
        lat: lat.unwrap(),
        lng: lng.unwrap(),
    })
}

async fn invalid_operation(session: &Session) -> Response {
    flash::push(session, FlashMessage::error("Operación no válida")).await;
    Redirect::to("/administracion").into_response()
}

/// GET /nuevo-meeti
pub async fn new_event_form(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
) -> Response {
    match group::Entity::find()
        .filter(group::Column::UserId.eq(current_user.id))
        .all(&*db)
        .await
    {
        Ok(groups) => Json(NewEventView {
            page_title: "Crear Nuevo Meeti".to_string(),
            messages: flash::take(&session).await,
            groups,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to load groups: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            Redirect::to("/administracion").into_response()
        }
    }
}

/// POST /nuevo-meeti
pub async fn create_event(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Form(req): Form<EventRequest>,
) -> Response {
    let fields = match parse_event_form(&req) {
        Ok(fields) => fields,
        Err(errors) => {
            flash::push_all(&session, flash::errors(errors)).await;
            return Redirect::to("/nuevo-meeti").into_response();
        }
    };

    // The target group must belong to the session user
    let owned_group = group::Entity::find_by_id(req.group_id)
        .filter(group::Column::UserId.eq(current_user.id))
        .one(&*db)
        .await;
    match owned_group {
        Ok(Some(_)) => {}
        Ok(None) => return invalid_operation(&session).await,
        Err(e) => {
            tracing::error!("Database error: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            return Redirect::to("/nuevo-meeti").into_response();
        }
    }

    let new_event = event::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(fields.title.clone()),
        slug: Set(event::make_slug(&fields.title)),
        guest: Set(fields.guest),
        capacity: Set(fields.capacity),
        description: Set(fields.description),
        date: Set(fields.date),
        time: Set(fields.time),
        address: Set(fields.address),
        city: Set(fields.city),
        state: Set(fields.state),
        country: Set(fields.country),
        lat: Set(fields.lat),
        lng: Set(fields.lng),
        interested: Set(Vec::new()),
        user_id: Set(current_user.id),
        group_id: Set(req.group_id),
        version: Set(0),
    };

    match new_event.insert(&*db).await {
        Ok(_) => {
            flash::push(&session, FlashMessage::success("Se ha creado el meeti correctamente")).await;
            Redirect::to("/administracion").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to create event: {}", e);
            flash::push(&session, FlashMessage::error("No se pudo crear el meeti")).await;
            Redirect::to("/nuevo-meeti").into_response()
        }
    }
}

/// GET /editar-meeti/:id
pub async fn edit_event_form(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Path(event_id): Path<Uuid>,
) -> Response {
    let groups_query = group::Entity::find()
        .filter(group::Column::UserId.eq(current_user.id))
        .all(&*db);
    let event_query = event::Entity::find_by_id(event_id)
        .filter(event::Column::UserId.eq(current_user.id))
        .one(&*db);

    match tokio::try_join!(groups_query, event_query) {
        Ok((groups, Some(event))) => Json(EditEventView {
            page_title: format!("Editar Meeti: {}", event.title),
            messages: flash::take(&session).await,
            groups,
            event,
        })
        .into_response(),
        Ok((_, None)) => invalid_operation(&session).await,
        Err(e) => {
            tracing::error!("Failed to load event: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            Redirect::to("/administracion").into_response()
        }
    }
}

/// POST /editar-meeti/:id
pub async fn edit_event(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Path(event_id): Path<Uuid>,
    Form(req): Form<EventRequest>,
) -> Response {
    let existing = event::Entity::find_by_id(event_id)
        .filter(event::Column::UserId.eq(current_user.id))
        .one(&*db)
        .await;
    match existing {
        Ok(Some(_)) => {}
        Ok(None) => return invalid_operation(&session).await,
        Err(e) => {
            tracing::error!("Database error: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            return Redirect::to("/administracion").into_response();
        }
    }

    let fields = match parse_event_form(&req) {
        Ok(fields) => fields,
        Err(errors) => {
            flash::push_all(&session, flash::errors(errors)).await;
            return Redirect::to(&format!("/editar-meeti/{}", event_id)).into_response();
        }
    };

    // Full overwrite except id/slug/interested, guarded by the version column
    let result = event::Entity::update_many()
        .col_expr(event::Column::Title, Expr::value(fields.title))
        .col_expr(event::Column::Guest, Expr::value(fields.guest))
        .col_expr(event::Column::Capacity, Expr::value(fields.capacity))
        .col_expr(event::Column::Description, Expr::value(fields.description))
        .col_expr(event::Column::Date, Expr::value(fields.date))
        .col_expr(event::Column::Time, Expr::value(fields.time))
        .col_expr(event::Column::Address, Expr::value(fields.address))
        .col_expr(event::Column::City, Expr::value(fields.city))
        .col_expr(event::Column::State, Expr::value(fields.state))
        .col_expr(event::Column::Country, Expr::value(fields.country))
        .col_expr(event::Column::Lat, Expr::value(fields.lat))
        .col_expr(event::Column::Lng, Expr::value(fields.lng))
        .col_expr(event::Column::GroupId, Expr::value(req.group_id))
        .col_expr(event::Column::Version, Expr::value(req.version + 1))
        .filter(event::Column::Id.eq(event_id))
        .filter(event::Column::UserId.eq(current_user.id))
        .filter(event::Column::Version.eq(req.version))
        .exec(&*db)
        .await;

    match result {
        Ok(res) if res.rows_affected == 1 => {
            flash::push(&session, FlashMessage::success("Cambios guardados correctamente")).await;
            Redirect::to("/administracion").into_response()
        }
        Ok(_) => {
            flash::push(&session, FlashMessage::error("El meeti cambió mientras lo editabas, intenta de nuevo")).await;
            Redirect::to(&format!("/editar-meeti/{}", event_id)).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to update event: {}", e);
            flash::push(&session, FlashMessage::error("No se pudieron guardar los cambios")).await;
            Redirect::to(&format!("/editar-meeti/{}", event_id)).into_response()
        }
    }
}

/// GET /eliminar-meeti/:id
pub async fn delete_event_form(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Path(event_id): Path<Uuid>,
) -> Response {
    let found = event::Entity::find_by_id(event_id)
        .filter(event::Column::UserId.eq(current_user.id))
        .one(&*db)
        .await;
    match found {
        Ok(Some(event)) => Json(DeleteEventView {
            page_title: format!("Eliminar Meeti: {}", event.title),
            messages: flash::take(&session).await,
        })
        .into_response(),
        Ok(None) => invalid_operation(&session).await,
        Err(e) => {
            tracing::error!("Database error: {}", e);
            Redirect::to("/administracion").into_response()
        }
    }
}

/// POST /eliminar-meeti/:id
pub async fn delete_event(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Path(event_id): Path<Uuid>,
) -> Response {
    let found = event::Entity::find_by_id(event_id)
        .filter(event::Column::UserId.eq(current_user.id))
        .one(&*db)
        .await;
    match found {
        Ok(Some(_)) => {}
        Ok(None) => return invalid_operation(&session).await,
        Err(e) => {
            tracing::error!("Database error: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            return Redirect::to("/administracion").into_response();
        }
    }

    // Cascade comments with the event
    let result = (&*db)
        .transaction::<_, (), sea_orm::DbErr>(|txn| {
            Box::pin(async move {
                comment::Entity::delete_many()
                    .filter(comment::Column::EventId.eq(event_id))
                    .exec(txn)
                    .await?;
                event::Entity::delete_by_id(event_id).exec(txn).await?;
                Ok(())
            })
        })
        .await;

    match result {
        Ok(()) => {
            flash::push(&session, FlashMessage::success("Meeti eliminado")).await;
            Redirect::to("/administracion").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to delete event: {}", e);
            flash::push(&session, FlashMessage::error("No se pudo eliminar el meeti")).await;
            Redirect::to("/administracion").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> EventRequest {
        EventRequest {
            title: "Noche de Rust".to_string(),
            guest: "".to_string(),
            capacity: "".to_string(),
            description: "Charlas y networking".to_string(),
            date: "2026-09-15".to_string(),
            time: "19:00".to_string(),
            address: "Av. Central 1".to_string(),
            city: "CDMX".to_string(),
            state: "CDMX".to_string(),
            country: "México".to_string(),
            lat: "19.4326".to_string(),
            lng: "-99.1332".to_string(),
            group_id: Uuid::new_v4(),
            version: 0,
        }
    }

    #[test]
    fn test_parse_event_form_defaults_empty_capacity_to_zero() {
        let fields = parse_event_form(&sample_request()).unwrap();
        assert_eq!(fields.capacity, 0);
        assert_eq!(fields.guest, None);
        assert_eq!(fields.lat, 19.4326);
        assert_eq!(fields.lng, -99.1332);
    }

    #[test]
    fn test_parse_event_form_accepts_seconds_in_time() {
        let mut req = sample_request();
        req.time = "19:30:15".to_string();
        let fields = parse_event_form(&req).unwrap();
        assert_eq!(fields.time, NaiveTime::from_hms_opt(19, 30, 15).unwrap());
    }

    #[test]
    fn test_parse_event_form_aggregates_errors() {
        let mut req = sample_request();
        req.title = "".to_string();
        req.date = "15/09/2026".to_string();
        req.lat = "norte".to_string();
        let errors = parse_event_form(&req).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&"Agrega un título".to_string()));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("mañana").is_err());
        assert!(parse_date("2026-09-15").is_ok());
    }

    #[test]
    fn test_parse_coordinate_rejects_non_finite() {
        assert_eq!(parse_coordinate("19.4326", "latitud"), Ok(19.4326));
        assert!(parse_coordinate("NaN", "latitud").is_err());
        assert!(parse_coordinate("inf", "latitud").is_err());
        assert!(parse_coordinate("-inf", "longitud").is_err());
        assert!(parse_coordinate("infinity", "longitud").is_err());
    }
}
