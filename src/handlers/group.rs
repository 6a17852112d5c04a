//! Group management handlers
//!
//! Owner-scoped CRUD over groups, including image upload/replacement with
//! the save-then-swap ordering that never leaves a record pointing at a
//! deleted file.

use axum::{
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::entity::{category, comment, event, group};
use crate::flash::{self, FlashMessage};
use crate::handlers::upload;
use crate::middleware::{CurrentUser, DbConn};
use crate::state::AppState;

/// Edit form body; `version` is the value the form was rendered with
#[derive(Debug, Deserialize)]
pub struct EditGroupRequest {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "categoriaId")]
    pub category_id: i32,
    #[serde(default)]
    pub url: String,
    pub version: i32,
}

/// View model for the creation form
#[derive(Debug, Serialize)]
pub struct NewGroupView {
    pub page_title: String,
    pub messages: Vec<FlashMessage>,
    pub categories: Vec<category::Model>,
}

/// View model for the edit forms
#[derive(Debug, Serialize)]
pub struct EditGroupView {
    pub page_title: String,
    pub messages: Vec<FlashMessage>,
    pub group: group::Model,
    pub categories: Vec<category::Model>,
}

/// View model for the delete confirmation form
#[derive(Debug, Serialize)]
pub struct DeleteGroupView {
    pub page_title: String,
    pub messages: Vec<FlashMessage>,
}

/// Owner-scoped lookup; `None` covers both a missing group and a foreign one
async fn find_owned(
    db: &DbConn,
    group_id: Uuid,
    user_id: i64,
) -> Result<Option<group::Model>, sea_orm::DbErr> {
    group::Entity::find_by_id(group_id)
        .filter(group::Column::UserId.eq(user_id))
        .one(&**db)
        .await
}

async fn invalid_operation(session: &Session) -> Response {
    flash::push(session, FlashMessage::error("Operación no válida")).await;
    Redirect::to("/administracion").into_response()
}

/// GET /nuevo-grupo
pub async fn new_group_form(Extension(db): Extension<DbConn>, session: Session) -> Response {
    match category::Entity::find().all(&*db).await {
        Ok(categories) => Json(NewGroupView {
            page_title: "Crea un Nuevo Grupo".to_string(),
            messages: flash::take(&session).await,
            categories,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to load categories: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            Redirect::to("/administracion").into_response()
        }
    }
}

/// POST /nuevo-grupo
pub async fn create_group(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    multipart: Multipart,
) -> Response {
    let (fields, image) = match upload::collect_form(multipart, state.config.max_image_size).await {
        Ok(parts) => parts,
        Err(e) => {
            flash::push(&session, FlashMessage::error(e.to_string())).await;
            return Redirect::to("/nuevo-grupo").into_response();
        }
    };

    let name = fields.get("nombre").cloned().unwrap_or_default();
    let description = fields.get("descripcion").cloned().unwrap_or_default();
    let url = fields.get("url").cloned().unwrap_or_default();
    let category_id = fields
        .get("categoriaId")
        .and_then(|c| c.parse::<i32>().ok());

    let mut errors = group::validate(&name, &description);
    let Some(category_id) = category_id else {
        errors.push("Elige una categoría".to_string());
        flash::push_all(&session, flash::errors(errors)).await;
        return Redirect::to("/nuevo-grupo").into_response();
    };
    if !errors.is_empty() {
        flash::push_all(&session, flash::errors(errors)).await;
        return Redirect::to("/nuevo-grupo").into_response();
    }

    let uploads_dir = state.config.group_uploads_dir();
    let image_filename = match &image {
        Some(image) => {
            if let Err(e) = upload::save_image(&uploads_dir, image).await {
                tracing::error!("Failed to store group image: {}", e);
                flash::push(&session, FlashMessage::error("No se pudo guardar la imagen")).await;
                return Redirect::to("/nuevo-grupo").into_response();
            }
            Some(image.filename.clone())
        }
        None => None,
    };

    let new_group = group::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.trim().to_string()),
        description: Set(description),
        category_id: Set(category_id),
        url: Set(Some(url).filter(|u| !u.trim().is_empty())),
        image: Set(image_filename.clone()),
        user_id: Set(current_user.id),
        version: Set(0),
    };

    match new_group.insert(&*db).await {
        Ok(_) => {
            flash::push(&session, FlashMessage::success("Se ha creado el grupo correctamente")).await;
            Redirect::to("/administracion").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to create group: {}", e);
            // Orphaned file cleanup; the record was never written
            if let Some(filename) = image_filename {
                upload::delete_image(&uploads_dir, &filename).await;
            }
            flash::push(&session, FlashMessage::error("No se pudo crear el grupo")).await;
            Redirect::to("/nuevo-grupo").into_response()
        }
    }
}

/// GET /editar-grupo/:grupoId
pub async fn edit_group_form(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Path(group_id): Path<Uuid>,
) -> Response {
    let group_query = find_owned(&db, group_id, current_user.id);
    let categories_query = category::Entity::find().all(&*db);

    match tokio::try_join!(group_query, categories_query) {
        Ok((Some(group), categories)) => Json(EditGroupView {
            page_title: format!("Editar Grupo: {}", group.name),
            messages: flash::take(&session).await,
            group,
            categories,
        })
        .into_response(),
        Ok((None, _)) => invalid_operation(&session).await,
        Err(e) => {
            tracing::error!("Failed to load group: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            Redirect::to("/administracion").into_response()
        }
    }
}

/// POST /editar-grupo/:grupoId
pub async fn edit_group(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Path(group_id): Path<Uuid>,
    Form(req): Form<EditGroupRequest>,
) -> Response {
    match find_owned(&db, group_id, current_user.id).await {
        Ok(Some(_)) => {}
        Ok(None) => return invalid_operation(&session).await,
        Err(e) => {
            tracing::error!("Database error: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            return Redirect::to("/administracion").into_response();
        }
    }

    let errors = group::validate(&req.name, &req.description);
    if !errors.is_empty() {
        flash::push_all(&session, flash::errors(errors)).await;
        return Redirect::to(&format!("/editar-grupo/{}", group_id)).into_response();
    }

    // Version-guarded save: a stale form matches zero rows and changes nothing
    let result = group::Entity::update_many()
        .col_expr(group::Column::Name, Expr::value(req.name.trim().to_string()))
        .col_expr(group::Column::Description, Expr::value(req.description))
        .col_expr(group::Column::CategoryId, Expr::value(req.category_id))
        .col_expr(
            group::Column::Url,
            Expr::value(Some(req.url).filter(|u| !u.trim().is_empty())),
        )
        .col_expr(group::Column::Version, Expr::value(req.version + 1))
        .filter(group::Column::Id.eq(group_id))
        .filter(group::Column::UserId.eq(current_user.id))
        .filter(group::Column::Version.eq(req.version))
        .exec(&*db)
        .await;

    match result {
        Ok(res) if res.rows_affected == 1 => {
            flash::push(&session, FlashMessage::success("Cambios almacenados correctamente")).await;
            Redirect::to("/administracion").into_response()
        }
        Ok(_) => {
            flash::push(&session, FlashMessage::error("El grupo cambió mientras lo editabas, intenta de nuevo")).await;
            Redirect::to(&format!("/editar-grupo/{}", group_id)).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to update group: {}", e);
            flash::push(&session, FlashMessage::error("No se pudieron guardar los cambios")).await;
            Redirect::to(&format!("/editar-grupo/{}", group_id)).into_response()
        }
    }
}

/// GET /imagen-grupo/:grupoId
pub async fn edit_image_form(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Path(group_id): Path<Uuid>,
) -> Response {
    match find_owned(&db, group_id, current_user.id).await {
        Ok(Some(group)) => Json(EditGroupView {
            page_title: format!("Editar Imagen Grupo: {}", group.name),
            messages: flash::take(&session).await,
            group,
            categories: Vec::new(),
        })
        .into_response(),
        Ok(None) => invalid_operation(&session).await,
        Err(e) => {
            tracing::error!("Database error: {}", e);
            Redirect::to("/administracion").into_response()
        }
    }
}

/// POST /imagen-grupo/:grupoId
pub async fn edit_image(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Path(group_id): Path<Uuid>,
    multipart: Multipart,
) -> Response {
    let (_, image) = match upload::collect_form(multipart, state.config.max_image_size).await {
        Ok(parts) => parts,
        Err(e) => {
            flash::push(&session, FlashMessage::error(e.to_string())).await;
            return Redirect::to(&format!("/imagen-grupo/{}", group_id)).into_response();
        }
    };

    let group = match find_owned(&db, group_id, current_user.id).await {
        Ok(Some(group)) => group,
        Ok(None) => {
            flash::push(&session, FlashMessage::error("Operación no válida")).await;
            return Redirect::to("/iniciar-sesion").into_response();
        }
        Err(e) => {
            tracing::error!("Database error: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            return Redirect::to("/administracion").into_response();
        }
    };

    let uploads_dir = state.config.group_uploads_dir();
    let previous = group.image.clone();

    if let Some(image) = image {
        if let Err(e) = upload::save_image(&uploads_dir, &image).await {
            tracing::error!("Failed to store group image: {}", e);
            flash::push(&session, FlashMessage::error("No se pudo guardar la imagen")).await;
            return Redirect::to(&format!("/imagen-grupo/{}", group_id)).into_response();
        }

        let mut active_model: group::ActiveModel = group.into();
        active_model.image = Set(Some(image.filename.clone()));
        match active_model.update(&*db).await {
            Ok(_) => {
                // Only now is the old file unreferenced
                if let Some(previous) = previous {
                    upload::delete_image(&uploads_dir, &previous).await;
                }
            }
            Err(e) => {
                tracing::error!("Failed to update group image: {}", e);
                upload::delete_image(&uploads_dir, &image.filename).await;
                flash::push(&session, FlashMessage::error("No se pudieron guardar los cambios")).await;
                return Redirect::to(&format!("/imagen-grupo/{}", group_id)).into_response();
            }
        }
    }

    flash::push(&session, FlashMessage::success("Cambios almacenados correctamente")).await;
    Redirect::to("/administracion").into_response()
}

/// GET /eliminar-grupo/:grupoId
pub async fn delete_group_form(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Path(group_id): Path<Uuid>,
) -> Response {
    match find_owned(&db, group_id, current_user.id).await {
        Ok(Some(group)) => Json(DeleteGroupView {
            page_title: format!("Eliminar Grupo: {}", group.name),
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

/// POST /eliminar-grupo/:grupoId
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Path(group_id): Path<Uuid>,
) -> Response {
    let group = match find_owned(&db, group_id, current_user.id).await {
        Ok(Some(group)) => group,
        Ok(None) => return invalid_operation(&session).await,
        Err(e) => {
            tracing::error!("Database error: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            return Redirect::to("/administracion").into_response();
        }
    };

    // Cascade: comments of the group's events, then the events, then the group
    let result = (&*db)
        .transaction::<_, (), sea_orm::DbErr>(|txn| {
            Box::pin(async move {
                let event_ids: Vec<Uuid> = event::Entity::find()
                    .filter(event::Column::GroupId.eq(group_id))
                    .all(txn)
                    .await?
                    .into_iter()
                    .map(|e| e.id)
                    .collect();

                if !event_ids.is_empty() {
                    comment::Entity::delete_many()
                        .filter(comment::Column::EventId.is_in(event_ids.clone()))
                        .exec(txn)
                        .await?;
                    event::Entity::delete_many()
                        .filter(event::Column::Id.is_in(event_ids))
                        .exec(txn)
                        .await?;
                }

                group::Entity::delete_by_id(group_id).exec(txn).await?;

                Ok(())
            })
        })
        .await;

    match result {
        Ok(()) => {
            if let Some(image) = group.image {
                upload::delete_image(&state.config.group_uploads_dir(), &image).await;
            }
            flash::push(&session, FlashMessage::success("Grupo eliminado")).await;
            Redirect::to("/administracion").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to delete group: {}", e);
            flash::push(&session, FlashMessage::error("No se pudo eliminar el grupo")).await;
            Redirect::to("/administracion").into_response()
        }
    }
}
