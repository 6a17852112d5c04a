//! Account lifecycle handlers
//!
//! Signup with email confirmation, profile editing, password change and
//! profile image upload.

use axum::{
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::entity::user;
use crate::flash::{self, FlashMessage};
use crate::handlers::upload;
use crate::mailer::confirmation_url;
use crate::middleware::auth::SESSION_USER_KEY;
use crate::middleware::{CurrentUser, DbConn};
use crate::state::AppState;

/// Signup form body
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "confirmar")]
    pub confirm: String,
}

/// Profile form body
#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
    pub email: String,
}

/// Password change form body
#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    #[serde(rename = "anterior")]
    pub current: String,
    #[serde(rename = "nueva")]
    pub new: String,
}

/// Generic form view model (title + pending flash messages)
#[derive(Debug, Serialize)]
pub struct FormView {
    pub page_title: String,
    pub messages: Vec<FlashMessage>,
}

/// Form view model carrying the user being edited
#[derive(Debug, Serialize)]
pub struct ProfileFormView {
    pub page_title: String,
    pub messages: Vec<FlashMessage>,
    pub name: String,
    pub description: Option<String>,
    pub email: String,
    pub image: Option<String>,
}

fn validate_signup(req: &SignupRequest) -> Vec<String> {
    let mut errors = Vec::new();
    if req.name.trim().is_empty() {
        errors.push("Agrega tu nombre".to_string());
    }
    if req.email.trim().is_empty() || !req.email.contains('@') {
        errors.push("Agrega un email válido".to_string());
    }
    if req.password.is_empty() {
        errors.push("El password no puede ir vacío".to_string());
    }
    if req.confirm.is_empty() {
        errors.push("El password de confirmación no puede ir vacío".to_string());
    } else if req.confirm != req.password {
        errors.push("El password es diferente".to_string());
    }
    errors
}

/// GET /crear-cuenta
pub async fn signup_form(session: Session) -> Json<FormView> {
    Json(FormView {
        page_title: "Crea tu Cuenta".to_string(),
        messages: flash::take(&session).await,
    })
}

/// POST /crear-cuenta
pub async fn signup(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    session: Session,
    Form(req): Form<SignupRequest>,
) -> Response {
    let errors = validate_signup(&req);
    if !errors.is_empty() {
        flash::push_all(&session, flash::errors(errors)).await;
        return Redirect::to("/crear-cuenta").into_response();
    }

    let hash = match user::hash_password(&req.password) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Failed to hash password: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            return Redirect::to("/crear-cuenta").into_response();
        }
    };

    let email = req.email.trim().to_string();
    let new_user = user::ActiveModel {
        name: Set(req.name.trim().to_string()),
        email: Set(email.clone()),
        password: Set(hash),
        active: Set(false),
        ..Default::default()
    };

    let created = match new_user.insert(&*db).await {
        Ok(model) => model,
        Err(e) => {
            let message = match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => "Ese email ya está registrado".to_string(),
                _ => {
                    tracing::error!("Failed to create account: {}", e);
                    "No se pudo crear la cuenta".to_string()
                }
            };
            flash::push(&session, FlashMessage::error(message)).await;
            return Redirect::to("/crear-cuenta").into_response();
        }
    };

    let url = confirmation_url(&state.config.base_url, &created.email);
    if let Err(e) = state.mailer.send_confirmation(&created.email, &created.name, &url).await {
        // The account exists; the user can still be confirmed manually
        tracing::error!("Failed to send confirmation email to {}: {}", created.email, e);
    }

    flash::push(&session, FlashMessage::success("Hemos enviado un email, confirma tu cuenta")).await;
    Redirect::to("/iniciar-sesion").into_response()
}

/// GET /confirmar-cuenta/:correo
pub async fn confirm_account(
    Extension(db): Extension<DbConn>,
    session: Session,
    Path(email): Path<String>,
) -> Response {
    let found = match user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(&*db)
        .await
    {
        Ok(found) => found,
        Err(e) => {
            tracing::error!("Database error during confirmation: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            return Redirect::to("/crear-cuenta").into_response();
        }
    };

    let Some(db_user) = found else {
        flash::push(&session, FlashMessage::error("No existe esa cuenta")).await;
        return Redirect::to("/crear-cuenta").into_response();
    };

    let mut active_model: user::ActiveModel = db_user.into();
    active_model.active = Set(true);
    if let Err(e) = active_model.update(&*db).await {
        tracing::error!("Failed to activate account: {}", e);
        flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
        return Redirect::to("/crear-cuenta").into_response();
    }

    flash::push(&session, FlashMessage::success("La cuenta se ha confirmado, ya puedes iniciar sesión")).await;
    Redirect::to("/iniciar-sesion").into_response()
}

/// GET /editar-perfil
pub async fn edit_profile_form(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
) -> Response {
    match user::Entity::find_by_id(current_user.id).one(&*db).await {
        Ok(Some(u)) => Json(ProfileFormView {
            page_title: "Editar Perfil".to_string(),
            messages: flash::take(&session).await,
            name: u.name,
            description: u.description,
            email: u.email,
            image: u.image,
        })
        .into_response(),
        Ok(None) => Redirect::to("/iniciar-sesion").into_response(),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            Redirect::to("/administracion").into_response()
        }
    }
}

/// POST /editar-perfil
pub async fn edit_profile(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Form(req): Form<ProfileRequest>,
) -> Response {
    if req.name.trim().is_empty() || req.email.trim().is_empty() {
        flash::push(&session, FlashMessage::error("Nombre y email son obligatorios")).await;
        return Redirect::to("/editar-perfil").into_response();
    }

    let mut active_model = user::ActiveModel {
        id: Set(current_user.id),
        ..Default::default()
    };
    active_model.name = Set(req.name.trim().to_string());
    active_model.description = Set(Some(req.description).filter(|d| !d.trim().is_empty()));
    active_model.email = Set(req.email.trim().to_string());

    if let Err(e) = active_model.update(&*db).await {
        let message = match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => "Ese email ya está registrado".to_string(),
            _ => {
                tracing::error!("Failed to update profile: {}", e);
                "No se pudieron guardar los cambios".to_string()
            }
        };
        flash::push(&session, FlashMessage::error(message)).await;
        return Redirect::to("/editar-perfil").into_response();
    }

    flash::push(&session, FlashMessage::success("El perfil se guardó correctamente")).await;
    Redirect::to("/administracion").into_response()
}

/// GET /cambiar-password
pub async fn change_password_form(session: Session) -> Json<FormView> {
    Json(FormView {
        page_title: "Cambiar Password".to_string(),
        messages: flash::take(&session).await,
    })
}

/// POST /cambiar-password
pub async fn change_password(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    Form(req): Form<PasswordRequest>,
) -> Response {
    let db_user = match user::Entity::find_by_id(current_user.id).one(&*db).await {
        Ok(Some(u)) => u,
        Ok(None) => return Redirect::to("/iniciar-sesion").into_response(),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            return Redirect::to("/administracion").into_response();
        }
    };

    if !db_user.verify_password(&req.current) {
        flash::push(&session, FlashMessage::error("El password actual es incorrecto")).await;
        return Redirect::to("/administracion").into_response();
    }

    if req.new.is_empty() {
        flash::push(&session, FlashMessage::error("El nuevo password no puede ir vacío")).await;
        return Redirect::to("/cambiar-password").into_response();
    }

    let hash = match user::hash_password(&req.new) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Failed to hash password: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            return Redirect::to("/cambiar-password").into_response();
        }
    };

    let mut active_model: user::ActiveModel = db_user.into();
    active_model.password = Set(hash);
    if let Err(e) = active_model.update(&*db).await {
        tracing::error!("Failed to update password: {}", e);
        flash::push(&session, FlashMessage::error("No se pudo modificar el password")).await;
        return Redirect::to("/cambiar-password").into_response();
    }

    // Force a fresh login with the new password
    if let Err(e) = session.remove::<i64>(SESSION_USER_KEY).await {
        tracing::error!("Failed to clear session: {}", e);
    }
    flash::push(&session, FlashMessage::success("Password modificado correctamente, vuelve a iniciar sesión")).await;
    Redirect::to("/iniciar-sesion").into_response()
}

/// GET /imagen-perfil
pub async fn profile_image_form(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
) -> Response {
    match user::Entity::find_by_id(current_user.id).one(&*db).await {
        Ok(Some(u)) => Json(ProfileFormView {
            page_title: "Subir Imagen de Perfil".to_string(),
            messages: flash::take(&session).await,
            name: u.name,
            description: u.description,
            email: u.email,
            image: u.image,
        })
        .into_response(),
        Ok(None) => Redirect::to("/iniciar-sesion").into_response(),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            Redirect::to("/administracion").into_response()
        }
    }
}

/// POST /imagen-perfil
pub async fn save_profile_image(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    session: Session,
    multipart: Multipart,
) -> Response {
    let (_, image) = match upload::collect_form(multipart, state.config.max_image_size).await {
        Ok(parts) => parts,
        Err(e) => {
            flash::push(&session, FlashMessage::error(e.to_string())).await;
            return Redirect::to("/imagen-perfil").into_response();
        }
    };

    let db_user = match user::Entity::find_by_id(current_user.id).one(&*db).await {
        Ok(Some(u)) => u,
        Ok(None) => return Redirect::to("/iniciar-sesion").into_response(),
        Err(e) => {
            tracing::error!("Database error: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            return Redirect::to("/administracion").into_response();
        }
    };

    let uploads_dir = state.config.profile_uploads_dir();
    let previous = db_user.image.clone();

    if let Some(image) = image {
        // New file first, record second; the old file goes away only after
        // the record points at the new one
        if let Err(e) = upload::save_image(&uploads_dir, &image).await {
            tracing::error!("Failed to store profile image: {}", e);
            flash::push(&session, FlashMessage::error("No se pudo guardar la imagen")).await;
            return Redirect::to("/imagen-perfil").into_response();
        }

        let mut active_model: user::ActiveModel = db_user.into();
        active_model.image = Set(Some(image.filename.clone()));
        match active_model.update(&*db).await {
            Ok(_) => {
                if let Some(previous) = previous {
                    upload::delete_image(&uploads_dir, &previous).await;
                }
            }
            Err(e) => {
                tracing::error!("Failed to update profile image: {}", e);
                upload::delete_image(&uploads_dir, &image.filename).await;
                flash::push(&session, FlashMessage::error("No se pudieron guardar los cambios")).await;
                return Redirect::to("/imagen-perfil").into_response();
            }
        }
    }

    flash::push(&session, FlashMessage::success("Cambios almacenados correctamente")).await;
    Redirect::to("/administracion").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, password: &str, confirm: &str) -> SignupRequest {
        SignupRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm: confirm.to_string(),
        }
    }

    #[test]
    fn test_signup_requires_matching_confirmation() {
        let errors = validate_signup(&request("Ana", "ana@example.com", "abc123", "abc124"));
        assert_eq!(errors, vec!["El password es diferente".to_string()]);
    }

    #[test]
    fn test_signup_requires_nonempty_confirmation() {
        let errors = validate_signup(&request("Ana", "ana@example.com", "abc123", ""));
        assert_eq!(errors, vec!["El password de confirmación no puede ir vacío".to_string()]);
    }

    #[test]
    fn test_signup_aggregates_errors() {
        let errors = validate_signup(&request("", "not-an-email", "", ""));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_signup_valid() {
        assert!(validate_signup(&request("Ana", "ana@example.com", "abc123", "abc123")).is_empty());
    }
}
