//! Authentication handlers
//!
//! Sign-in form, credential check and session teardown. A missing account
//! and an unconfirmed account answer with the same message so the form
//! never leaks which condition held.

use axum::{
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Select};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::entity::user;
use crate::flash::{self, FlashMessage};
use crate::middleware::auth::SESSION_USER_KEY;
use crate::middleware::DbConn;

/// Login form body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// View model for the sign-in form
#[derive(Debug, Serialize)]
pub struct LoginFormView {
    pub page_title: String,
    pub messages: Vec<FlashMessage>,
}

/// Credential lookup: only active accounts can authenticate, so an
/// unconfirmed user fails here even with the right password
fn active_user_query(email: &str) -> Select<user::Entity> {
    user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .filter(user::Column::Active.eq(true))
}

/// GET /iniciar-sesion
pub async fn login_form(session: Session) -> Json<LoginFormView> {
    Json(LoginFormView {
        page_title: "Iniciar Sesión".to_string(),
        messages: flash::take(&session).await,
    })
}

/// POST /iniciar-sesion
pub async fn login(
    Extension(db): Extension<DbConn>,
    session: Session,
    Form(req): Form<LoginRequest>,
) -> Response {
    if req.email.trim().is_empty() || req.password.is_empty() {
        flash::push(&session, FlashMessage::error("Ambos campos son obligatorios")).await;
        return Redirect::to("/iniciar-sesion").into_response();
    }

    // A missing row and an inactive one are indistinguishable in the response
    let user_result = active_user_query(req.email.trim()).one(&*db).await;

    let db_user = match user_result {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!("Login failed: unknown or unconfirmed account - {}", req.email);
            flash::push(
                &session,
                FlashMessage::error("Ese usuario no existe o no has validado tu cuenta"),
            )
            .await;
            return Redirect::to("/iniciar-sesion").into_response();
        }
        Err(e) => {
            tracing::error!("Database error during login: {}", e);
            flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
            return Redirect::to("/iniciar-sesion").into_response();
        }
    };

    if !db_user.verify_password(&req.password) {
        tracing::warn!("Login failed: wrong password - {}", req.email);
        flash::push(&session, FlashMessage::error("Password Incorrecto")).await;
        return Redirect::to("/iniciar-sesion").into_response();
    }

    if let Err(e) = session.insert(SESSION_USER_KEY, db_user.id).await {
        tracing::error!("Failed to save session: {}", e);
        flash::push(&session, FlashMessage::error("Error interno, intenta de nuevo")).await;
        return Redirect::to("/iniciar-sesion").into_response();
    }

    tracing::info!("User logged in: {}", db_user.email);
    Redirect::to("/administracion").into_response()
}

/// GET /cerrar-sesion
pub async fn logout(session: Session) -> Redirect {
    if let Err(e) = session.remove::<i64>(SESSION_USER_KEY).await {
        tracing::error!("Failed to clear session: {}", e);
    }
    flash::push(&session, FlashMessage::success("Cerraste sesión correctamente")).await;
    Redirect::to("/iniciar-sesion")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, QueryTrait};

    #[test]
    fn test_login_lookup_requires_active_account() {
        // An unconfirmed account must not authenticate even with the right
        // password: the lookup itself filters on the active flag
        let sql = active_user_query("ana@example.com")
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""active" = TRUE"#));
        assert!(sql.contains("ana@example.com"));
    }
}
