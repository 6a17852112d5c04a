//! Authentication middleware
//!
//! Resolves the session into a CurrentUser extension and redirects
//! anonymous requests on private routes to the sign-in form.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::ops::Deref;
use std::sync::Arc;
use tower_sessions::Session;

use crate::entity::user;
use crate::state::AppState;

/// Session key for storing the authenticated user id
pub const SESSION_USER_KEY: &str = "user_id";

/// Database connection wrapper for use in handlers via Extension
#[derive(Clone)]
pub struct DbConn(pub Arc<DatabaseConnection>);

impl Deref for DbConn {
    type Target = DatabaseConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extension carrying the authenticated user through a request
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
}

/// Route prefixes that require an authenticated session.
/// Attendance and comment mutations dereference the session user, so they
/// are private even though they sit on the public surface.
const PRIVATE_PREFIXES: &[&str] = &[
    "/administracion",
    "/nuevo-grupo",
    "/editar-grupo",
    "/imagen-grupo",
    "/eliminar-grupo",
    "/nuevo-meeti",
    "/editar-meeti",
    "/eliminar-meeti",
    "/editar-perfil",
    "/cambiar-password",
    "/imagen-perfil",
    "/cerrar-sesion",
    "/confirmar-asistencia",
    "/eliminar-comentario",
];

/// Whether a path requires a session
pub fn is_private_path(path: &str, method: &axum::http::Method) -> bool {
    if PRIVATE_PREFIXES
        .iter()
        .any(|p| path == *p || path.starts_with(&format!("{}/", p)))
    {
        return true;
    }
    // POST /meeti/:slug adds a comment; GET /meeti/:slug is the public detail
    method == axum::http::Method::POST && path.starts_with("/meeti/")
}

/// Authentication middleware
pub async fn auth_layer(
    State(state): State<AppState>,
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    // Every handler reads the database through Extension<DbConn>
    request.extensions_mut().insert(DbConn(state.db.clone()));

    let user_id: Option<i64> = session.get(SESSION_USER_KEY).await.unwrap_or(None);

    if let Some(user_id) = user_id {
        match user::Entity::find_by_id(user_id)
            .filter(user::Column::Active.eq(true))
            .one(state.db.as_ref())
            .await
        {
            Ok(Some(user_model)) => {
                request.extensions_mut().insert(CurrentUser {
                    id: user_model.id,
                    name: user_model.name,
                    email: user_model.email,
                    image: user_model.image,
                });
            }
            Ok(None) => {
                // Stale session (deleted or deactivated account)
                tracing::warn!("Session references unknown user id {}", user_id);
                if let Err(e) = session.remove::<i64>(SESSION_USER_KEY).await {
                    tracing::error!("Failed to clear stale session: {}", e);
                }
            }
            Err(e) => {
                tracing::error!("Database error during auth: {}", e);
            }
        }
    }

    if is_private_path(&path, &method) && request.extensions().get::<CurrentUser>().is_none() {
        return Redirect::to("/iniciar-sesion").into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn test_private_prefixes() {
        assert!(is_private_path("/administracion", &Method::GET));
        assert!(is_private_path("/editar-grupo/abc", &Method::POST));
        assert!(is_private_path("/confirmar-asistencia/mi-slug", &Method::POST));
        assert!(is_private_path("/eliminar-comentario", &Method::POST));
        assert!(is_private_path("/cerrar-sesion", &Method::GET));
    }

    #[test]
    fn test_public_paths() {
        assert!(!is_private_path("/", &Method::GET));
        assert!(!is_private_path("/meeti/mi-slug", &Method::GET));
        assert!(!is_private_path("/asistentes/mi-slug", &Method::GET));
        assert!(!is_private_path("/busqueda", &Method::GET));
        assert!(!is_private_path("/iniciar-sesion", &Method::POST));
        assert!(!is_private_path("/crear-cuenta", &Method::POST));
    }

    #[test]
    fn test_comment_post_is_private_but_detail_is_not() {
        assert!(is_private_path("/meeti/123", &Method::POST));
        assert!(!is_private_path("/meeti/123", &Method::GET));
    }

    #[test]
    fn test_prefix_does_not_leak_to_lookalikes() {
        // "/administracion-publica" is not the dashboard
        assert!(!is_private_path("/administracion-publica", &Method::GET));
    }
}
