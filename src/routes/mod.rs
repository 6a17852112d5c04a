//! Router assembly
//!
//! The public surface keeps the original Spanish route names; everything
//! under the private prefixes is gated by the auth middleware.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::handlers;
use crate::middleware::auth_layer;
use crate::state::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // Session store (in-memory for now)
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_name(state.config.session.cookie_name.clone())
        .with_secure(false) // Set to true in production with HTTPS
        .with_http_only(true);

    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_size);

    let app = Router::new()
        // Public area
        .route("/", get(handlers::home::home))
        .route(
            "/meeti/:slug",
            get(handlers::event_public::show_event).post(handlers::comment::add_comment),
        )
        .route(
            "/confirmar-asistencia/:slug",
            post(handlers::event_public::confirm_attendance),
        )
        .route("/asistentes/:slug", get(handlers::event_public::show_attendees))
        .route("/eliminar-comentario", post(handlers::comment::delete_comment))
        .route("/usuarios/:id", get(handlers::home::show_user))
        .route("/grupos/:id", get(handlers::home::show_group))
        .route("/categoria/:categoria", get(handlers::event_public::show_category))
        .route("/busqueda", get(handlers::search::search))
        // Accounts
        .route(
            "/crear-cuenta",
            get(handlers::account::signup_form).post(handlers::account::signup),
        )
        .route("/confirmar-cuenta/:correo", get(handlers::account::confirm_account))
        .route(
            "/iniciar-sesion",
            get(handlers::auth::login_form).post(handlers::auth::login),
        )
        .route("/cerrar-sesion", get(handlers::auth::logout))
        // Private area
        .route("/administracion", get(handlers::admin::dashboard))
        .route(
            "/nuevo-grupo",
            get(handlers::group::new_group_form)
                .post(handlers::group::create_group)
                .layer(upload_limit.clone()),
        )
        .route(
            "/editar-grupo/:grupoId",
            get(handlers::group::edit_group_form).post(handlers::group::edit_group),
        )
        .route(
            "/imagen-grupo/:grupoId",
            get(handlers::group::edit_image_form)
                .post(handlers::group::edit_image)
                .layer(upload_limit.clone()),
        )
        .route(
            "/eliminar-grupo/:grupoId",
            get(handlers::group::delete_group_form).post(handlers::group::delete_group),
        )
        .route(
            "/nuevo-meeti",
            get(handlers::event::new_event_form).post(handlers::event::create_event),
        )
        .route(
            "/editar-meeti/:id",
            get(handlers::event::edit_event_form).post(handlers::event::edit_event),
        )
        .route(
            "/eliminar-meeti/:id",
            get(handlers::event::delete_event_form).post(handlers::event::delete_event),
        )
        .route(
            "/editar-perfil",
            get(handlers::account::edit_profile_form).post(handlers::account::edit_profile),
        )
        .route(
            "/cambiar-password",
            get(handlers::account::change_password_form).post(handlers::account::change_password),
        )
        .route(
            "/imagen-perfil",
            get(handlers::account::profile_image_form)
                .post(handlers::account::save_profile_image)
                .layer(upload_limit),
        );

    // Static assets (the uploads tree lives under public_dir)
    let serve_dir = ServeDir::new(&state.config.public_dir);

    app.fallback_service(serve_dir)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(session_layer)
                .layer(middleware::from_fn_with_state(state.clone(), auth_layer)),
        )
        .with_state(state)
}
