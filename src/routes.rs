// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    handlers::{
        admin, auth, books, certificates, courses, files, messages, quiz, uploads, users,
    },
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, staff_middleware},
};

/// Assembles the main application router.
///
/// * Public routes: auth, course catalogue, books, signed downloads.
/// * Authenticated routes: learner actions, profile, messages, uploads.
/// * Staff routes (admin or teacher) under `/api/staff`, admin under `/api/admin`.
/// * Global middleware: trace, CORS, body limit. Stored media under `/uploads`.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_layer = middleware::from_fn_with_state(state.config.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let public_course_routes = Router::new()
        .route("/", get(courses::list_courses))
        .route("/audience/{audience}", get(courses::list_by_audience))
        .route("/{id}", get(courses::get_course));

    let learner_course_routes = Router::new()
        .route("/me/progress", get(quiz::my_courses_progress))
        .route("/{id}/enroll", post(courses::enroll))
        .route("/{id}/progress", get(quiz::get_progress))
        .route("/{id}/attempts", get(quiz::list_my_attempts))
        .route("/{id}/finalize", post(certificates::finalize))
        .route("/{id}/modules/{index}/access", post(courses::record_quiz_access))
        .route("/{id}/modules/{index}/answers", post(quiz::submit_answers))
        .route("/{id}/modules/{index}/attempt", get(quiz::get_attempt))
        .layer(auth_layer.clone());

    let user_routes = Router::new()
        .route(
            "/{id}/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/{id}/courses", get(users::list_courses))
        .route("/me/courses/{course_id}", delete(users::unenroll))
        .layer(auth_layer.clone());

    let certificate_routes = Router::new()
        .route("/{id}", get(certificates::get_certificate))
        .route("/user/{user_id}", get(certificates::list_user_certificates))
        .layer(auth_layer.clone());

    let message_routes = Router::new()
        .route("/", get(messages::inbox).post(messages::send_message))
        .layer(auth_layer.clone());

    let book_routes = Router::new()
        .route("/", get(books::list_books))
        .route("/{id}/download", get(books::download_book));

    let upload_routes = Router::new()
        .route("/profile-image", post(uploads::upload_profile_image))
        .layer(auth_layer.clone());

    let file_routes = Router::new()
        .route("/download", get(files::download))
        .merge(
            Router::new()
                .route("/signed/{*public_id}", get(files::signed_link))
                .layer(auth_layer.clone()),
        );

    let staff_routes = Router::new()
        .route("/courses", post(courses::create_course))
        .route(
            "/courses/{id}",
            get(courses::get_course_document)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route("/courses/{id}/publish", put(courses::publish_course))
        .route("/courses/{id}/participants", get(courses::list_participants))
        .route(
            "/courses/{id}/participants/count",
            get(courses::count_participants),
        )
        .route("/books", post(books::upload_book))
        .route("/books/{id}", delete(books::delete_book))
        // Auth runs first, then the role check
        .layer(middleware::from_fn(staff_middleware))
        .layer(auth_layer.clone());

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", delete(admin::delete_user))
        .route("/users/{id}/approve", put(admin::approve_user))
        .route("/courses/{id}/attempts", get(admin::list_course_attempts))
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth_layer);

    let uploads_dir = ServeDir::new(&state.config.upload_dir);
    let body_limit = DefaultBodyLimit::max(state.config.max_body_bytes);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/courses", public_course_routes.merge(learner_course_routes))
        .nest("/api/users", user_routes)
        .nest("/api/certificates", certificate_routes)
        .nest("/api/messages", message_routes)
        .nest("/api/books", book_routes)
        .nest("/api/uploads", upload_routes)
        .nest("/api/files", file_routes)
        .nest("/api/staff", staff_routes)
        .nest("/api/admin", admin_routes)
        .nest_service("/uploads", uploads_dir)
        // Global Middleware (applied from outside in)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
