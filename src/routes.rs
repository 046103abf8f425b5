// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admit_card, examination, order, question},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Public routes: admit card login and the order flow.
/// * Bearer routes: examinations and questions. The middleware only extracts
///   the token; the session engine verifies it on every call.
/// * Global middleware: Trace, CORS.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let admit_card_routes = Router::new().route("/auth", post(admit_card::authenticate));

    let order_routes = Router::new()
        .route("/", post(order::create_order))
        .route("/calculate", post(order::calculate_order))
        .route("/{order_id}/capture", post(order::capture_order));

    let examination_routes = Router::new()
        .route("/{id}", get(examination::get_examination))
        .route("/{id}/questions", get(examination::list_questions))
        .route("/{id}/submit", post(examination::submit_attempt))
        .layer(middleware::from_fn(auth_middleware));

    let question_routes = Router::new()
        .route("/{id}", get(question::get_question))
        .route("/{id}/answer", put(question::submit_answer))
        .layer(middleware::from_fn(auth_middleware));

    Router::new()
        .nest("/api/admit-cards", admit_card_routes)
        .nest("/api/orders", order_routes)
        .nest("/api/examinations", examination_routes)
        .nest("/api/questions", question_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
