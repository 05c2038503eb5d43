use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use shared_database::SchedulingState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: SchedulingState) -> Router {
    let public_routes = Router::new()
        .route("/availability", get(handlers::list_available_slots));

    let protected_routes = Router::new()
        .route("/", get(handlers::list_my_appointments).post(handlers::book_appointment))
        .route("/conflicts/check", get(handlers::check_conflicts))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::transition_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
