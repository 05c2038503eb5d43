use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_database::SchedulingState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: SchedulingState) -> Router {
    let public_routes = Router::new()
        .route("/{email}", get(handlers::get_doctor));

    let protected_routes = Router::new()
        .route("/me", put(handlers::upsert_my_profile))
        .route("/me/working-hours", put(handlers::update_my_working_hours))
        .route("/{email}/ratings", post(handlers::rate_doctor))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
