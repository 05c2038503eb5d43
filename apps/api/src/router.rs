use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use doctor_cell::router::doctor_routes;
use shared_database::SchedulingState;

pub fn create_router(state: SchedulingState) -> Router {
    Router::new()
        .route("/", get(|| async { "CarePortal scheduling API is running!" }))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state))
}
