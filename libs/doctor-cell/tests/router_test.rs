// libs/doctor-cell/tests/router_test.rs

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use doctor_cell::router::doctor_routes;
use shared_database::{InMemoryStore, SchedulingState, SchedulingStore};
use shared_models::scheduling::AppointmentStatus;
use shared_utils::test_utils::{
    appointment, future_monday, time, weekday_doctor, JwtTestUtils, TestConfig, TestUser,
};

const DOCTOR: &str = "doc@example.com";
const PATIENT: &str = "pat@example.com";

async fn app() -> (Router, Arc<InMemoryStore>, TestConfig) {
    let config = TestConfig::default();
    let store = Arc::new(InMemoryStore::new());
    store.seed_doctor(weekday_doctor(DOCTOR)).await;
    let state = SchedulingState::new(config.to_arc(), store.clone());
    (doctor_routes(state), store, config)
}

fn json_request(method: &str, uri: &str, auth: Option<String>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn public_profile_lookup() {
    let (app, _, _) = app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/Doc@Example.com").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["email"], DOCTOR);
    assert_eq!(body["review_count"], 0);

    let missing = app
        .oneshot(Request::builder().uri("/ghost@example.com").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(missing).await["code"], "not_found");
}

#[tokio::test]
async fn rating_requires_a_valid_token() {
    let (app, _, _) = app().await;

    let anonymous = app
        .clone()
        .oneshot(json_request("POST", "/doc@example.com/ratings", None, json!({ "rating": 5 })))
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let forged = JwtTestUtils::create_invalid_signature_token(&TestUser::patient(PATIENT));
    let rejected = app
        .oneshot(json_request(
            "POST",
            "/doc@example.com/ratings",
            Some(format!("Bearer {}", forged)),
            json!({ "rating": 5 }),
        ))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(rejected).await["code"], "unauthorized");
}

#[tokio::test]
async fn second_rating_for_an_appointment_conflicts() {
    let (app, store, config) = app().await;
    let visit = appointment(PATIENT, DOCTOR, future_monday(), time(10, 0), time(10, 30), AppointmentStatus::Completed);
    let id = visit.id;
    store.seed_appointment(visit).await;

    let bearer = JwtTestUtils::bearer(&TestUser::patient(PATIENT), &config);
    let body = json!({ "appointment_id": id, "rating": 4 });

    let first = app
        .clone()
        .oneshot(json_request("POST", "/doc@example.com/ratings", Some(bearer.clone()), body.clone()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(read_json(first).await, json!({ "new_rating": 4.0, "review_count": 1 }));

    let second = app
        .oneshot(json_request("POST", "/doc@example.com/ratings", Some(bearer), body))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(second).await["code"], "already_rated");
}

#[tokio::test]
async fn out_of_range_rating_is_a_validation_error() {
    let (app, _, config) = app().await;
    let bearer = JwtTestUtils::bearer(&TestUser::patient(PATIENT), &config);

    let response = app
        .oneshot(json_request("POST", "/doc@example.com/ratings", Some(bearer), json!({ "rating": 9 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "validation_error");
}

#[tokio::test]
async fn fractional_rating_is_a_validation_error() {
    let (app, store, config) = app().await;
    let bearer = JwtTestUtils::bearer(&TestUser::patient(PATIENT), &config);

    let response = app
        .oneshot(json_request("POST", "/doc@example.com/ratings", Some(bearer), json!({ "rating": 4.5 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["code"], "validation_error");
    assert!(body["error"].is_string());

    let doctor = store.get_doctor(DOCTOR).await.unwrap().unwrap();
    assert_eq!(doctor.review_count, 0);
}

#[tokio::test]
async fn malformed_hours_are_a_validation_error() {
    let (app, _, config) = app().await;
    let bearer = JwtTestUtils::bearer(&TestUser::doctor(DOCTOR), &config);

    let response = app
        .oneshot(json_request(
            "PUT",
            "/me/working-hours",
            Some(bearer),
            json!({ "monday": { "start": "nine", "end": "17:00:00", "available": true } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "validation_error");
}

#[tokio::test]
async fn profile_and_hours_are_doctor_only() {
    let (app, _, config) = app().await;
    let profile = json!({
        "specialization": "Dermatology",
        "qualifications": "MD",
        "license_number": "LIC-42",
        "consultation_fee": 80.0
    });

    let as_patient = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/me",
            Some(JwtTestUtils::bearer(&TestUser::patient(PATIENT), &config)),
            profile.clone(),
        ))
        .await
        .unwrap();
    assert_eq!(as_patient.status(), StatusCode::FORBIDDEN);

    let doctor_bearer = JwtTestUtils::bearer(&TestUser::doctor("new.doc@example.com"), &config);
    let created = app
        .clone()
        .oneshot(json_request("PUT", "/me", Some(doctor_bearer.clone()), profile))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::OK);
    let body = read_json(created).await;
    assert_eq!(body["specialization"], "Dermatology");
    assert_eq!(body["review_count"], 0);

    let inverted = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/me/working-hours",
            Some(doctor_bearer.clone()),
            json!({ "monday": { "start": "17:00:00", "end": "09:00:00", "available": true } }),
        ))
        .await
        .unwrap();
    assert_eq!(inverted.status(), StatusCode::BAD_REQUEST);

    let updated = app
        .oneshot(json_request(
            "PUT",
            "/me/working-hours",
            Some(doctor_bearer),
            json!({ "monday": { "start": "09:00:00", "end": "12:00:00", "available": true } }),
        ))
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    assert_eq!(read_json(updated).await["working_hours"]["monday"]["end"], "12:00:00");
}
