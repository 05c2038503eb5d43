// libs/doctor-cell/tests/rating_test.rs

use std::sync::Arc;

use assert_matches::assert_matches;

use doctor_cell::models::DoctorError;
use doctor_cell::services::RatingAggregator;
use shared_database::{InMemoryStore, SchedulingStore};
use shared_models::scheduling::{AppointmentStatus, RatingTotals};
use shared_utils::test_utils::{appointment, future_monday, time, weekday_doctor};

const DOCTOR: &str = "doc@example.com";
const PATIENT: &str = "pat@example.com";

async fn setup() -> (Arc<InMemoryStore>, RatingAggregator) {
    let store = Arc::new(InMemoryStore::new());
    store.seed_doctor(weekday_doctor(DOCTOR)).await;
    let aggregator = RatingAggregator::new(store.clone());
    (store, aggregator)
}

async fn seed_visit(store: &InMemoryStore, status: AppointmentStatus) -> uuid::Uuid {
    let visit = appointment(PATIENT, DOCTOR, future_monday(), time(9, 0), time(9, 30), status);
    let id = visit.id;
    store.seed_appointment(visit).await;
    id
}

#[tokio::test]
async fn folds_rating_into_existing_mean() {
    let store = Arc::new(InMemoryStore::new());
    let totals = RatingTotals::from_mean(4.0, 3);
    let mut doctor = weekday_doctor(DOCTOR);
    doctor.rating = Some(4.0);
    doctor.review_count = totals.count;
    doctor.rating_sum = totals.sum;
    store.seed_doctor(doctor).await;

    let result = RatingAggregator::new(store.clone())
        .rate(PATIENT, DOCTOR, None, 5)
        .await
        .unwrap();

    assert_eq!(result.new_rating, 4.25);
    assert_eq!(result.review_count, 4);

    let stored = store.get_doctor(DOCTOR).await.unwrap().unwrap();
    assert_eq!(stored.rating, Some(4.25));
    assert_eq!(stored.rating_sum, 17);
}

#[tokio::test]
async fn same_appointment_is_counted_once() {
    let (store, aggregator) = setup().await;
    let id = seed_visit(&store, AppointmentStatus::Completed).await;

    let first = aggregator.rate(PATIENT, DOCTOR, Some(id), 4).await.unwrap();
    assert_eq!(first.review_count, 1);

    let second = aggregator.rate(PATIENT, DOCTOR, Some(id), 5).await;
    assert_matches!(second, Err(DoctorError::AlreadyRated));

    let doctor = store.get_doctor(DOCTOR).await.unwrap().unwrap();
    assert_eq!(doctor.review_count, 1);
    assert_eq!(doctor.rating, Some(4.0));
    assert!(store.get_appointment(id).await.unwrap().unwrap().has_rated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_ratings_fold_once() {
    let (store, _) = setup().await;
    let id = seed_visit(&store, AppointmentStatus::Completed).await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let aggregator = RatingAggregator::new(store.clone());
            tokio::spawn(async move { aggregator.rate(PATIENT, DOCTOR, Some(id), 5).await })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => assert_matches!(e, DoctorError::AlreadyRated),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(store.get_doctor(DOCTOR).await.unwrap().unwrap().review_count, 1);
}

#[tokio::test]
async fn rejects_out_of_range_without_side_effects() {
    let (store, aggregator) = setup().await;

    for rating in [0, 6, -3] {
        let result = aggregator.rate(PATIENT, DOCTOR, None, rating).await;
        assert_matches!(result, Err(DoctorError::InvalidRating(r)) if r == rating);
    }

    let doctor = store.get_doctor(DOCTOR).await.unwrap().unwrap();
    assert_eq!(doctor.review_count, 0);
    assert_eq!(doctor.rating, None);
}

#[tokio::test]
async fn unknown_doctor_is_not_found() {
    let (_, aggregator) = setup().await;

    let result = aggregator.rate(PATIENT, "nobody@example.com", None, 3).await;
    assert_matches!(result, Err(DoctorError::NotFound(_)));
}

#[tokio::test]
async fn only_completed_appointments_of_the_caller_are_rateable() {
    let (store, aggregator) = setup().await;

    let confirmed = seed_visit(&store, AppointmentStatus::Confirmed).await;
    assert_matches!(
        aggregator.rate(PATIENT, DOCTOR, Some(confirmed), 5).await,
        Err(DoctorError::ValidationError(_))
    );

    let completed = seed_visit(&store, AppointmentStatus::Completed).await;
    assert_matches!(
        aggregator.rate("someone-else@example.com", DOCTOR, Some(completed), 5).await,
        Err(DoctorError::Forbidden(_))
    );

    assert_matches!(
        aggregator.rate(PATIENT, DOCTOR, Some(uuid::Uuid::new_v4()), 5).await,
        Err(DoctorError::AppointmentNotFound(_))
    );

    assert_eq!(store.get_doctor(DOCTOR).await.unwrap().unwrap().review_count, 0);
}

#[tokio::test]
async fn emails_are_normalized() {
    let (store, aggregator) = setup().await;
    let id = seed_visit(&store, AppointmentStatus::Completed).await;

    let result = aggregator
        .rate("  PAT@Example.com ", "Doc@Example.COM", Some(id), 3)
        .await
        .unwrap();
    assert_eq!(result.review_count, 1);
}

#[tokio::test]
async fn doctors_cannot_rate_themselves() {
    let (_, aggregator) = setup().await;

    assert_matches!(
        aggregator.rate(DOCTOR, DOCTOR, None, 5).await,
        Err(DoctorError::Forbidden(_))
    );
}
