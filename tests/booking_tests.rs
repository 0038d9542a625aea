use sessionmart::{
    models::Role,
    repositories::{
        BookingRepository, SqliteBookingRepository, SqliteSessionRepository, SqliteUserRepository,
        UserRepository,
    },
    services::{BookingService, BookingServiceError, SessionService},
    test_utils::test_helpers,
};
use sqlx::SqlitePool;
use std::sync::Arc;

struct Fixture {
    service: Arc<BookingService>,
    bookings: Arc<SqliteBookingRepository>,
    users: Arc<SqliteUserRepository>,
    learner_id: i64,
    session_id: i64,
}

async fn fixture(pool: SqlitePool) -> Fixture {
    let creator_id =
        test_helpers::insert_test_user(&pool, "host", None, "password123", Some(Role::Creator))
            .await
            .unwrap();
    let learner_id =
        test_helpers::insert_test_user(&pool, "learner", None, "password123", Some(Role::User))
            .await
            .unwrap();
    let session_id = test_helpers::create_test_session(&pool, creator_id, "Watercolour")
        .await
        .unwrap();

    let users = Arc::new(SqliteUserRepository::new(pool.clone()));
    let sessions = Arc::new(SqliteSessionRepository::new(pool.clone()));
    let bookings = Arc::new(SqliteBookingRepository::new(pool));
    let session_service = Arc::new(SessionService::new(sessions.clone(), users.clone()));
    let service = Arc::new(BookingService::new(
        bookings.clone(),
        sessions,
        users.clone(),
        session_service,
    ));

    Fixture {
        service,
        bookings,
        users,
        learner_id,
        session_id,
    }
}

#[tokio::test]
async fn test_second_booking_is_rejected_and_count_stays_one() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let fx = fixture(pool).await;
    let learner = fx.users.find_by_id(fx.learner_id).await.unwrap().unwrap();

    let booking = fx.service.create(&learner, fx.session_id).await.unwrap();
    assert_eq!(booking.user.id, learner.id);
    assert_eq!(booking.session.id, fx.session_id);
    assert_eq!(booking.session.creator.username, "host");

    let second = fx.service.create(&learner, fx.session_id).await;
    assert!(matches!(second, Err(BookingServiceError::AlreadyEnrolled)));
    assert_eq!(
        fx.bookings
            .count_for(learner.id, fx.session_id)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_concurrent_bookings_produce_one_row() {
    let (pool, _file) = test_helpers::create_test_db_file().await.unwrap();
    let fx = fixture(pool).await;
    let learner = fx.users.find_by_id(fx.learner_id).await.unwrap().unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = fx.service.clone();
        let learner = learner.clone();
        let session_id = fx.session_id;
        handles.push(tokio::spawn(async move {
            service.create(&learner, session_id).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(BookingServiceError::AlreadyEnrolled) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(
        fx.bookings
            .count_for(learner.id, fx.session_id)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_booking_missing_session_is_not_found() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let fx = fixture(pool).await;
    let learner = fx.users.find_by_id(fx.learner_id).await.unwrap().unwrap();

    let result = fx.service.create(&learner, 9999).await;
    assert!(matches!(result, Err(BookingServiceError::SessionNotFound)));
}

#[tokio::test]
async fn test_listing_and_deleting_bookings() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let fx = fixture(pool.clone()).await;
    let learner = fx.users.find_by_id(fx.learner_id).await.unwrap().unwrap();

    let booking = fx.service.create(&learner, fx.session_id).await.unwrap();

    let mine = fx.service.list_for_user(&learner).await.unwrap();
    assert_eq!(mine.len(), 1);
    let attendees = fx.service.list_for_session(fx.session_id).await.unwrap();
    assert_eq!(attendees.len(), 1);
    assert_eq!(attendees[0].user.username, "learner");

    // Someone else cannot cancel it
    let intruder_id = test_helpers::insert_test_user(&pool, "intruder", None, "password123", None)
        .await
        .unwrap();
    let intruder = fx.users.find_by_id(intruder_id).await.unwrap().unwrap();
    let result = fx.service.delete(&intruder, booking.id).await;
    assert!(matches!(result, Err(BookingServiceError::NotOwner)));

    fx.service.delete(&learner, booking.id).await.unwrap();
    assert!(fx.service.list_for_user(&learner).await.unwrap().is_empty());

    // Booking again after cancelling is allowed
    fx.service.create(&learner, fx.session_id).await.unwrap();
}
