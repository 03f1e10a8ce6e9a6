use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use tempfile::tempdir;
use tokio::time::timeout;

use auth_cell::{FileTokenStore, IdentityProvider, MemoryTokenStore};
use doctor_cell::{DoctorQueueSnapshot, DoctorQueueView};
use end_to_end_tests::{FakeClinic, DOCTOR_ID, SCHEDULE_ID};
use patient_cell::{PatientQueueSnapshot, PatientQueueView};
use queue_sync_cell::{ChannelId, ConnectionState, CounterState, QueueStatus, ViewChange};
use shared_models::AppError;
use shared_utils::test_utils::{JwtTestUtils, TestUser, TEST_JWT_SECRET};

const CHANNEL: ChannelId = ChannelId(DOCTOR_ID);

fn token_for(user: &TestUser) -> String {
    JwtTestUtils::create_test_token(user, TEST_JWT_SECRET, Some(24))
}

fn signed_in(user: TestUser) -> Arc<IdentityProvider> {
    Arc::new(IdentityProvider::new(Arc::new(MemoryTokenStore::with_token(&token_for(&user)))))
}

async fn patient_until<F>(view: &mut PatientQueueView, predicate: F) -> PatientQueueSnapshot
where
    F: Fn(&PatientQueueSnapshot) -> bool,
{
    loop {
        match timeout(Duration::from_secs(3), view.next_change()).await.expect("patient view stalled") {
            Some(ViewChange::Updated(snapshot)) if predicate(&snapshot) => return snapshot,
            Some(ViewChange::Updated(_)) => continue,
            other => panic!("unexpected patient change: {:?}", other),
        }
    }
}

async fn doctor_until<F>(view: &mut DoctorQueueView, predicate: F) -> DoctorQueueSnapshot
where
    F: Fn(&DoctorQueueSnapshot) -> bool,
{
    loop {
        match timeout(Duration::from_secs(3), view.next_change()).await.expect("doctor view stalled") {
            Some(ViewChange::Updated(snapshot)) if predicate(&snapshot) => return snapshot,
            Some(ViewChange::Updated(_)) => continue,
            other => panic!("unexpected doctor change: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_doctor_completions_move_the_patient_through_the_queue() {
    let clinic = FakeClinic::start(3, 6).await;
    let ctx = clinic.context();

    let mut doctor = DoctorQueueView::mount(&ctx, signed_in(TestUser::doctor("doc@example.com", DOCTOR_ID)), DOCTOR_ID)
        .await
        .unwrap();
    let snapshot = doctor.select_schedule(SCHEDULE_ID).await.unwrap();
    assert_eq!(snapshot.counter, Some(CounterState::Serving(3)));
    assert_eq!(snapshot.waiting.len(), 4);

    let mut patient = PatientQueueView::mount(
        &ctx,
        signed_in(TestUser::patient("pat@example.com")),
        FakeClinic::appointment_for(5),
    )
    .await
    .unwrap();
    assert_eq!(patient.snapshot().status, QueueStatus::Waiting { ahead: 2 });

    doctor_until(&mut doctor, |s| s.connection == ConnectionState::Connected).await;
    patient_until(&mut patient, |s| s.connection == ConnectionState::Connected).await;
    assert_eq!(clinic.broker.active_sessions(CHANNEL), 2);

    doctor.complete().await.unwrap();
    let seen = patient_until(&mut patient, |s| s.counter == Some(CounterState::Serving(4))).await;
    assert_eq!(seen.status, QueueStatus::Waiting { ahead: 1 });
    let desk = doctor_until(&mut doctor, |s| s.counter == Some(CounterState::Serving(4))).await;
    assert_eq!(desk.current_patient.as_ref().map(|p| p.patient_name()), Some("Patient 4"));
    assert_eq!(desk.waiting.first().map(|p| p.queue_number), Some(4));
    assert!(desk.can_complete);

    doctor.complete().await.unwrap();
    let seen = patient_until(&mut patient, |s| s.counter == Some(CounterState::Serving(5))).await;
    assert_eq!(seen.status, QueueStatus::YourTurn);
    assert_eq!(seen.status_message, "It's your turn!");
    doctor_until(&mut doctor, |s| s.counter == Some(CounterState::Serving(5))).await;

    doctor.complete().await.unwrap();
    let seen = patient_until(&mut patient, |s| s.counter == Some(CounterState::Serving(6))).await;
    assert_eq!(seen.status, QueueStatus::Completed);
    doctor_until(&mut doctor, |s| s.counter == Some(CounterState::Serving(6))).await;

    doctor.complete().await.unwrap();
    let seen = patient_until(&mut patient, |s| s.counter == Some(CounterState::NotStarted)).await;
    assert_eq!(seen.status, QueueStatus::NotStarted);
    let desk = doctor_until(&mut doctor, |s| s.counter == Some(CounterState::NotStarted)).await;
    assert!(desk.waiting.is_empty());
    assert!(!desk.can_complete);
    assert_eq!(clinic.current(), -1);

    patient.unmount().await;
    doctor.unmount().await;
    assert_eq!(clinic.broker.active_sessions(CHANNEL), 0);
}

#[tokio::test]
async fn test_patient_rides_out_a_broker_outage() {
    let clinic = FakeClinic::start(2, 8).await;
    let ctx = clinic.context();

    let mut patient = PatientQueueView::mount(
        &ctx,
        signed_in(TestUser::patient("pat@example.com")),
        FakeClinic::appointment_for(6),
    )
    .await
    .unwrap();
    patient_until(&mut patient, |s| s.connection == ConnectionState::Connected).await;

    clinic.broker.fail_next_connects(2);
    clinic.broker.drop_connections(CHANNEL);

    let stale = patient_until(&mut patient, |s| s.connection == ConnectionState::Error).await;
    assert!(stale.stale);
    assert_eq!(stale.counter, Some(CounterState::Serving(2)));
    assert_eq!(stale.status, QueueStatus::Waiting { ahead: 4 });

    patient_until(&mut patient, |s| s.connection == ConnectionState::Connected).await;
    clinic.broker.publish(CHANNEL, 3);
    let live = patient_until(&mut patient, |s| s.counter == Some(CounterState::Serving(3))).await;
    assert!(!live.stale);
    assert_eq!(live.status, QueueStatus::Waiting { ahead: 3 });

    patient.unmount().await;
}

#[tokio::test]
async fn test_removing_the_token_file_signs_the_patient_out() {
    let clinic = FakeClinic::start(1, 3).await;
    let ctx = clinic.context();
    let dir = tempdir().unwrap();
    let token_path = dir.path().join("queue-token");

    let identity = Arc::new(IdentityProvider::new(Arc::new(FileTokenStore::new(&token_path))));
    identity.sign_in(&token_for(&TestUser::patient("pat@example.com"))).unwrap();
    let watcher = identity.spawn_store_watcher(clinic.config().token_poll_interval);

    let mut patient = PatientQueueView::mount(&ctx, Arc::clone(&identity), FakeClinic::appointment_for(2))
        .await
        .unwrap();
    patient_until(&mut patient, |s| s.connection == ConnectionState::Connected).await;

    std::fs::remove_file(&token_path).unwrap();

    let change = loop {
        match timeout(Duration::from_secs(3), patient.next_change()).await.unwrap() {
            Some(ViewChange::Updated(_)) => continue,
            other => break other,
        }
    };
    assert_eq!(change, Some(ViewChange::SignedOut { sign_in_route: "/login".to_string() }));
    assert_eq!(clinic.broker.active_sessions(CHANNEL), 0);

    watcher.abort();
}

#[tokio::test]
async fn test_missing_token_never_opens_a_channel() {
    let clinic = FakeClinic::start(1, 3).await;
    let dir = tempdir().unwrap();
    let identity = Arc::new(IdentityProvider::new(Arc::new(FileTokenStore::new(dir.path().join("absent")))));

    let result = PatientQueueView::mount(&clinic.context(), identity, FakeClinic::appointment_for(1)).await;

    assert_matches!(result.err(), Some(AppError::AuthRequired { sign_in_route }) if sign_in_route == "/login");
    assert_eq!(clinic.broker.connect_attempts(), 0);
}
