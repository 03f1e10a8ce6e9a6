use std::time::Duration;

use assert_matches::assert_matches;
use tokio_test::assert_ok;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::*;
use queue_sync_cell::{ChannelId, CounterState};
use shared_api::{ApiError, BackendClient};
use shared_config::AppConfig;

fn action_for(server: &MockServer, pending: Duration) -> CompletionAction {
    let config = AppConfig {
        backend_base_url: server.uri(),
        ..AppConfig::default()
    };
    CompletionAction::new(BackendClient::new(&config), pending)
}

#[tokio::test]
async fn test_complete_posts_schedule_and_doctor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/doctor/complete/2/7"))
        .and(header("authorization", "Bearer doc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Completed"))
        .expect(1)
        .mount(&server)
        .await;

    let mut action = action_for(&server, Duration::from_secs(5));
    action
        .complete(ChannelId(7), 2, Some(CounterState::Serving(3)), "doc")
        .await
        .unwrap();

    assert!(action.is_pending());
    assert!(!action.is_available(Some(CounterState::Serving(3))));
}

#[tokio::test]
async fn test_not_started_queue_cannot_complete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut action = action_for(&server, Duration::from_secs(5));
    assert!(!action.is_available(Some(CounterState::NotStarted)));
    assert!(!action.is_available(None));

    let result = action.complete(ChannelId(7), 2, Some(CounterState::NotStarted), "doc").await;
    assert_matches!(result, Err(DoctorQueueError::Unavailable));
    assert!(!action.is_pending());
}

#[tokio::test]
async fn test_second_completion_waits_for_acknowledgement() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/doctor/complete/2/7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let mut action = action_for(&server, Duration::from_secs(5));
    let serving = Some(CounterState::Serving(3));

    assert_ok!(action.complete(ChannelId(7), 2, serving, "doc").await);
    assert_matches!(
        action.complete(ChannelId(7), 2, serving, "doc").await,
        Err(DoctorQueueError::InFlight)
    );

    action.acknowledge();
    assert!(action.is_available(Some(CounterState::Serving(4))));
    assert_ok!(action.complete(ChannelId(7), 2, Some(CounterState::Serving(4)), "doc").await);
}

#[tokio::test]
async fn test_pending_marker_expires() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut action = action_for(&server, Duration::from_millis(50));
    action.complete(ChannelId(7), 2, Some(CounterState::Serving(1)), "doc").await.unwrap();
    assert!(action.is_pending());

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(!action.is_pending());
    assert!(action.is_available(Some(CounterState::Serving(1))));
}

#[tokio::test]
async fn test_rejected_completion_clears_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/doctor/complete/9/7"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Schedule does not belong to doctor"))
        .mount(&server)
        .await;

    let mut action = action_for(&server, Duration::from_secs(5));
    let result = action.complete(ChannelId(7), 9, Some(CounterState::Serving(2)), "doc").await;

    assert_matches!(result, Err(DoctorQueueError::Api(ApiError::Forbidden(_))));
    assert!(!action.is_pending());
}
