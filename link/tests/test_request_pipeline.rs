//! Bearer attachment, refresh-on-401 and retry behaviour of the API client.

mod common;

use common::{new_client, spawn_backend, PASSWORD};
use serde::Deserialize;
use std::time::Duration;
use tryout_link::{ErrorKind, RequestConfig, TokenPair, TryoutLinkError};

#[derive(Debug, Deserialize)]
struct Exam {
    id: i64,
    title: String,
}

fn count(bearers: &[Option<String>], token: &str) -> usize {
    bearers.iter().filter(|b| b.as_deref() == Some(token)).count()
}

#[tokio::test]
async fn test_requests_carry_current_access_token() {
    let (url, backend) = spawn_backend().await;
    let (client, _events) = new_client(&url);

    client.login("a@x.com", PASSWORD, false).await.unwrap();
    let exams: Vec<Exam> = client.get("/exams").await.unwrap();

    assert_eq!(exams.len(), 2);
    assert_eq!(exams[0].id, 1);
    assert_eq!(exams[0].title, "Try-out Matematika");
    assert_eq!(backend.bearers_for("/exams"), vec![Some("A1".to_string())]);
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_and_retried_once() {
    let (url, backend) = spawn_backend().await;
    let (client, events) = new_client(&url);
    client.login("a@x.com", PASSWORD, true).await.unwrap();

    backend.expire_access_tokens();
    let exams: Vec<Exam> = client.get("/exams").await.unwrap();

    assert_eq!(exams.len(), 2);
    assert_eq!(backend.refresh_count(), 1);
    assert_eq!(
        backend.bearers_for("/exams"),
        vec![Some("A1".to_string()), Some("A2".to_string())]
    );

    let session = client.session().snapshot();
    assert_eq!(session.tokens(), Some(TokenPair::new("A2", "R2")));
    assert_eq!(session.user().map(|u| u.email.as_str()), Some("a@x.com"));
    assert!(session.remember_me());
    assert_eq!(events.expired_count(), 0);
    assert!(!client.refresher().is_refreshing());
}

#[tokio::test]
async fn test_second_unauthorized_is_returned_without_another_refresh() {
    let (url, backend) = spawn_backend().await;
    let (client, events) = new_client(&url);
    client.login("a@x.com", PASSWORD, false).await.unwrap();

    let err = client.get::<serde_json::Value>("/admin/reports").await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(backend.refresh_count(), 1);
    assert_eq!(
        backend.bearers_for("/admin/reports"),
        vec![Some("A1".to_string()), Some("A2".to_string())]
    );
    // The refresh itself succeeded, so the session is kept.
    assert!(client.session().is_authenticated());
    assert_eq!(events.expired_count(), 0);
}

#[tokio::test]
async fn test_concurrent_unauthorized_requests_share_one_refresh() {
    let (url, backend) = spawn_backend().await;
    let (client, _events) = new_client(&url);
    client.login("a@x.com", PASSWORD, false).await.unwrap();

    backend.expire_access_tokens();
    backend.set_refresh_delay(Duration::from_millis(100));

    let (a, b, c) = tokio::join!(
        client.get::<Vec<Exam>>("/exams"),
        client.get::<Vec<Exam>>("/exams"),
        client.get::<Vec<Exam>>("/exams"),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    assert_eq!(backend.refresh_count(), 1);
    let bearers = backend.bearers_for("/exams");
    assert_eq!(count(&bearers, "A1"), 3);
    assert_eq!(count(&bearers, "A2"), 3);
    assert_eq!(client.session().access_token().as_deref(), Some("A2"));
}

#[tokio::test]
async fn test_failed_refresh_clears_session_and_notifies() {
    let (url, backend) = spawn_backend().await;
    let (client, events) = new_client(&url);
    client.login("a@x.com", PASSWORD, true).await.unwrap();

    backend.expire_access_tokens();
    backend.set_refresh_fails(true);
    let err = client.get::<Vec<Exam>>("/exams").await.unwrap_err();

    // The caller sees the original 401, not the refresh failure.
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let session = client.session().snapshot();
    assert_eq!(session.access_token(), None);
    assert_eq!(session.refresh_token(), None);
    assert!(session.user().is_none());
    assert!(!client.session().is_authenticated());

    assert_eq!(events.expired_count(), 1);
    assert_eq!(
        events.expired.lock()[0].message,
        "Your session has expired. Please log in again."
    );
    assert_eq!(events.redirects(), vec!["/login".to_string()]);
    assert_eq!(events.auth_changes.lock().last(), Some(&false));

    client.get::<serde_json::Value>("/public").await.unwrap();
    assert_eq!(backend.bearers_for("/public"), vec![None]);
}

#[tokio::test]
async fn test_unauthorized_without_refresh_token_makes_no_refresh_call() {
    let (url, backend) = spawn_backend().await;
    let (client, events) = new_client(&url);

    let err = client.get::<Vec<Exam>>("/exams").await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(backend.refresh_count(), 0);
    assert_eq!(backend.bearers_for("/exams"), vec![None]);
    assert_eq!(events.redirects(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn test_skip_auth_sends_no_bearer() {
    let (url, backend) = spawn_backend().await;
    let (client, _events) = new_client(&url);
    client.login("a@x.com", PASSWORD, false).await.unwrap();

    client
        .get_with::<serde_json::Value>("/public", RequestConfig::new().skip_auth())
        .await
        .unwrap();
    client.get::<serde_json::Value>("/public").await.unwrap();

    assert_eq!(backend.bearers_for("/public"), vec![None, Some("A1".to_string())]);
}

#[tokio::test]
async fn test_other_errors_pass_through_without_refresh() {
    let (url, backend) = spawn_backend().await;
    let (client, _events) = new_client(&url);
    client.login("a@x.com", PASSWORD, false).await.unwrap();

    let err = client.get::<Exam>("/exams/999").await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!err.is_retriable());
    assert_eq!(backend.refresh_count(), 0);
    assert_eq!(backend.bearers_for("/exams/999").len(), 1);
}

#[tokio::test]
async fn test_unsuccessful_envelope_is_an_error() {
    let (url, backend) = spawn_backend().await;
    let (client, _events) = new_client(&url);

    let err = client.get::<serde_json::Value>("/exams/closed").await.unwrap_err();

    match err {
        TryoutLinkError::Api(api) => {
            assert_eq!(api.status_code, 200);
            assert_eq!(api.message, "Exam is closed");
            assert_eq!(api.error_code.as_deref(), Some("EXAM_CLOSED"));
        },
        other => panic!("expected Api error, got {:?}", other),
    }
    assert_eq!(backend.refresh_count(), 0);
}

#[tokio::test]
async fn test_wrong_payload_type_is_serialization_error() {
    let (url, _backend) = spawn_backend().await;
    let (client, _events) = new_client(&url);

    let err = client.get::<Vec<Exam>>("/public").await.unwrap_err();
    assert!(matches!(err, TryoutLinkError::SerializationError(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_transient() {
    let (client, _events) = new_client("http://127.0.0.1:9");

    let err = client.get::<serde_json::Value>("/exams").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert!(err.is_retriable());
}

#[tokio::test]
async fn test_refresh_completes_after_caller_gives_up() {
    let (url, backend) = spawn_backend().await;
    let (client, events) = new_client(&url);
    client.login("a@x.com", PASSWORD, false).await.unwrap();
    backend.expire_access_tokens();
    backend.set_refresh_delay(Duration::from_millis(200));

    let gave_up =
        tokio::time::timeout(Duration::from_millis(50), client.get::<Vec<Exam>>("/exams")).await;
    assert!(gave_up.is_err());
    assert!(client.refresher().is_refreshing());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(backend.refresh_count(), 1);
    assert!(!client.refresher().is_refreshing());
    assert!(!backend.is_refresh_valid("R1"));
    assert_eq!(client.session().snapshot().tokens(), Some(TokenPair::new("A2", "R2")));

    let exams: Vec<Exam> = client.get("/exams").await.unwrap();
    assert_eq!(exams.len(), 2);
    assert_eq!(backend.refresh_count(), 1);
    assert_eq!(events.expired_count(), 0);
    assert!(client.session().is_authenticated());
}

#[tokio::test]
async fn test_late_unauthorized_reuses_already_rotated_token() {
    let (url, backend) = spawn_backend().await;
    let (client, _events) = new_client(&url);
    client.login("a@x.com", PASSWORD, false).await.unwrap();
    backend.expire_access_tokens();

    let slow = {
        let client = client.clone();
        tokio::spawn(async move { client.get::<Vec<Exam>>("/exams/slow").await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    // Refreshes and clears the slot before the slow request sees its 401.
    client.get::<Vec<Exam>>("/exams").await.unwrap();
    assert!(!client.refresher().is_refreshing());

    let late = slow.await.unwrap().unwrap();
    assert_eq!(late[0].title, "Try-out Kimia");
    assert_eq!(backend.refresh_count(), 1);
    assert_eq!(
        backend.bearers_for("/exams/slow"),
        vec![Some("A1".to_string()), Some("A2".to_string())]
    );
}

#[tokio::test]
async fn test_login_during_refresh_wins_over_rotated_pair() {
    let (url, backend) = spawn_backend().await;
    let (client, events) = new_client(&url);
    client.login("a@x.com", PASSWORD, false).await.unwrap();
    backend.expire_access_tokens();
    backend.set_refresh_delay(Duration::from_millis(150));

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.get::<Vec<Exam>>("/exams").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.login("a@x.com", PASSWORD, false).await.unwrap();

    let exams = pending.await.unwrap().unwrap();
    assert_eq!(exams.len(), 2);
    assert_eq!(backend.refresh_count(), 1);
    // The pair from the refresh (A3/R3) is discarded.
    assert_eq!(client.session().snapshot().tokens(), Some(TokenPair::new("A2", "R2")));
    assert_eq!(
        backend.bearers_for("/exams"),
        vec![Some("A1".to_string()), Some("A2".to_string())]
    );
    assert_eq!(events.expired_count(), 0);
}

#[tokio::test]
async fn test_logout_during_refresh_raises_no_expiry() {
    let (url, backend) = spawn_backend().await;
    let (client, events) = new_client(&url);
    client.login("a@x.com", PASSWORD, false).await.unwrap();
    backend.expire_access_tokens();
    backend.set_refresh_delay(Duration::from_millis(150));

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.get::<Vec<Exam>>("/exams").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.logout().await.unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!client.session().is_authenticated());
    assert_eq!(events.expired_count(), 0);
    assert!(events.redirects().is_empty());
}

#[tokio::test]
async fn test_request_in_flight_during_logout_raises_no_expiry() {
    let (url, backend) = spawn_backend().await;
    let (client, events) = new_client(&url);
    client.login("a@x.com", PASSWORD, false).await.unwrap();

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.get::<Vec<Exam>>("/exams/slow").await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    client.logout().await.unwrap();
    backend.expire_access_tokens();

    let err = pending.await.unwrap().unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(backend.refresh_count(), 0);
    assert_eq!(events.expired_count(), 0);
    assert!(events.redirects().is_empty());
}
