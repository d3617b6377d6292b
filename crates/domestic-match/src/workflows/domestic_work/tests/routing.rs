use super::common::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;

use crate::workflows::domestic_work::sessions::WizardSessions;
use crate::workflows::domestic_work::wizard::WizardError;
use crate::workflows::domestic_work::wizard_router;

fn sessions(gateway: Arc<ScriptedGateway>) -> Arc<WizardSessions> {
    Arc::new(WizardSessions::new(gateway, 10))
}

async fn open_session(sessions: &Arc<WizardSessions>) -> String {
    let (status, body) = send(
        wizard_router(sessions.clone()),
        empty_request("POST", "/api/v1/wizard/sessions"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["step"], "identity");
    body["session_id"].as_str().expect("session id").to_string()
}

async fn put_field(
    sessions: &Arc<WizardSessions>,
    id: &str,
    path: &str,
    value: Value,
) -> (StatusCode, Value) {
    send(
        wizard_router(sessions.clone()),
        json_request(
            "PUT",
            &format!("/api/v1/wizard/sessions/{id}/fields"),
            json!({ "path": path, "value": value }),
        ),
    )
    .await
}

async fn post(sessions: &Arc<WizardSessions>, uri: String) -> (StatusCode, Value) {
    send(wizard_router(sessions.clone()), empty_request("POST", &uri)).await
}

/// Fill all three steps, advancing past the first two only.
async fn fill_to_preferences(sessions: &Arc<WizardSessions>, id: &str) {
    let steps = [
        vec![
            ("full_name", json!("Aline Uwase")),
            ("phone_number", json!("+250788000111")),
            ("national_id", json!("1199080012345678")),
        ],
        vec![
            ("location.province", json!("Kigali")),
            ("location.district", json!("Gasabo")),
            ("location.sector", json!("Kimironko")),
            ("location.cell", json!("Bibare")),
            ("location.village", json!("Imena")),
        ],
        vec![
            ("salary_range", json!("50000-80000")),
            ("tasks", json!(["cooking", "childcare"])),
            ("vacation_days", json!(14)),
        ],
    ];

    for (index, fields) in steps.into_iter().enumerate() {
        for (path, value) in fields {
            let (status, _) = put_field(sessions, id, path, value).await;
            assert_eq!(status, StatusCode::OK, "{path}");
        }
        if index < 2 {
            let (status, _) = post(sessions, format!("/api/v1/wizard/sessions/{id}/advance")).await;
            assert_eq!(status, StatusCode::OK);
        }
    }
}

async fn complete_registration(sessions: &Arc<WizardSessions>, id: &str) -> (StatusCode, Value) {
    fill_to_preferences(sessions, id).await;
    post(sessions, format!("/api/v1/wizard/sessions/{id}/advance")).await
}

#[tokio::test]
async fn advance_with_missing_fields_is_unprocessable() {
    let sessions = sessions(Arc::new(ScriptedGateway::default()));
    let id = open_session(&sessions).await;
    let (status, _) = put_field(&sessions, &id, "identity.full_name", json!("Aline")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&sessions, format!("/api/v1/wizard/sessions/{id}/advance")).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["step"], "identity");
    assert_eq!(
        body["missing_fields"],
        json!(["identity.phone_number", "identity.national_id"])
    );
}

#[tokio::test]
async fn unknown_field_and_session_are_rejected() {
    let sessions = sessions(Arc::new(ScriptedGateway::default()));
    let id = open_session(&sessions).await;

    let (status, body) = put_field(&sessions, &id, "identity.shoe_size", json!("42")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "unknown field 'identity.shoe_size'");

    let (status, _) = send(
        wizard_router(sessions.clone()),
        empty_request("GET", "/api/v1/wizard/sessions/not-a-session"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_flow_registers_selects_and_confirms() {
    let gateway = Arc::new(ScriptedGateway::with_directory(directory()));
    let sessions = sessions(gateway.clone());
    let id = open_session(&sessions).await;

    let (status, view) = complete_registration(&sessions, &id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["step"], "selection");
    assert_eq!(view["registration_id"], "emp-1");
    assert_eq!(view["directory_size"], 5);
    assert_eq!(gateway.directory_calls.load(Ordering::SeqCst), 1);

    let (status, listing) = send(
        wizard_router(sessions.clone()),
        empty_request(
            "GET",
            &format!("/api/v1/wizard/sessions/{id}/candidates?gender=male"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<&str> = listing["candidates"]
        .as_array()
        .expect("candidates")
        .iter()
        .map(|record| record["id"].as_str().expect("id"))
        .collect();
    assert_eq!(listed, vec!["hk-3", "hk-5"]);

    for candidate in ["hk-1", "hk-2", "hk-5"] {
        let (status, _) = post(
            &sessions,
            format!("/api/v1/wizard/sessions/{id}/candidates/{candidate}/toggle"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, toggled) = post(
        &sessions,
        format!("/api/v1/wizard/sessions/{id}/candidates/hk-4/toggle"),
    )
    .await;
    assert_eq!(toggled["outcome"], "capacity_exceeded");
    assert_eq!(toggled["selection"], json!(["hk-2", "hk-5"]));

    let (status, receipt) = post(
        &sessions,
        format!("/api/v1/wizard/sessions/{id}/selection/confirm"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["candidate_ids"], json!(["hk-2", "hk-5"]));

    let (status, _) = post(
        &sessions,
        format!("/api/v1/wizard/sessions/{id}/selection/confirm"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn gateway_failure_maps_to_bad_gateway() {
    let gateway = Arc::new(ScriptedGateway::with_directory(directory()));
    gateway.fail_registration.store(true, Ordering::SeqCst);
    let sessions = sessions(gateway);
    let id = open_session(&sessions).await;

    let (status, body) = complete_registration(&sessions, &id).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"]
        .as_str()
        .expect("message")
        .contains("phone number already registered"));
}

#[tokio::test]
async fn directory_refresh_recovers_after_outage() {
    let gateway = Arc::new(ScriptedGateway::with_directory(directory()));
    gateway.fail_directory.store(true, Ordering::SeqCst);
    let sessions = sessions(gateway.clone());
    let id = open_session(&sessions).await;

    let (status, _) = complete_registration(&sessions, &id).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    assert_eq!(gateway.directory_calls.load(Ordering::SeqCst), 1);

    gateway.fail_directory.store(false, Ordering::SeqCst);
    let (status, view) = post(
        &sessions,
        format!("/api/v1/wizard/sessions/{id}/directory/refresh"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["step"], "selection");
    assert_eq!(view["directory_size"], 5);
    assert_eq!(gateway.directory_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn refresh_before_registration_never_reaches_the_backend() {
    let gateway = Arc::new(ScriptedGateway::with_directory(directory()));
    let sessions = sessions(gateway.clone());
    let id = open_session(&sessions).await;

    let (status, _) = post(
        &sessions,
        format!("/api/v1/wizard/sessions/{id}/directory/refresh"),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(gateway.directory_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn second_advance_during_registration_conflicts() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(ScriptedGateway {
        directory: directory(),
        hold_registration: Some(Arc::clone(&gate)),
        ..ScriptedGateway::default()
    });
    let sessions = sessions(gateway.clone());
    let id = open_session(&sessions).await;
    fill_to_preferences(&sessions, &id).await;

    let advance_uri = format!("/api/v1/wizard/sessions/{id}/advance");
    let first = tokio::spawn(
        wizard_router(sessions.clone()).oneshot(empty_request("POST", &advance_uri)),
    );

    let view_uri = format!("/api/v1/wizard/sessions/{id}");
    let mut in_flight = false;
    for _ in 0..1_000 {
        let (_, view) = send(
            wizard_router(sessions.clone()),
            empty_request("GET", &view_uri),
        )
        .await;
        if view["in_flight"] == json!(true) {
            in_flight = true;
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(in_flight, "registration never started");

    let (status, body) = post(&sessions, advance_uri.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    gate.notify_one();
    let response = first.await.expect("join").expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["step"], "selection");
    assert_eq!(gateway.registration_count(), 1);
}

#[tokio::test]
async fn candidate_query_does_not_change_stored_criteria() {
    let sessions = sessions(Arc::new(ScriptedGateway::with_directory(directory())));
    let id = open_session(&sessions).await;
    let (status, _) = complete_registration(&sessions, &id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, listing) = send(
        wizard_router(sessions.clone()),
        empty_request(
            "GET",
            &format!("/api/v1/wizard/sessions/{id}/candidates?gender=female&age_band=22-25"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["criteria"], json!({ "gender": "female", "age_band": "22-25" }));

    let (status, listing) = send(
        wizard_router(sessions.clone()),
        empty_request(
            "GET",
            &format!("/api/v1/wizard/sessions/{id}/candidates?gender=&age_band="),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["candidates"].as_array().expect("candidates").len(), 5);

    let (_, view) = send(
        wizard_router(sessions.clone()),
        empty_request("GET", &format!("/api/v1/wizard/sessions/{id}")),
    )
    .await;
    assert_eq!(view["criteria"], json!({ "gender": "all", "age_band": "all" }));
}

#[tokio::test]
async fn idle_sessions_expire() {
    let sessions = Arc::new(
        WizardSessions::new(Arc::new(ScriptedGateway::default()), 10)
            .with_idle_ttl(Duration::from_millis(200)),
    );
    let stale = open_session(&sessions).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let (status, _) = send(
        wizard_router(sessions.clone()),
        empty_request("GET", &format!("/api/v1/wizard/sessions/{stale}")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(sessions.is_empty());

    for _ in 0..3 {
        open_session(&sessions).await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions.evict_idle(), 3);
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn attachments_are_checked_before_they_reach_the_draft() {
    let sessions = sessions(Arc::new(ScriptedGateway::default()));
    let id = open_session(&sessions).await;
    let uri = format!("/api/v1/wizard/sessions/{id}/attachments/passport");

    let pdf = Request::builder()
        .method("POST")
        .uri(&uri)
        .header("content-type", "application/pdf")
        .body(Body::from(vec![1u8, 2, 3]))
        .expect("request");
    let (status, _) = send(wizard_router(sessions.clone()), pdf).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let jpeg = Request::builder()
        .method("POST")
        .uri(&uri)
        .header("content-type", "image/jpeg")
        .header("x-file-name", "passport.jpg")
        .body(Body::from(vec![0xffu8, 0xd8, 0xff]))
        .expect("request");
    let (status, view) = send(wizard_router(sessions.clone()), jpeg).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["attachments"], json!(["passport"]));

    let (status, view) = send(
        wizard_router(sessions.clone()),
        empty_request("DELETE", &uri),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["attachments"], json!([]));
}

#[tokio::test]
async fn discarded_session_is_gone() {
    let sessions = sessions(Arc::new(ScriptedGateway::default()));
    let id = open_session(&sessions).await;
    assert_eq!(sessions.len(), 1);

    let (status, _) = send(
        wizard_router(sessions.clone()),
        empty_request("DELETE", &format!("/api/v1/wizard/sessions/{id}")),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(sessions.is_empty());

    let (status, _) = post(&sessions, format!("/api/v1/wizard/sessions/{id}/advance")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn error_statuses_follow_the_failure_kind() {
    use crate::workflows::domestic_work::router::wizard_error_response;

    assert_eq!(
        wizard_error_response(WizardError::SubmissionInFlight).status(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        wizard_error_response(WizardError::UnknownCandidate(
            crate::workflows::domestic_work::CandidateId("x".to_string())
        ))
        .status(),
        StatusCode::NOT_FOUND
    );
}
