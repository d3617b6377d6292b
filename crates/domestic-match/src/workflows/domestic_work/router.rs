use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use super::directory::{self, AgeBand, FilterCriteria, GenderFilter};
use super::domain::{
    AttachmentError, AttachmentKind, CandidateId, ImageAttachment, WizardStep, MAX_IMAGE_BYTES,
};
use super::fields::{FieldPath, FieldValue};
use super::gateway::load_full_directory;
use super::sessions::{SharedWizard, WizardSessions};
use super::wizard::{Advance, WizardError};

/// Uploads above this are cut off by axum before the attachment check runs.
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES * 2;

const FILE_NAME_HEADER: &str = "x-file-name";

#[derive(Debug, Deserialize)]
pub(crate) struct FieldUpdate {
    path: String,
    value: FieldValue,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CandidateQuery {
    #[serde(default)]
    gender: Option<GenderFilter>,
    #[serde(default)]
    age_band: Option<AgeBand>,
}

/// Router exposing the registration wizard as JSON endpoints.
pub fn wizard_router(sessions: Arc<WizardSessions>) -> Router {
    Router::new()
        .route("/api/v1/wizard/sessions", post(create_handler))
        .route(
            "/api/v1/wizard/sessions/:session_id",
            get(view_handler).delete(discard_handler),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/fields",
            put(update_field_handler),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/attachments/:kind",
            post(attach_handler).delete(detach_handler),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/advance",
            post(advance_handler),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/retreat",
            post(retreat_handler),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/directory/refresh",
            post(refresh_handler),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/criteria",
            put(criteria_handler),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/candidates",
            get(candidates_handler),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/candidates/:candidate_id/toggle",
            post(toggle_handler),
        )
        .route(
            "/api/v1/wizard/sessions/:session_id/selection/confirm",
            post(confirm_handler),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(sessions)
}

pub(crate) async fn create_handler(State(sessions): State<Arc<WizardSessions>>) -> Response {
    let (session_id, wizard) = sessions.create();
    let step = wizard.lock().await.step();
    let payload = json!({
        "session_id": session_id,
        "step": step,
        "step_number": step.number(),
    });
    (StatusCode::CREATED, Json(payload)).into_response()
}

pub(crate) async fn view_handler(
    State(sessions): State<Arc<WizardSessions>>,
    Path(session_id): Path<String>,
) -> Response {
    let wizard = match lookup(&sessions, &session_id) {
        Ok(wizard) => wizard,
        Err(response) => return response,
    };
    let view = wizard.lock().await.view();
    (StatusCode::OK, Json(view)).into_response()
}

pub(crate) async fn discard_handler(
    State(sessions): State<Arc<WizardSessions>>,
    Path(session_id): Path<String>,
) -> Response {
    match Uuid::parse_str(&session_id) {
        Ok(id) if sessions.discard(&id) => StatusCode::NO_CONTENT.into_response(),
        _ => session_not_found(&session_id),
    }
}

pub(crate) async fn update_field_handler(
    State(sessions): State<Arc<WizardSessions>>,
    Path(session_id): Path<String>,
    Json(update): Json<FieldUpdate>,
) -> Response {
    let wizard = match lookup(&sessions, &session_id) {
        Ok(wizard) => wizard,
        Err(response) => return response,
    };
    let path = match update.path.parse::<FieldPath>() {
        Ok(path) => path,
        Err(err) => return wizard_error_response(err.into()),
    };

    let mut guard = wizard.lock().await;
    match guard.update_field(path, update.value) {
        Ok(()) => (StatusCode::OK, Json(guard.view())).into_response(),
        Err(err) => wizard_error_response(err),
    }
}

pub(crate) async fn attach_handler(
    State(sessions): State<Arc<WizardSessions>>,
    Path((session_id, kind)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let wizard = match lookup(&sessions, &session_id) {
        Ok(wizard) => wizard,
        Err(response) => return response,
    };
    let kind: AttachmentKind = match kind.parse() {
        Ok(kind) => kind,
        Err(message) => return error_response(StatusCode::NOT_FOUND, message),
    };

    let content_type = header_text(&headers, header::CONTENT_TYPE.as_str())
        .unwrap_or("application/octet-stream");
    let file_name = header_text(&headers, FILE_NAME_HEADER).unwrap_or(kind.form_field());
    let attachment = match ImageAttachment::new(file_name, content_type, body.to_vec()) {
        Ok(attachment) => attachment,
        Err(err) => return wizard_error_response(err.into()),
    };

    let mut guard = wizard.lock().await;
    match guard.attach_image(kind, attachment) {
        Ok(()) => (StatusCode::OK, Json(guard.view())).into_response(),
        Err(err) => wizard_error_response(err),
    }
}

pub(crate) async fn detach_handler(
    State(sessions): State<Arc<WizardSessions>>,
    Path((session_id, kind)): Path<(String, String)>,
) -> Response {
    let wizard = match lookup(&sessions, &session_id) {
        Ok(wizard) => wizard,
        Err(response) => return response,
    };
    let kind: AttachmentKind = match kind.parse() {
        Ok(kind) => kind,
        Err(message) => return error_response(StatusCode::NOT_FOUND, message),
    };

    let mut guard = wizard.lock().await;
    match guard.detach_image(kind) {
        Ok(_) => (StatusCode::OK, Json(guard.view())).into_response(),
        Err(err) => wizard_error_response(err),
    }
}

pub(crate) async fn advance_handler(
    State(sessions): State<Arc<WizardSessions>>,
    Path(session_id): Path<String>,
) -> Response {
    let wizard = match lookup(&sessions, &session_id) {
        Ok(wizard) => wizard,
        Err(response) => return response,
    };

    let advance = wizard.lock().await.begin_advance();
    match advance {
        Ok(Advance::Moved(_)) => (StatusCode::OK, Json(wizard.lock().await.view())).into_response(),
        Ok(Advance::Submit(pending)) => {
            // The submission runs detached so an abandoned request still
            // records its outcome and releases the in-flight flag.
            let task = tokio::spawn(async move {
                let gateway = wizard.lock().await.gateway();
                let outcome = gateway.submit_registration(pending.draft()).await;
                wizard.lock().await.finish_registration(pending, outcome)?;
                load_directory(&wizard).await?;
                let view = wizard.lock().await.view();
                Ok::<_, WizardError>(view)
            });
            match task.await {
                Ok(Ok(view)) => (StatusCode::OK, Json(view)).into_response(),
                Ok(Err(err)) => wizard_error_response(err),
                Err(join) => task_failed(join),
            }
        }
        Err(err) => wizard_error_response(err),
    }
}

pub(crate) async fn retreat_handler(
    State(sessions): State<Arc<WizardSessions>>,
    Path(session_id): Path<String>,
) -> Response {
    let wizard = match lookup(&sessions, &session_id) {
        Ok(wizard) => wizard,
        Err(response) => return response,
    };
    let mut guard = wizard.lock().await;
    match guard.retreat() {
        Ok(_) => (StatusCode::OK, Json(guard.view())).into_response(),
        Err(err) => wizard_error_response(err),
    }
}

pub(crate) async fn refresh_handler(
    State(sessions): State<Arc<WizardSessions>>,
    Path(session_id): Path<String>,
) -> Response {
    let wizard = match lookup(&sessions, &session_id) {
        Ok(wizard) => wizard,
        Err(response) => return response,
    };
    if let Err(err) = wizard.lock().await.ensure_step(WizardStep::Selection) {
        return wizard_error_response(err);
    }

    let task = tokio::spawn(async move {
        load_directory(&wizard).await?;
        let view = wizard.lock().await.view();
        Ok::<_, WizardError>(view)
    });
    match task.await {
        Ok(Ok(view)) => (StatusCode::OK, Json(view)).into_response(),
        Ok(Err(err)) => wizard_error_response(err),
        Err(join) => task_failed(join),
    }
}

pub(crate) async fn criteria_handler(
    State(sessions): State<Arc<WizardSessions>>,
    Path(session_id): Path<String>,
    Json(criteria): Json<FilterCriteria>,
) -> Response {
    let wizard = match lookup(&sessions, &session_id) {
        Ok(wizard) => wizard,
        Err(response) => return response,
    };
    let mut guard = wizard.lock().await;
    guard.set_criteria(criteria);
    (StatusCode::OK, Json(guard.view())).into_response()
}

pub(crate) async fn candidates_handler(
    State(sessions): State<Arc<WizardSessions>>,
    Path(session_id): Path<String>,
    Query(query): Query<CandidateQuery>,
) -> Response {
    let wizard = match lookup(&sessions, &session_id) {
        Ok(wizard) => wizard,
        Err(response) => return response,
    };
    let guard = wizard.lock().await;

    // Query parameters narrow this listing only; PUT .../criteria stores them.
    let stored = guard.criteria();
    let criteria = FilterCriteria {
        gender: query.gender.unwrap_or(stored.gender),
        age_band: query.age_band.unwrap_or(stored.age_band),
    };

    let today = Utc::now().date_naive();
    let payload = json!({
        "criteria": criteria,
        "candidates": directory::filter(guard.directory(), &criteria, today),
        "selection": guard.selection().ids(),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn toggle_handler(
    State(sessions): State<Arc<WizardSessions>>,
    Path((session_id, candidate_id)): Path<(String, String)>,
) -> Response {
    let wizard = match lookup(&sessions, &session_id) {
        Ok(wizard) => wizard,
        Err(response) => return response,
    };
    let mut guard = wizard.lock().await;
    match guard.toggle(&CandidateId(candidate_id)) {
        Ok(outcome) => {
            let payload = json!({
                "outcome": outcome,
                "selection": guard.selection().ids(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => wizard_error_response(err),
    }
}

pub(crate) async fn confirm_handler(
    State(sessions): State<Arc<WizardSessions>>,
    Path(session_id): Path<String>,
) -> Response {
    let wizard = match lookup(&sessions, &session_id) {
        Ok(wizard) => wizard,
        Err(response) => return response,
    };

    let pending = match wizard.lock().await.begin_selection_submit() {
        Ok(pending) => pending,
        Err(err) => return wizard_error_response(err),
    };

    let task = tokio::spawn(async move {
        let gateway = wizard.lock().await.gateway();
        let outcome = gateway
            .submit_selection(pending.registration_id(), pending.candidate_ids())
            .await;
        wizard.lock().await.finish_selection(pending, outcome)
    });
    match task.await {
        Ok(Ok(receipt)) => (StatusCode::OK, Json(receipt)).into_response(),
        Ok(Err(err)) => wizard_error_response(err),
        Err(join) => task_failed(join),
    }
}

/// Fetch the directory without holding the wizard lock, then install it.
async fn load_directory(wizard: &SharedWizard) -> Result<usize, WizardError> {
    let (gateway, page_size) = {
        let guard = wizard.lock().await;
        (guard.gateway(), guard.page_size())
    };
    let outcome = load_full_directory(gateway.as_ref(), page_size).await;
    wizard.lock().await.install_directory(outcome)
}

fn lookup(sessions: &WizardSessions, session_id: &str) -> Result<SharedWizard, Response> {
    Uuid::parse_str(session_id)
        .ok()
        .and_then(|id| sessions.get(&id))
        .ok_or_else(|| session_not_found(session_id))
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn session_not_found(session_id: &str) -> Response {
    let payload = json!({
        "error": "wizard session not found",
        "session_id": session_id,
    });
    (StatusCode::NOT_FOUND, Json(payload)).into_response()
}

fn task_failed(join: tokio::task::JoinError) -> Response {
    error!(error = %join, "wizard submission task failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, join.to_string())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, Json(payload)).into_response()
}

pub(crate) fn wizard_error_response(err: WizardError) -> Response {
    let status = match &err {
        WizardError::Validation(validation) => {
            let payload = json!({
                "error": err.to_string(),
                "step": validation.step,
                "missing_fields": validation.missing_fields,
            });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
        }
        WizardError::Attachment(AttachmentError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        WizardError::Field(_) | WizardError::Attachment(_) | WizardError::Selection(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        WizardError::SubmissionInFlight
        | WizardError::WrongStep { .. }
        | WizardError::SelectionAlreadySubmitted => StatusCode::CONFLICT,
        WizardError::UnknownCandidate(_) => StatusCode::NOT_FOUND,
        WizardError::Submission(_) | WizardError::DirectoryUnavailable(_) => {
            StatusCode::BAD_GATEWAY
        }
    };

    error_response(status, err.to_string())
}
