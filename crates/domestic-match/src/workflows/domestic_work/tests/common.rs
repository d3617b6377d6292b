use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::Notify;
use tower::ServiceExt;

use crate::workflows::domestic_work::domain::{
    AvailabilityStatus, CandidateId, CandidateRecord, Gender, RegistrationDraft, RegistrationId,
    SelectionReceipt,
};
use crate::workflows::domestic_work::fields::{FieldPath, FieldValue};
use crate::workflows::domestic_work::gateway::{
    DirectoryPage, DirectoryQuery, GatewayError, SubmissionGateway,
};
use crate::workflows::domestic_work::wizard::RegistrationWizard;

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 1).expect("valid date")
}

pub(super) fn candidate(
    id: &str,
    born: i32,
    gender: Gender,
    availability: AvailabilityStatus,
) -> CandidateRecord {
    CandidateRecord {
        id: CandidateId(id.to_string()),
        display_name: format!("Housekeeper {id}"),
        date_of_birth: NaiveDate::from_ymd_opt(born, 4, 10),
        gender,
        availability,
        location: Default::default(),
        preferences: Default::default(),
    }
}

/// Three available and two hired, interleaved.
pub(super) fn directory() -> Vec<CandidateRecord> {
    vec![
        candidate("hk-1", 1998, Gender::Female, AvailabilityStatus::Hired),
        candidate("hk-2", 2002, Gender::Female, AvailabilityStatus::Available),
        candidate("hk-3", 1990, Gender::Male, AvailabilityStatus::Hired),
        candidate("hk-4", 1996, Gender::Female, AvailabilityStatus::Available),
        candidate("hk-5", 1985, Gender::Male, AvailabilityStatus::Available),
    ]
}

/// Gateway double that records calls and can be told to fail or to hold a
/// registration until released.
#[derive(Default)]
pub(super) struct ScriptedGateway {
    pub directory: Vec<CandidateRecord>,
    pub fail_registration: AtomicBool,
    pub fail_directory: AtomicBool,
    pub fail_selection: AtomicBool,
    pub hold_registration: Option<Arc<Notify>>,
    pub registrations: Mutex<Vec<RegistrationDraft>>,
    pub selections: Mutex<Vec<Vec<CandidateId>>>,
    pub directory_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub(super) fn with_directory(directory: Vec<CandidateRecord>) -> Self {
        Self {
            directory,
            ..Self::default()
        }
    }

    pub(super) fn registration_count(&self) -> usize {
        self.registrations.lock().expect("mutex").len()
    }
}

#[async_trait]
impl SubmissionGateway for ScriptedGateway {
    async fn submit_registration(
        &self,
        draft: &RegistrationDraft,
    ) -> Result<RegistrationId, GatewayError> {
        if let Some(gate) = &self.hold_registration {
            gate.notified().await;
        }
        if self.fail_registration.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 422,
                message: "phone number already registered".to_string(),
            });
        }
        let mut registrations = self.registrations.lock().expect("mutex");
        registrations.push(draft.clone());
        Ok(RegistrationId(format!("emp-{}", registrations.len())))
    }

    async fn fetch_directory(&self, query: &DirectoryQuery) -> Result<DirectoryPage, GatewayError> {
        self.directory_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_directory.load(Ordering::SeqCst) {
            return Err(GatewayError::Server {
                status: 503,
                body: "maintenance".to_string(),
            });
        }
        Ok(DirectoryPage {
            records: self.directory.clone(),
            page: query.page,
            total_pages: 1,
        })
    }

    async fn submit_selection(
        &self,
        registration_id: &RegistrationId,
        candidate_ids: &[CandidateId],
    ) -> Result<SelectionReceipt, GatewayError> {
        if self.fail_selection.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout);
        }
        self.selections
            .lock()
            .expect("mutex")
            .push(candidate_ids.to_vec());
        Ok(SelectionReceipt {
            registration_id: registration_id.clone(),
            candidate_ids: candidate_ids.to_vec(),
            accepted_at: Utc
                .with_ymd_and_hms(2026, 6, 1, 9, 30, 0)
                .single()
                .expect("valid timestamp"),
        })
    }
}

pub(super) fn identity_fields() -> Vec<(FieldPath, FieldValue)> {
    vec![
        (FieldPath::FullName, "Aline Uwase".into()),
        (FieldPath::PhoneNumber, "+250788000111".into()),
        (FieldPath::NationalId, "1199080012345678".into()),
    ]
}

pub(super) fn location_fields() -> Vec<(FieldPath, FieldValue)> {
    vec![
        (FieldPath::Province, "Kigali".into()),
        (FieldPath::District, "Gasabo".into()),
        (FieldPath::Sector, "Kimironko".into()),
        (FieldPath::Cell, "Bibare".into()),
        (FieldPath::Village, "Imena".into()),
    ]
}

pub(super) fn preference_fields() -> Vec<(FieldPath, FieldValue)> {
    vec![
        (FieldPath::SalaryRange, "50000-80000".into()),
        (FieldPath::Tasks, "cooking, laundry".into()),
    ]
}

pub(super) fn fill(wizard: &mut RegistrationWizard, fields: Vec<(FieldPath, FieldValue)>) {
    for (path, value) in fields {
        wizard.update_field(path, value).expect("field accepted");
    }
}

/// Wizard sitting on step 3 with every required field entered.
pub(super) async fn wizard_at_preferences(gateway: Arc<ScriptedGateway>) -> RegistrationWizard {
    let mut wizard = RegistrationWizard::new(gateway);
    fill(&mut wizard, identity_fields());
    wizard.advance().await.expect("identity step");
    fill(&mut wizard, location_fields());
    wizard.advance().await.expect("location step");
    fill(&mut wizard, preference_fields());
    wizard
}

pub(super) async fn send(router: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("router responds");
    let status = response.status();
    (status, json_body(response).await)
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("encode")))
        .expect("request")
}

pub(super) fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}
