use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{DirectoryPage, DirectoryQuery, GatewayError, SubmissionGateway};
use crate::config::GatewayConfig;
use crate::workflows::domestic_work::domain::{
    CandidateId, RegistrationDraft, RegistrationId, SelectionReceipt,
};
use crate::workflows::domestic_work::fields::{self, FieldPath};

/// REST client for the domestic-work backend.
#[derive(Debug, Clone)]
pub struct HttpSubmissionGateway {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct SelectionRequest<'a> {
    housekeeper_ids: &'a [CandidateId],
}

#[derive(Debug, Deserialize)]
struct SelectionResponse {
    #[serde(default)]
    accepted_at: Option<DateTime<Utc>>,
}

impl HttpSubmissionGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| GatewayError::InvalidRequest(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SubmissionGateway for HttpSubmissionGateway {
    async fn submit_registration(
        &self,
        draft: &RegistrationDraft,
    ) -> Result<RegistrationId, GatewayError> {
        let url = format!("{}/api/domestic-work/employers", self.base_url);
        let form = registration_form(draft)?;

        info!(
            url = %url,
            attachments = draft.attachments.len(),
            "submitting employer registration"
        );
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let body: RegistrationResponse = read_json(resp).await?;
        info!(registration_id = %body.id, "employer registration accepted");
        Ok(RegistrationId(body.id))
    }

    async fn fetch_directory(
        &self,
        query: &DirectoryQuery,
    ) -> Result<DirectoryPage, GatewayError> {
        let url = format!("{}/api/domestic-work/housekeepers", self.base_url);
        let mut params = vec![
            ("page", query.page.to_string()),
            ("per_page", query.per_page.to_string()),
        ];
        if let Some(gender) = query.gender {
            params.push(("gender", gender.label().to_string()));
        }

        let resp = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(transport_error)?;

        read_json(resp).await
    }

    async fn submit_selection(
        &self,
        registration_id: &RegistrationId,
        candidate_ids: &[CandidateId],
    ) -> Result<SelectionReceipt, GatewayError> {
        let url = format!(
            "{}/api/domestic-work/employers/{}/selections",
            self.base_url, registration_id
        );

        info!(url = %url, count = candidate_ids.len(), "submitting housekeeper selection");
        let resp = self
            .client
            .post(&url)
            .json(&SelectionRequest {
                housekeeper_ids: candidate_ids,
            })
            .send()
            .await
            .map_err(transport_error)?;

        let body: SelectionResponse = read_json(resp).await?;
        Ok(SelectionReceipt {
            registration_id: registration_id.clone(),
            candidate_ids: candidate_ids.to_vec(),
            accepted_at: body.accepted_at.unwrap_or_else(Utc::now),
        })
    }
}

fn registration_form(draft: &RegistrationDraft) -> Result<Form, GatewayError> {
    let mut form = Form::new();

    for (path, value) in fields::text_entries(draft) {
        form = form.text(path.key(), value);
    }
    for task in &draft.preferences.tasks {
        form = form.text(FieldPath::Tasks.key(), task.clone());
    }

    for (kind, attachment) in &draft.attachments {
        let part = Part::bytes(attachment.bytes().to_vec())
            .file_name(attachment.file_name().to_string())
            .mime_str(attachment.content_type())
            .map_err(|err| GatewayError::InvalidRequest(err.to_string()))?;
        form = form.part(kind.form_field(), part);
    }

    Ok(form)
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, GatewayError> {
    let status = resp.status();

    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
        let body = resp.text().await.unwrap_or_default();
        let message = extract_message(&body);
        warn!(status = status.as_u16(), %message, "backend rejected request");
        return Err(GatewayError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "backend request failed");
        return Err(GatewayError::Server {
            status: status.as_u16(),
            body,
        });
    }

    resp.json::<T>().await.map_err(|err| {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            transport_error(err)
        }
    })
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Network(err.to_string())
    }
}

/// Pull a readable message out of an error body, falling back to the raw text.
fn extract_message(body: &str) -> String {
    let trimmed = body.trim();
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return trimmed.to_string();
    };

    for key in ["message", "error"] {
        if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
            return text.to_string();
        }
    }
    if let Some(errors) = value.get("errors") {
        return errors.to_string();
    }

    trimmed.to_string()
}
