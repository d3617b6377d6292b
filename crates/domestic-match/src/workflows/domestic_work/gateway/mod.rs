//! Boundary to the backend that persists registrations and selections.

mod http;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{
    CandidateId, CandidateRecord, Gender, RegistrationDraft, RegistrationId, SelectionReceipt,
};

pub use http::HttpSubmissionGateway;

/// Upper bound on directory pages fetched in one load.
const MAX_DIRECTORY_PAGES: u32 = 200;

/// One page request against the directory listing. Pages start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryQuery {
    pub page: u32,
    pub per_page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryPage {
    pub records: Vec<CandidateRecord>,
    pub page: u32,
    pub total_pages: u32,
}

/// Failure talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("backend returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("unreadable backend response: {0}")]
    Decode(String),
    #[error("request could not be built: {0}")]
    InvalidRequest(String),
}

/// Operations the wizard needs from the backend.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit_registration(
        &self,
        draft: &RegistrationDraft,
    ) -> Result<RegistrationId, GatewayError>;

    async fn fetch_directory(&self, query: &DirectoryQuery)
        -> Result<DirectoryPage, GatewayError>;

    async fn submit_selection(
        &self,
        registration_id: &RegistrationId,
        candidate_ids: &[CandidateId],
    ) -> Result<SelectionReceipt, GatewayError>;
}

/// Walk every directory page and return the records in listing order.
/// Entries repeated across pages (the listing shifting underneath us) are
/// kept once.
pub async fn load_full_directory(
    gateway: &dyn SubmissionGateway,
    per_page: u32,
) -> Result<Vec<CandidateRecord>, GatewayError> {
    let per_page = per_page.max(1);
    let mut seen: HashSet<CandidateId> = HashSet::new();
    let mut records = Vec::new();
    let mut page = 1;

    loop {
        let query = DirectoryQuery {
            page,
            per_page,
            gender: None,
        };
        let batch = gateway.fetch_directory(&query).await?;
        debug!(
            page,
            total_pages = batch.total_pages,
            count = batch.records.len(),
            "fetched directory page"
        );

        let empty = batch.records.is_empty();
        for record in batch.records {
            if seen.insert(record.id.clone()) {
                records.push(record);
            }
        }

        if empty || page >= batch.total_pages {
            break;
        }
        if page >= MAX_DIRECTORY_PAGES {
            warn!(page, "directory pagination limit reached, truncating listing");
            break;
        }
        page += 1;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::domestic_work::domain::AvailabilityStatus;
    use std::sync::Mutex;

    struct PagedGateway {
        pages: Vec<Vec<&'static str>>,
        requested: Mutex<Vec<u32>>,
    }

    fn record(id: &str) -> CandidateRecord {
        CandidateRecord {
            id: CandidateId(id.to_string()),
            display_name: id.to_string(),
            date_of_birth: None,
            gender: Gender::Female,
            availability: AvailabilityStatus::Available,
            location: Default::default(),
            preferences: Default::default(),
        }
    }

    #[async_trait]
    impl SubmissionGateway for PagedGateway {
        async fn submit_registration(
            &self,
            _draft: &RegistrationDraft,
        ) -> Result<RegistrationId, GatewayError> {
            Err(GatewayError::Network("not used".to_string()))
        }

        async fn fetch_directory(
            &self,
            query: &DirectoryQuery,
        ) -> Result<DirectoryPage, GatewayError> {
            self.requested.lock().expect("mutex").push(query.page);
            let index = (query.page - 1) as usize;
            let records: Vec<CandidateRecord> = self
                .pages
                .get(index)
                .map(|ids| ids.iter().map(|id| record(id)).collect())
                .unwrap_or_default();
            Ok(DirectoryPage {
                records,
                page: query.page,
                total_pages: self.pages.len() as u32,
            })
        }

        async fn submit_selection(
            &self,
            _registration_id: &RegistrationId,
            _candidate_ids: &[CandidateId],
        ) -> Result<SelectionReceipt, GatewayError> {
            Err(GatewayError::Network("not used".to_string()))
        }
    }

    #[tokio::test]
    async fn loads_every_page_and_skips_repeats() {
        let gateway = PagedGateway {
            pages: vec![vec!["a", "b"], vec!["b", "c"], vec!["d"]],
            requested: Mutex::new(Vec::new()),
        };

        let records = load_full_directory(&gateway, 2).await.expect("loads");
        let ids: Vec<&str> = records.iter().map(|record| record.id.0.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(*gateway.requested.lock().expect("mutex"), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn stops_on_an_empty_page() {
        let gateway = PagedGateway {
            pages: vec![vec!["a"], vec![], vec!["z"]],
            requested: Mutex::new(Vec::new()),
        };

        let records = load_full_directory(&gateway, 1).await.expect("loads");
        assert_eq!(records.len(), 1);
        assert_eq!(*gateway.requested.lock().expect("mutex"), vec![1, 2]);
    }
}
