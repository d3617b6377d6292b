use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use domestic_match::workflows::domestic_work::{
    AvailabilityStatus, CandidateId, CandidateLocation, CandidatePreferences, CandidateRecord,
    DirectoryPage, DirectoryQuery, Gender, GatewayError, RegistrationDraft, RegistrationId,
    SelectionReceipt, SubmissionGateway,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct Ledger {
    registrations: HashMap<RegistrationId, RegistrationDraft>,
    selections: HashMap<RegistrationId, Vec<CandidateId>>,
}

/// Backend stand-in for offline serving and the CLI demo.
#[derive(Default, Clone)]
pub(crate) struct InMemorySubmissionGateway {
    directory: Arc<Vec<CandidateRecord>>,
    ledger: Arc<Mutex<Ledger>>,
}

impl InMemorySubmissionGateway {
    pub(crate) fn new(directory: Vec<CandidateRecord>) -> Self {
        Self {
            directory: Arc::new(directory),
            ledger: Arc::default(),
        }
    }

    pub(crate) fn seeded() -> Self {
        Self::new(sample_directory())
    }

    pub(crate) fn registration(&self, id: &RegistrationId) -> Option<RegistrationDraft> {
        self.ledger().registrations.get(id).cloned()
    }

    pub(crate) fn selection(&self, id: &RegistrationId) -> Option<Vec<CandidateId>> {
        self.ledger().selections.get(id).cloned()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SubmissionGateway for InMemorySubmissionGateway {
    async fn submit_registration(
        &self,
        draft: &RegistrationDraft,
    ) -> Result<RegistrationId, GatewayError> {
        let mut ledger = self.ledger();
        let phone = draft.identity.phone_number.trim();
        if ledger
            .registrations
            .values()
            .any(|existing| existing.identity.phone_number.trim() == phone)
        {
            return Err(GatewayError::Rejected {
                status: 422,
                message: format!("phone number {phone} is already registered"),
            });
        }

        let id = RegistrationId(format!("emp-{:04}", ledger.registrations.len() + 1));
        ledger.registrations.insert(id.clone(), draft.clone());
        info!(registration_id = %id, "registration stored in memory");
        Ok(id)
    }

    async fn fetch_directory(&self, query: &DirectoryQuery) -> Result<DirectoryPage, GatewayError> {
        let per_page = query.per_page.max(1) as usize;
        let matching: Vec<&CandidateRecord> = self
            .directory
            .iter()
            .filter(|record| query.gender.map_or(true, |gender| record.gender == gender))
            .collect();

        let total_pages = matching.len().div_ceil(per_page).max(1) as u32;
        let start = (query.page.max(1) as usize - 1) * per_page;
        let records = matching
            .into_iter()
            .skip(start)
            .take(per_page)
            .cloned()
            .collect();

        Ok(DirectoryPage {
            records,
            page: query.page,
            total_pages,
        })
    }

    async fn submit_selection(
        &self,
        registration_id: &RegistrationId,
        candidate_ids: &[CandidateId],
    ) -> Result<SelectionReceipt, GatewayError> {
        let mut ledger = self.ledger();
        if !ledger.registrations.contains_key(registration_id) {
            return Err(GatewayError::Rejected {
                status: 404,
                message: format!("employer {registration_id} is not registered"),
            });
        }

        ledger
            .selections
            .insert(registration_id.clone(), candidate_ids.to_vec());
        Ok(SelectionReceipt {
            registration_id: registration_id.clone(),
            candidate_ids: candidate_ids.to_vec(),
            accepted_at: Utc::now(),
        })
    }
}

fn housekeeper(
    id: &str,
    name: &str,
    born: (i32, u32, u32),
    gender: Gender,
    availability: AvailabilityStatus,
    district: &str,
    tasks: &[&str],
) -> CandidateRecord {
    CandidateRecord {
        id: CandidateId(id.to_string()),
        display_name: name.to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(born.0, born.1, born.2),
        gender,
        availability,
        location: CandidateLocation {
            district: district.to_string(),
            sector: String::new(),
        },
        preferences: CandidatePreferences {
            salary_range: None,
            tasks: tasks.iter().map(|task| task.to_string()).collect(),
        },
    }
}

pub(crate) fn sample_directory() -> Vec<CandidateRecord> {
    use AvailabilityStatus::{Available, Hired, Inactive};
    use Gender::{Female, Male};

    vec![
        housekeeper(
            "hk-101",
            "Claudine Mukamana",
            (2005, 3, 2),
            Female,
            Available,
            "Gasabo",
            &["cooking", "laundry"],
        ),
        housekeeper(
            "hk-102",
            "Jean Paul Habimana",
            (1999, 8, 19),
            Male,
            Available,
            "Kicukiro",
            &["gardening", "driving"],
        ),
        housekeeper(
            "hk-103",
            "Diane Uwimana",
            (2001, 12, 31),
            Female,
            Hired,
            "Gasabo",
            &["childcare"],
        ),
        housekeeper(
            "hk-104",
            "Eric Niyonzima",
            (1994, 1, 7),
            Male,
            Available,
            "Nyarugenge",
            &["cleaning"],
        ),
        housekeeper(
            "hk-105",
            "Grace Ingabire",
            (1997, 6, 14),
            Female,
            Available,
            "Gasabo",
            &["cooking", "childcare"],
        ),
        housekeeper(
            "hk-106",
            "Alice Nyirahabimana",
            (1986, 10, 3),
            Female,
            Available,
            "Kicukiro",
            &["elderly care"],
        ),
        housekeeper(
            "hk-107",
            "Patrick Mugisha",
            (1991, 4, 22),
            Male,
            Inactive,
            "Gasabo",
            &["security"],
        ),
        housekeeper(
            "hk-108",
            "Josiane Umutoni",
            (2003, 9, 9),
            Female,
            Available,
            "Nyarugenge",
            &["laundry", "cleaning"],
        ),
    ]
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn directory_pages_respect_gender_and_size() {
        let gateway = InMemorySubmissionGateway::seeded();
        let page = gateway
            .fetch_directory(&DirectoryQuery {
                page: 2,
                per_page: 2,
                gender: Some(Gender::Female),
            })
            .await
            .expect("page");

        assert_eq!(page.total_pages, 3);
        let ids: Vec<&str> = page.records.iter().map(|record| record.id.0.as_str()).collect();
        assert_eq!(ids, vec!["hk-105", "hk-106"]);
    }

    #[tokio::test]
    async fn duplicate_phone_numbers_are_rejected() {
        let gateway = InMemorySubmissionGateway::seeded();
        let mut draft = RegistrationDraft::default();
        draft.identity.phone_number = "+250788000111".to_string();

        let id = gateway.submit_registration(&draft).await.expect("first");
        assert!(gateway.registration(&id).is_some());
        assert!(matches!(
            gateway.submit_registration(&draft).await,
            Err(GatewayError::Rejected { status: 422, .. })
        ));
    }

    #[tokio::test]
    async fn selection_requires_a_registration() {
        let gateway = InMemorySubmissionGateway::seeded();
        let unknown = RegistrationId("emp-9999".to_string());

        let err = gateway
            .submit_selection(&unknown, &[CandidateId("hk-101".to_string())])
            .await
            .expect_err("unknown employer");
        assert!(matches!(err, GatewayError::Rejected { status: 404, .. }));
        assert!(gateway.selection(&unknown).is_none());
    }

    #[test]
    fn parse_date_reports_bad_input() {
        assert!(parse_date("2026-02-30").is_err());
        assert_eq!(
            parse_date(" 2026-02-28 ").expect("valid"),
            NaiveDate::from_ymd_opt(2026, 2, 28).expect("valid")
        );
    }
}
