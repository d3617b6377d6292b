use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::directory::{self, FilterCriteria};
use super::domain::{
    AttachmentError, AttachmentKind, CandidateId, CandidateRecord, ImageAttachment,
    RegistrationDraft, RegistrationId, SelectionReceipt, WizardStep,
};
use super::drafts::{DraftSnapshot, DraftStore, DraftStoreError};
use super::fields::{self, FieldError, FieldPath, FieldValue};
use super::gateway::{load_full_directory, GatewayError, SubmissionGateway};
use super::selection::{SelectionError, SelectionSet, ToggleOutcome};
use super::validation::{validate_step, ValidationError};

const DEFAULT_PAGE_SIZE: u32 = 50;

/// Errors surfaced by wizard operations. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("submission failed: {0}")]
    Submission(#[source] GatewayError),
    #[error("housekeeper directory unavailable: {0}")]
    DirectoryUnavailable(#[source] GatewayError),
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("operation requires {expected} but the wizard is on {actual}")]
    WrongStep {
        expected: WizardStep,
        actual: WizardStep,
    },
    #[error("housekeeper {0} is not in the directory")]
    UnknownCandidate(CandidateId),
    #[error("selection was already submitted")]
    SelectionAlreadySubmitted,
}

/// Clears the in-flight flag when dropped, whether or not the call completed.
#[derive(Debug)]
struct InFlightTicket(Arc<AtomicBool>);

impl InFlightTicket {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Registration captured at step 3, waiting on the gateway.
#[derive(Debug)]
pub struct PendingRegistration {
    draft: RegistrationDraft,
    _ticket: InFlightTicket,
}

impl PendingRegistration {
    pub fn draft(&self) -> &RegistrationDraft {
        &self.draft
    }
}

/// Confirmed selection waiting on the gateway.
#[derive(Debug)]
pub struct PendingSelection {
    registration_id: RegistrationId,
    candidate_ids: Vec<CandidateId>,
    _ticket: InFlightTicket,
}

impl PendingSelection {
    pub fn registration_id(&self) -> &RegistrationId {
        &self.registration_id
    }

    pub fn candidate_ids(&self) -> &[CandidateId] {
        &self.candidate_ids
    }
}

/// What `begin_advance` decided.
#[derive(Debug)]
pub enum Advance {
    /// The step changed (or stayed at the last step) without any remote call.
    Moved(WizardStep),
    /// Step 3 validated; the caller must submit and report back through
    /// `finish_registration`.
    Submit(PendingRegistration),
}

/// Serializable picture of a wizard for UI clients.
#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub step: WizardStep,
    pub step_number: u8,
    pub draft: RegistrationDraft,
    pub attachments: Vec<AttachmentKind>,
    pub field_errors: Vec<FieldPath>,
    pub in_flight: bool,
    pub registration_id: Option<RegistrationId>,
    pub directory_size: usize,
    pub criteria: FilterCriteria,
    pub selection: Vec<CandidateId>,
    pub receipt: Option<SelectionReceipt>,
}

/// Employer registration wizard: steps 1-3 collect the draft, the 3→4
/// transition registers it remotely, step 4 shortlists housekeepers.
pub struct RegistrationWizard {
    gateway: Arc<dyn SubmissionGateway>,
    drafts: Option<Arc<dyn DraftStore>>,
    page_size: u32,
    step: WizardStep,
    draft: RegistrationDraft,
    field_errors: BTreeSet<FieldPath>,
    in_flight: Arc<AtomicBool>,
    registration_id: Option<RegistrationId>,
    directory: Vec<CandidateRecord>,
    criteria: FilterCriteria,
    selection: SelectionSet,
    receipt: Option<SelectionReceipt>,
}

impl fmt::Debug for RegistrationWizard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationWizard")
            .field("step", &self.step)
            .field("in_flight", &self.is_in_flight())
            .field("registration_id", &self.registration_id)
            .field("directory", &self.directory.len())
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

impl RegistrationWizard {
    pub fn new(gateway: Arc<dyn SubmissionGateway>) -> Self {
        Self {
            gateway,
            drafts: None,
            page_size: DEFAULT_PAGE_SIZE,
            step: WizardStep::Identity,
            draft: RegistrationDraft::default(),
            field_errors: BTreeSet::new(),
            in_flight: Arc::new(AtomicBool::new(false)),
            registration_id: None,
            directory: Vec::new(),
            criteria: FilterCriteria::default(),
            selection: SelectionSet::default(),
            receipt: None,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Persist the draft after every change from now on.
    pub fn with_draft_store(mut self, store: Arc<dyn DraftStore>) -> Self {
        self.drafts = Some(store);
        self
    }

    /// Restore saved progress, if any, and keep persisting to the same store.
    pub fn resume(
        gateway: Arc<dyn SubmissionGateway>,
        store: Arc<dyn DraftStore>,
    ) -> Result<Self, DraftStoreError> {
        let snapshot = store.load()?;
        let mut wizard = Self::new(gateway).with_draft_store(store);

        if let Some(snapshot) = snapshot {
            // Step 4 is never persisted; a stale file cannot skip registration.
            wizard.step = snapshot.step.min(WizardStep::Preferences);
            wizard.draft = snapshot.draft;
            info!(
                step = wizard.step.number(),
                saved_at = %snapshot.saved_at,
                "resumed registration draft"
            );
        }

        Ok(wizard)
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &RegistrationDraft {
        &self.draft
    }

    pub fn field_errors(&self) -> &BTreeSet<FieldPath> {
        &self.field_errors
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn registration_id(&self) -> Option<&RegistrationId> {
        self.registration_id.as_ref()
    }

    pub fn directory(&self) -> &[CandidateRecord] {
        &self.directory
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.criteria
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn receipt(&self) -> Option<&SelectionReceipt> {
        self.receipt.as_ref()
    }

    pub fn gateway(&self) -> Arc<dyn SubmissionGateway> {
        Arc::clone(&self.gateway)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn view(&self) -> WizardView {
        WizardView {
            step: self.step,
            step_number: self.step.number(),
            draft: self.draft.clone(),
            attachments: self.draft.attachments.keys().copied().collect(),
            field_errors: self.field_errors.iter().copied().collect(),
            in_flight: self.is_in_flight(),
            registration_id: self.registration_id.clone(),
            directory_size: self.directory.len(),
            criteria: self.criteria,
            selection: self.selection.ids().to_vec(),
            receipt: self.receipt.clone(),
        }
    }

    pub fn update_field(&mut self, path: FieldPath, value: FieldValue) -> Result<(), WizardError> {
        self.ensure_idle()?;
        self.ensure_editable()?;

        fields::apply(&mut self.draft, path, value)?;
        self.field_errors.remove(&path);
        debug!(field = %path, "draft field updated");
        self.persist_draft();
        Ok(())
    }

    pub fn attach_image(
        &mut self,
        kind: AttachmentKind,
        attachment: ImageAttachment,
    ) -> Result<(), WizardError> {
        self.ensure_idle()?;
        self.ensure_editable()?;

        debug!(?kind, size = attachment.bytes().len(), "image attached");
        self.draft.attachments.insert(kind, attachment);
        Ok(())
    }

    pub fn detach_image(
        &mut self,
        kind: AttachmentKind,
    ) -> Result<Option<ImageAttachment>, WizardError> {
        self.ensure_idle()?;
        self.ensure_editable()?;
        Ok(self.draft.attachments.remove(&kind))
    }

    /// Step back without validation. Step 4 stays put: the registration
    /// already exists remotely.
    pub fn retreat(&mut self) -> Result<WizardStep, WizardError> {
        self.ensure_idle()?;

        if self.step == WizardStep::Selection {
            debug!("retreat ignored on the selection step");
            return Ok(self.step);
        }

        self.step = self.step.previous();
        self.persist_draft();
        Ok(self.step)
    }

    /// Validate the current step and move forward, or hand back the draft to
    /// submit when leaving step 3.
    pub fn begin_advance(&mut self) -> Result<Advance, WizardError> {
        self.ensure_idle()?;

        let step = self.step;
        if step == WizardStep::Selection {
            return Ok(Advance::Moved(step));
        }

        if let Err(err) = validate_step(step, &self.draft) {
            warn!(step = step.number(), missing = ?err.missing_fields, "step validation failed");
            self.field_errors.extend(err.missing_fields.iter().copied());
            return Err(err.into());
        }

        if step == WizardStep::Preferences {
            let ticket =
                InFlightTicket::acquire(&self.in_flight).ok_or(WizardError::SubmissionInFlight)?;
            info!("registration ready for submission");
            return Ok(Advance::Submit(PendingRegistration {
                draft: self.draft.clone(),
                _ticket: ticket,
            }));
        }

        self.step = step.next();
        self.persist_draft();
        debug!(step = self.step.number(), "advanced");
        Ok(Advance::Moved(self.step))
    }

    /// Record the gateway's answer to a pending registration. On success the
    /// wizard enters step 4 and the draft is reset; on failure it stays on
    /// step 3 with the draft intact.
    pub fn finish_registration(
        &mut self,
        pending: PendingRegistration,
        outcome: Result<RegistrationId, GatewayError>,
    ) -> Result<RegistrationId, WizardError> {
        drop(pending);

        match outcome {
            Ok(id) => {
                info!(registration_id = %id, "registration submitted");
                self.registration_id = Some(id.clone());
                self.step = WizardStep::Selection;
                self.draft = RegistrationDraft::default();
                self.field_errors.clear();
                self.clear_persisted_draft();
                Ok(id)
            }
            Err(cause) => {
                warn!(error = %cause, "registration submission failed");
                Err(WizardError::Submission(cause))
            }
        }
    }

    /// Replace the directory with a freshly loaded one. Selected entries
    /// that disappeared or stopped being available are dropped.
    pub fn install_directory(
        &mut self,
        outcome: Result<Vec<CandidateRecord>, GatewayError>,
    ) -> Result<usize, WizardError> {
        self.ensure_step(WizardStep::Selection)?;

        match outcome {
            Ok(records) => {
                self.selection.retain_eligible(&records);
                self.directory = records;
                info!(count = self.directory.len(), "housekeeper directory loaded");
                Ok(self.directory.len())
            }
            Err(cause) => {
                warn!(error = %cause, "housekeeper directory fetch failed");
                Err(WizardError::DirectoryUnavailable(cause))
            }
        }
    }

    /// Validate and move forward; at step 3 this submits the registration
    /// and loads the directory.
    pub async fn advance(&mut self) -> Result<WizardStep, WizardError> {
        match self.begin_advance()? {
            Advance::Moved(step) => Ok(step),
            Advance::Submit(pending) => {
                let gateway = self.gateway();
                let outcome = gateway.submit_registration(pending.draft()).await;
                self.finish_registration(pending, outcome)?;
                self.refresh_directory().await?;
                Ok(self.step)
            }
        }
    }

    pub async fn refresh_directory(&mut self) -> Result<usize, WizardError> {
        self.ensure_step(WizardStep::Selection)?;
        let gateway = self.gateway();
        let outcome = load_full_directory(gateway.as_ref(), self.page_size).await;
        self.install_directory(outcome)
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
    }

    /// Directory entries passing the current criteria.
    pub fn visible_candidates(&self, today: NaiveDate) -> Vec<CandidateRecord> {
        directory::filter(&self.directory, &self.criteria, today)
    }

    pub fn toggle(&mut self, candidate_id: &CandidateId) -> Result<ToggleOutcome, WizardError> {
        self.ensure_idle()?;
        self.ensure_step(WizardStep::Selection)?;
        self.ensure_not_submitted()?;

        let record = self
            .directory
            .iter()
            .find(|record| record.id == *candidate_id)
            .ok_or_else(|| WizardError::UnknownCandidate(candidate_id.clone()))?;

        let outcome = self.selection.toggle(record);
        debug!(
            candidate = %candidate_id,
            ?outcome,
            size = self.selection.len(),
            "selection toggled"
        );
        Ok(outcome)
    }

    /// Confirm the selection and hand it back for submission.
    pub fn begin_selection_submit(&mut self) -> Result<PendingSelection, WizardError> {
        self.ensure_idle()?;
        self.ensure_step(WizardStep::Selection)?;
        self.ensure_not_submitted()?;

        let registration_id = self
            .registration_id
            .clone()
            .ok_or(WizardError::WrongStep {
                expected: WizardStep::Selection,
                actual: self.step,
            })?;
        let candidate_ids = self.selection.confirm()?;
        let ticket =
            InFlightTicket::acquire(&self.in_flight).ok_or(WizardError::SubmissionInFlight)?;

        Ok(PendingSelection {
            registration_id,
            candidate_ids,
            _ticket: ticket,
        })
    }

    pub fn finish_selection(
        &mut self,
        pending: PendingSelection,
        outcome: Result<SelectionReceipt, GatewayError>,
    ) -> Result<SelectionReceipt, WizardError> {
        drop(pending);

        match outcome {
            Ok(receipt) => {
                info!(
                    registration_id = %receipt.registration_id,
                    count = receipt.candidate_ids.len(),
                    "selection submitted"
                );
                self.receipt = Some(receipt.clone());
                Ok(receipt)
            }
            Err(cause) => {
                warn!(error = %cause, "selection submission failed");
                Err(WizardError::Submission(cause))
            }
        }
    }

    pub async fn submit_selection(&mut self) -> Result<SelectionReceipt, WizardError> {
        let pending = self.begin_selection_submit()?;
        let gateway = self.gateway();
        let outcome = gateway
            .submit_selection(pending.registration_id(), pending.candidate_ids())
            .await;
        self.finish_selection(pending, outcome)
    }

    /// Drop the draft and any saved copy of it.
    pub fn discard(self) {
        self.clear_persisted_draft();
        debug!(step = self.step.number(), "wizard discarded");
    }

    fn ensure_idle(&self) -> Result<(), WizardError> {
        if self.is_in_flight() {
            return Err(WizardError::SubmissionInFlight);
        }
        Ok(())
    }

    pub(crate) fn ensure_step(&self, expected: WizardStep) -> Result<(), WizardError> {
        if self.step != expected {
            return Err(WizardError::WrongStep {
                expected,
                actual: self.step,
            });
        }
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), WizardError> {
        if self.step == WizardStep::Selection {
            return Err(WizardError::WrongStep {
                expected: WizardStep::Preferences,
                actual: self.step,
            });
        }
        Ok(())
    }

    fn ensure_not_submitted(&self) -> Result<(), WizardError> {
        if self.receipt.is_some() {
            return Err(WizardError::SelectionAlreadySubmitted);
        }
        Ok(())
    }

    fn persist_draft(&self) {
        let Some(store) = &self.drafts else {
            return;
        };
        let snapshot = DraftSnapshot::capture(self.step, &self.draft);
        if let Err(err) = store.save(&snapshot) {
            warn!(error = %err, "failed to persist registration draft");
        }
    }

    fn clear_persisted_draft(&self) {
        let Some(store) = &self.drafts else {
            return;
        };
        if let Err(err) = store.clear() {
            warn!(error = %err, "failed to clear saved registration draft");
        }
    }
}
