//! Domestic-work employer registration: a four-step wizard that registers an
//! employer with the backend and then shortlists housekeepers from the
//! directory.

pub mod directory;
pub mod domain;
pub mod drafts;
pub mod fields;
pub mod gateway;
pub mod router;
pub mod selection;
pub mod sessions;
pub(crate) mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use directory::{
    age_in_years, filter, load_directory_csv, parse_directory, AgeBand, DirectoryImportError,
    FilterCriteria, GenderFilter,
};
pub use domain::{
    AttachmentError, AttachmentKind, AvailabilityStatus, CandidateId, CandidateLocation,
    CandidatePreferences, CandidateRecord, Gender, IdentityDetails, ImageAttachment,
    LocationDetails, PreferenceDetails, RegistrationDraft, RegistrationId, SelectionReceipt,
    WizardStep, MAX_IMAGE_BYTES,
};
pub use drafts::{DraftSnapshot, DraftStore, DraftStoreError, FileDraftStore};
pub use fields::{FieldError, FieldPath, FieldValue};
pub use gateway::{
    load_full_directory, DirectoryPage, DirectoryQuery, GatewayError, HttpSubmissionGateway,
    SubmissionGateway,
};
pub use router::wizard_router;
pub use selection::{SelectionError, SelectionSet, ToggleOutcome, SELECTION_CAPACITY};
pub use sessions::{SharedWizard, WizardSessions};
pub use validation::{required_fields, validate_step, ValidationError};
pub use wizard::{
    Advance, PendingRegistration, PendingSelection, RegistrationWizard, WizardError, WizardView,
};
