use std::fmt;

use serde::Serialize;

use super::domain::{RegistrationDraft, WizardStep};
use super::fields::FieldPath;

const IDENTITY_REQUIRED: [FieldPath; 3] = [
    FieldPath::FullName,
    FieldPath::PhoneNumber,
    FieldPath::NationalId,
];

const LOCATION_REQUIRED: [FieldPath; 5] = [
    FieldPath::Province,
    FieldPath::District,
    FieldPath::Sector,
    FieldPath::Cell,
    FieldPath::Village,
];

const PREFERENCES_REQUIRED: [FieldPath; 2] = [FieldPath::SalaryRange, FieldPath::Tasks];

/// Fields that must be filled before leaving `step`.
pub fn required_fields(step: WizardStep) -> &'static [FieldPath] {
    match step {
        WizardStep::Identity => &IDENTITY_REQUIRED,
        WizardStep::Location => &LOCATION_REQUIRED,
        WizardStep::Preferences => &PREFERENCES_REQUIRED,
        WizardStep::Selection => &[],
    }
}

/// A step was left with required fields empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub step: WizardStep,
    pub missing_fields: Vec<FieldPath>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.missing_fields.iter().map(|path| path.name()).collect();
        write!(
            f,
            "{} is missing required fields: {}",
            self.step,
            names.join(", ")
        )
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_step(step: WizardStep, draft: &RegistrationDraft) -> Result<(), ValidationError> {
    let missing_fields: Vec<FieldPath> = required_fields(step)
        .iter()
        .copied()
        .filter(|path| !path.is_filled(draft))
        .collect();

    if missing_fields.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            step,
            missing_fields,
        })
    }
}
