//! Dotted field paths addressing the registration draft, and the typed
//! values they accept.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::domain::{RegistrationDraft, WizardStep};

const MAX_VACATION_DAYS: u16 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldPath {
    FullName,
    PhoneNumber,
    NationalId,
    Email,
    Province,
    District,
    Sector,
    Cell,
    Village,
    SalaryRange,
    Tasks,
    VacationDays,
    PartnerNumber,
    ChurchName,
}

impl FieldPath {
    pub const ALL: [Self; 14] = [
        Self::FullName,
        Self::PhoneNumber,
        Self::NationalId,
        Self::Email,
        Self::Province,
        Self::District,
        Self::Sector,
        Self::Cell,
        Self::Village,
        Self::SalaryRange,
        Self::Tasks,
        Self::VacationDays,
        Self::PartnerNumber,
        Self::ChurchName,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::FullName => "identity.full_name",
            Self::PhoneNumber => "identity.phone_number",
            Self::NationalId => "identity.national_id",
            Self::Email => "identity.email",
            Self::Province => "location.province",
            Self::District => "location.district",
            Self::Sector => "location.sector",
            Self::Cell => "location.cell",
            Self::Village => "location.village",
            Self::SalaryRange => "preferences.salary_range",
            Self::Tasks => "preferences.tasks",
            Self::VacationDays => "preferences.vacation_days",
            Self::PartnerNumber => "preferences.partner_number",
            Self::ChurchName => "preferences.church_name",
        }
    }

    /// Last path segment, e.g. `phone_number`.
    pub fn name(self) -> &'static str {
        let key = self.key();
        key.rsplit('.').next().unwrap_or(key)
    }

    /// Step on which this field is entered.
    pub const fn step(self) -> WizardStep {
        match self {
            Self::FullName | Self::PhoneNumber | Self::NationalId | Self::Email => {
                WizardStep::Identity
            }
            Self::Province | Self::District | Self::Sector | Self::Cell | Self::Village => {
                WizardStep::Location
            }
            Self::SalaryRange
            | Self::Tasks
            | Self::VacationDays
            | Self::PartnerNumber
            | Self::ChurchName => WizardStep::Preferences,
        }
    }

    /// Whether the draft holds a non-empty value for this field.
    pub fn is_filled(self, draft: &RegistrationDraft) -> bool {
        match self {
            Self::Tasks => draft
                .preferences
                .tasks
                .iter()
                .any(|task| !task.trim().is_empty()),
            Self::VacationDays => draft.preferences.vacation_days.is_some(),
            text => text_slot(draft, text).is_some_and(|value| !value.trim().is_empty()),
        }
    }

    fn text_slot_mut(self, draft: &mut RegistrationDraft) -> Option<&mut String> {
        let slot = match self {
            Self::FullName => &mut draft.identity.full_name,
            Self::PhoneNumber => &mut draft.identity.phone_number,
            Self::NationalId => &mut draft.identity.national_id,
            Self::Email => &mut draft.identity.email,
            Self::Province => &mut draft.location.province,
            Self::District => &mut draft.location.district,
            Self::Sector => &mut draft.location.sector,
            Self::Cell => &mut draft.location.cell,
            Self::Village => &mut draft.location.village,
            Self::SalaryRange => &mut draft.preferences.salary_range,
            Self::PartnerNumber => &mut draft.preferences.partner_number,
            Self::ChurchName => &mut draft.preferences.church_name,
            Self::Tasks | Self::VacationDays => return None,
        };
        Some(slot)
    }
}

fn text_slot(draft: &RegistrationDraft, path: FieldPath) -> Option<&String> {
    let slot = match path {
        FieldPath::FullName => &draft.identity.full_name,
        FieldPath::PhoneNumber => &draft.identity.phone_number,
        FieldPath::NationalId => &draft.identity.national_id,
        FieldPath::Email => &draft.identity.email,
        FieldPath::Province => &draft.location.province,
        FieldPath::District => &draft.location.district,
        FieldPath::Sector => &draft.location.sector,
        FieldPath::Cell => &draft.location.cell,
        FieldPath::Village => &draft.location.village,
        FieldPath::SalaryRange => &draft.preferences.salary_range,
        FieldPath::PartnerNumber => &draft.preferences.partner_number,
        FieldPath::ChurchName => &draft.preferences.church_name,
        FieldPath::Tasks | FieldPath::VacationDays => return None,
    };
    Some(slot)
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for FieldPath {
    type Err = FieldError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        FieldPath::ALL
            .into_iter()
            .find(|path| path.key() == trimmed || path.name() == trimmed)
            .ok_or_else(|| FieldError::UnknownField(trimmed.to_string()))
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Value submitted for a single field edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(u64),
    Text(String),
    List(Vec<String>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("field {path} expects {expected}")]
    TypeMismatch {
        path: FieldPath,
        expected: &'static str,
    },
    #[error("field {path} must be between 0 and {max}, got {value}")]
    OutOfRange { path: FieldPath, value: u64, max: u64 },
}

/// Write `value` into the draft slot addressed by `path`.
pub fn apply(
    draft: &mut RegistrationDraft,
    path: FieldPath,
    value: FieldValue,
) -> Result<(), FieldError> {
    match path {
        FieldPath::Tasks => {
            draft.preferences.tasks = match value {
                FieldValue::List(items) => normalize_tasks(items),
                FieldValue::Text(raw) => {
                    normalize_tasks(raw.split(',').map(str::to_string).collect())
                }
                FieldValue::Number(_) => {
                    return Err(FieldError::TypeMismatch {
                        path,
                        expected: "a list of tasks",
                    })
                }
            };
        }
        FieldPath::VacationDays => {
            draft.preferences.vacation_days = parse_vacation_days(value)?;
        }
        text => {
            let FieldValue::Text(raw) = value else {
                return Err(FieldError::TypeMismatch {
                    path: text,
                    expected: "text",
                });
            };
            if let Some(slot) = text.text_slot_mut(draft) {
                *slot = raw;
            }
        }
    }

    Ok(())
}

/// Non-empty scalar fields in path order, as they go over the wire.
/// Tasks are excluded; callers emit one entry per task.
pub fn text_entries(draft: &RegistrationDraft) -> Vec<(FieldPath, String)> {
    FieldPath::ALL
        .into_iter()
        .filter_map(|path| match path {
            FieldPath::Tasks => None,
            FieldPath::VacationDays => draft
                .preferences
                .vacation_days
                .map(|days| (path, days.to_string())),
            text => text_slot(draft, text)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(|value| (path, value.to_string())),
        })
        .collect()
}

fn normalize_tasks(items: Vec<String>) -> Vec<String> {
    let mut tasks: Vec<String> = Vec::new();
    for item in items {
        let task = item.trim();
        if !task.is_empty() && !tasks.iter().any(|existing| existing == task) {
            tasks.push(task.to_string());
        }
    }
    tasks
}

fn parse_vacation_days(value: FieldValue) -> Result<Option<u16>, FieldError> {
    let path = FieldPath::VacationDays;
    let days = match value {
        FieldValue::Number(days) => days,
        FieldValue::Text(raw) if raw.trim().is_empty() => return Ok(None),
        FieldValue::Text(raw) => raw.trim().parse::<u64>().map_err(|_| FieldError::TypeMismatch {
            path,
            expected: "a whole number of days",
        })?,
        FieldValue::List(_) => {
            return Err(FieldError::TypeMismatch {
                path,
                expected: "a whole number of days",
            })
        }
    };

    if days > u64::from(MAX_VACATION_DAYS) {
        return Err(FieldError::OutOfRange {
            path,
            value: days,
            max: u64::from(MAX_VACATION_DAYS),
        });
    }

    Ok(Some(days as u16))
}
