use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Largest image accepted for any attachment slot.
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

/// Identifier the backend assigns to a persisted employer registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(pub String);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a housekeeper listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Screens of the employer registration wizard, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Identity,
    Location,
    Preferences,
    Selection,
}

impl WizardStep {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Identity,
            Self::Location,
            Self::Preferences,
            Self::Selection,
        ]
    }

    pub const fn number(self) -> u8 {
        match self {
            Self::Identity => 1,
            Self::Location => 2,
            Self::Preferences => 3,
            Self::Selection => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Identity => "Personal information",
            Self::Location => "Location",
            Self::Preferences => "Preferences",
            Self::Selection => "Housekeeper selection",
        }
    }

    /// The following step, capped at `Selection`.
    pub const fn next(self) -> Self {
        match self {
            Self::Identity => Self::Location,
            Self::Location => Self::Preferences,
            Self::Preferences | Self::Selection => Self::Selection,
        }
    }

    /// The preceding step, floored at `Identity`.
    pub const fn previous(self) -> Self {
        match self {
            Self::Identity | Self::Location => Self::Identity,
            Self::Preferences => Self::Location,
            Self::Selection => Self::Preferences,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.label())
    }
}

/// Who the employer is and how to reach them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDetails {
    pub full_name: String,
    pub phone_number: String,
    pub national_id: String,
    pub email: String,
}

/// Administrative address, from province down to village.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationDetails {
    pub province: String,
    pub district: String,
    pub sector: String,
    pub cell: String,
    pub village: String,
}

/// What the employer offers and expects from a housekeeper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceDetails {
    pub salary_range: String,
    pub tasks: Vec<String>,
    pub vacation_days: Option<u16>,
    pub partner_number: String,
    pub church_name: String,
}

/// Image slots accepted alongside a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Profile,
    Passport,
    FullBody,
    NationalId,
}

impl AttachmentKind {
    pub const fn ordered() -> [Self; 4] {
        [Self::Profile, Self::Passport, Self::FullBody, Self::NationalId]
    }

    /// Multipart field name the backend expects for this slot.
    pub const fn form_field(self) -> &'static str {
        match self {
            Self::Profile => "profile_image",
            Self::Passport => "passport_image",
            Self::FullBody => "full_body_image",
            Self::NationalId => "national_id_image",
        }
    }
}

impl FromStr for AttachmentKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "profile" | "profile_image" => Ok(Self::Profile),
            "passport" | "passport_image" => Ok(Self::Passport),
            "full_body" | "full_body_image" => Ok(Self::FullBody),
            "national_id" | "national_id_image" | "id" => Ok(Self::NationalId),
            other => Err(format!("unknown attachment kind '{other}'")),
        }
    }
}

/// Rejections raised while accepting an image attachment.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("attachment '{file_name}' is empty")]
    Empty { file_name: String },
    #[error("attachment '{file_name}' has content type '{content_type}', expected image/*")]
    NotAnImage {
        file_name: String,
        content_type: String,
    },
    #[error("attachment '{file_name}' is {size} bytes, limit is {limit} bytes")]
    TooLarge {
        file_name: String,
        size: usize,
        limit: usize,
    },
}

/// Binary image held in memory until the registration is submitted.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

impl ImageAttachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, AttachmentError> {
        let file_name = file_name.into();
        let content_type = content_type.into();

        if bytes.is_empty() {
            return Err(AttachmentError::Empty { file_name });
        }

        let is_image = content_type
            .parse::<mime::Mime>()
            .map(|parsed| parsed.type_() == mime::IMAGE)
            .unwrap_or(false);
        if !is_image {
            return Err(AttachmentError::NotAnImage {
                file_name,
                content_type,
            });
        }

        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(AttachmentError::TooLarge {
                file_name,
                size: bytes.len(),
                limit: MAX_IMAGE_BYTES,
            });
        }

        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Registration payload accumulated across the data-entry steps.
///
/// Attachments are kept out of the serialized form; they travel as multipart
/// parts and are never written into a persisted draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDraft {
    #[serde(default)]
    pub identity: IdentityDetails,
    #[serde(default)]
    pub location: LocationDetails,
    #[serde(default)]
    pub preferences: PreferenceDetails,
    #[serde(skip)]
    pub attachments: BTreeMap<AttachmentKind, ImageAttachment>,
}

impl RegistrationDraft {
    pub fn is_blank(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            other => Err(format!("unknown gender '{other}'")),
        }
    }
}

/// Whether a housekeeper can currently be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    Hired,
    Inactive,
}

impl AvailabilityStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Hired => "hired",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for AvailabilityStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "hired" => Ok(Self::Hired),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown availability status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLocation {
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub sector: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePreferences {
    #[serde(default)]
    pub salary_range: Option<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// One housekeeper as listed by the backend directory. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: CandidateId,
    pub display_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Gender,
    pub availability: AvailabilityStatus,
    #[serde(default)]
    pub location: CandidateLocation,
    #[serde(default)]
    pub preferences: CandidatePreferences,
}

impl CandidateRecord {
    pub fn is_available(&self) -> bool {
        self.availability == AvailabilityStatus::Available
    }
}

/// Acknowledgement that the backend recorded an employer's selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionReceipt {
    pub registration_id: RegistrationId,
    pub candidate_ids: Vec<CandidateId>,
    pub accepted_at: DateTime<Utc>,
}
