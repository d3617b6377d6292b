use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::super::domain::{
    AvailabilityStatus, CandidateId, CandidateLocation, CandidatePreferences, CandidateRecord,
    Gender,
};

#[derive(Debug, thiserror::Error)]
pub enum DirectoryImportError {
    #[error("unable to open directory export: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed directory export: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
}

/// Load a housekeeper directory exported as CSV.
pub fn load_directory_csv<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<CandidateRecord>, DirectoryImportError> {
    let file = File::open(path)?;
    parse_directory(file)
}

/// Parse CSV rows with the columns
/// `id,name,date_of_birth,gender,status,district,sector,salary_range,tasks`.
/// Only `id`, `name`, `gender` and `status` are mandatory; tasks are
/// separated by `;`.
pub fn parse_directory<R: Read>(reader: R) -> Result<Vec<CandidateRecord>, DirectoryImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, row) in csv_reader.deserialize::<DirectoryRow>().enumerate() {
        // Header is row 1.
        let row_number = index + 2;
        let row = row?;
        records.push(row.into_record(row_number)?);
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct DirectoryRow {
    id: String,
    name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    date_of_birth: Option<String>,
    gender: String,
    status: String,
    #[serde(default)]
    district: String,
    #[serde(default)]
    sector: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    salary_range: Option<String>,
    #[serde(default)]
    tasks: String,
}

impl DirectoryRow {
    fn into_record(self, row: usize) -> Result<CandidateRecord, DirectoryImportError> {
        let invalid = |reason: String| DirectoryImportError::InvalidRow { row, reason };

        if self.id.is_empty() {
            return Err(invalid("missing id".to_string()));
        }

        let date_of_birth = match self.date_of_birth.as_deref() {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|err| invalid(format!("date_of_birth '{raw}': {err}")))?,
            ),
            None => None,
        };
        let gender = self.gender.parse::<Gender>().map_err(invalid)?;
        let availability = self.status.parse::<AvailabilityStatus>().map_err(invalid)?;
        let tasks = self
            .tasks
            .split(';')
            .map(str::trim)
            .filter(|task| !task.is_empty())
            .map(str::to_string)
            .collect();

        Ok(CandidateRecord {
            id: CandidateId(self.id),
            display_name: self.name,
            date_of_birth,
            gender,
            availability,
            location: CandidateLocation {
                district: self.district,
                sector: self.sector,
            },
            preferences: CandidatePreferences {
                salary_range: self.salary_range,
                tasks,
            },
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
