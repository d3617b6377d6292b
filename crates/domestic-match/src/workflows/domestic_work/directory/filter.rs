use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::super::domain::{CandidateRecord, Gender};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderFilter {
    #[default]
    All,
    Male,
    Female,
}

impl GenderFilter {
    pub fn matches(self, gender: Gender) -> bool {
        match self {
            Self::All => true,
            Self::Male => gender == Gender::Male,
            Self::Female => gender == Gender::Female,
        }
    }

    /// Server-side hint for directory queries; `All` sends none.
    pub fn as_gender(self) -> Option<Gender> {
        match self {
            Self::All => None,
            Self::Male => Some(Gender::Male),
            Self::Female => Some(Gender::Female),
        }
    }
}

impl FromStr for GenderFilter {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "all" | "any" => Ok(Self::All),
            other => other.parse::<Gender>().map(|gender| match gender {
                Gender::Male => Self::Male,
                Gender::Female => Self::Female,
            }),
        }
    }
}

impl<'de> Deserialize<'de> for GenderFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Age ranges offered by the directory filter. Bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AgeBand {
    #[default]
    All,
    From18To21,
    From22To25,
    From26To30,
    From31To35,
    From36,
}

impl AgeBand {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::All,
            Self::From18To21,
            Self::From22To25,
            Self::From26To30,
            Self::From31To35,
            Self::From36,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::From18To21 => "18-21",
            Self::From22To25 => "22-25",
            Self::From26To30 => "26-30",
            Self::From31To35 => "31-35",
            Self::From36 => "36+",
        }
    }

    const fn bounds(self) -> Option<(i32, Option<i32>)> {
        match self {
            Self::All => None,
            Self::From18To21 => Some((18, Some(21))),
            Self::From22To25 => Some((22, Some(25))),
            Self::From26To30 => Some((26, Some(30))),
            Self::From31To35 => Some((31, Some(35))),
            Self::From36 => Some((36, None)),
        }
    }

    /// An unknown age only satisfies `All`.
    pub fn contains(self, age: Option<i32>) -> bool {
        let Some((low, high)) = self.bounds() else {
            return true;
        };
        match age {
            Some(age) => age >= low && high.map_or(true, |high| age <= high),
            None => false,
        }
    }
}

impl fmt::Display for AgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AgeBand {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        // A literal `+` arrives as a space in form-encoded query strings.
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "all" | "any" => Ok(Self::All),
            "18-21" => Ok(Self::From18To21),
            "22-25" => Ok(Self::From22To25),
            "26-30" => Ok(Self::From26To30),
            "31-35" => Ok(Self::From31To35),
            "36+" | "36" | "36-plus" | "36plus" => Ok(Self::From36),
            other => Err(format!(
                "unknown age band '{other}', expected one of all, 18-21, 22-25, 26-30, 31-35, 36+"
            )),
        }
    }
}

impl Serialize for AgeBand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for AgeBand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub gender: GenderFilter,
    #[serde(default)]
    pub age_band: AgeBand,
}

impl FilterCriteria {
    pub fn matches(&self, record: &CandidateRecord, today: NaiveDate) -> bool {
        let age = record.date_of_birth.map(|dob| age_in_years(dob, today));
        self.gender.matches(record.gender) && self.age_band.contains(age)
    }
}

/// Whole-year age by subtracting birth year from the current year. Month and
/// day are ignored, so someone born on 31 December counts a year older from
/// 1 January.
pub fn age_in_years(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    today.year() - date_of_birth.year()
}

/// Records matching both the gender and the age-band predicate, in input order.
pub fn filter(
    records: &[CandidateRecord],
    criteria: &FilterCriteria,
    today: NaiveDate,
) -> Vec<CandidateRecord> {
    records
        .iter()
        .filter(|record| criteria.matches(record, today))
        .cloned()
        .collect()
}
