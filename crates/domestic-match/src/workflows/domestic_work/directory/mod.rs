//! Housekeeper directory: offline CSV import and the gender/age filter.

mod filter;
mod import;

pub use filter::{age_in_years, filter, AgeBand, FilterCriteria, GenderFilter};
pub use import::{load_directory_csv, parse_directory, DirectoryImportError};
