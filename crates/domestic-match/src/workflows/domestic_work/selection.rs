use serde::Serialize;

use super::domain::{CandidateId, CandidateRecord};

/// How many housekeepers an employer may shortlist at once.
pub const SELECTION_CAPACITY: usize = 2;

/// Result of a toggle. Only `Added` and `Removed` change the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    Added,
    Removed,
    CapacityExceeded,
    Unavailable,
}

impl ToggleOutcome {
    pub const fn changed(self) -> bool {
        matches!(self, Self::Added | Self::Removed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("select at least one housekeeper before confirming")]
    Empty,
}

/// Ordered, duplicate-free, capacity-bounded list of chosen candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionSet {
    candidates: Vec<CandidateId>,
    #[serde(skip)]
    capacity: usize,
}

impl Default for SelectionSet {
    fn default() -> Self {
        Self::with_capacity(SELECTION_CAPACITY)
    }
}

impl SelectionSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            candidates: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn toggle(&mut self, record: &CandidateRecord) -> ToggleOutcome {
        if !record.is_available() {
            return ToggleOutcome::Unavailable;
        }

        if let Some(index) = self.candidates.iter().position(|id| *id == record.id) {
            self.candidates.remove(index);
            return ToggleOutcome::Removed;
        }

        if self.is_full() {
            return ToggleOutcome::CapacityExceeded;
        }

        self.candidates.push(record.id.clone());
        ToggleOutcome::Added
    }

    /// Identifiers ready for submission.
    pub fn confirm(&self) -> Result<Vec<CandidateId>, SelectionError> {
        if self.candidates.is_empty() {
            return Err(SelectionError::Empty);
        }
        Ok(self.candidates.clone())
    }

    /// Drop entries that are no longer listed or no longer available.
    pub fn retain_eligible(&mut self, directory: &[CandidateRecord]) {
        self.candidates.retain(|id| {
            directory
                .iter()
                .any(|record| record.id == *id && record.is_available())
        });
    }

    pub fn contains(&self, id: &CandidateId) -> bool {
        self.candidates.contains(id)
    }

    pub fn ids(&self) -> &[CandidateId] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.candidates.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
