//! Predicate application shared by the subject and peer paths.

use crate::models::{FilterCriteria, Intervention};
use chrono::NaiveDate;

/// Stateless view over a [`FilterCriteria`].
#[derive(Debug, Clone, Copy)]
pub struct FilterEngine<'a> {
    criteria: &'a FilterCriteria,
}

impl<'a> FilterEngine<'a> {
    pub fn new(criteria: &'a FilterCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        self.criteria
    }

    /// Org scope only applies when both sides define a code.
    pub fn matches_scope(&self, company_code: Option<&str>) -> bool {
        match (self.criteria.company_code.as_deref(), company_code) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }

    pub fn matches_program(&self, program_id: Option<&str>) -> bool {
        match self.criteria.program.as_deref() {
            None => true,
            Some(wanted) => program_id == Some(wanted),
        }
    }

    /// Case-insensitive substring match on consultant email or name.
    pub fn matches_consultant(&self, consultant_ref: Option<&str>) -> bool {
        match self.criteria.consultant.as_deref() {
            None => true,
            Some(needle) => consultant_ref
                .map(|c| c.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
        }
    }

    /// Undated records fall outside any active range.
    pub fn matches_date(&self, date: Option<NaiveDate>) -> bool {
        match &self.criteria.date_range {
            None => true,
            Some(range) => date.map(|d| range.contains(d)).unwrap_or(false),
        }
    }

    pub fn intervention(&self, intervention: &Intervention) -> bool {
        self.matches_scope(intervention.company_code.as_deref())
            && self.matches_program(intervention.program_id.as_deref())
            && self.matches_consultant(intervention.consultant_ref.as_deref())
            && self.matches_date(intervention.best_date())
    }

    pub fn retain_interventions(&self, interventions: Vec<Intervention>) -> Vec<Intervention> {
        interventions
            .into_iter()
            .filter(|i| self.intervention(i))
            .collect()
    }
}
