// src/models.rs
//! Core entities persisted in the local store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Contact fields extracted from a resume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub title: String,
    pub organization: Option<String>,
    pub dates: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationEntry {
    pub degree: String,
    pub description: String,
}

/// A parsed resume. Immutable once stored; a re-upload inserts a new row and
/// deactivates the old one.
#[derive(Debug, Clone)]
pub struct ResumeRecord {
    pub id: i64,
    pub filename: String,
    pub file_path: PathBuf,
    pub contact: ContactInfo,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub summary: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub is_active: bool,
}

/// A posting as it comes off a job source, before it has an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub salary: Option<String>,
    pub url: String,
    pub source: String,
}

/// A stored posting. Identified by a content hash over the normalized
/// (title, company, location) triple; never mutated after insertion.
#[derive(Debug, Clone)]
pub struct JobPosting {
    pub id: i64,
    pub fingerprint: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub salary: Option<String>,
    pub url: String,
    pub source: String,
    pub discovered_at: DateTime<Utc>,
}

/// AI compatibility assessment for one (resume, posting) pair.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub id: i64,
    pub posting_id: i64,
    pub resume_id: i64,
    pub score: i64,
    pub reasons: Vec<String>,
    pub skill_gaps: Vec<String>,
    pub recommend: bool,
    pub cover_letter_hint: String,
    pub created_at: DateTime<Utc>,
}

/// An analysis before it has been stored.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub score: i64,
    pub reasons: Vec<String>,
    pub skill_gaps: Vec<String>,
    pub recommend: bool,
    pub cover_letter_hint: String,
}

impl AnalysisOutcome {
    /// Documented default when the external reply cannot be used.
    pub fn fallback(detail: &str) -> Self {
        Self {
            score: 0,
            reasons: vec![format!("Analysis unavailable: {}", detail)],
            skill_gaps: Vec::new(),
            recommend: false,
            cover_letter_hint: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    PendingReview,
    Approved,
    Submitted,
    Failed,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::Approved => "approved",
            Self::Submitted => "submitted",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_review" => Some(Self::PendingReview),
            "approved" => Some(Self::Approved),
            "submitted" => Some(Self::Submitted),
            "failed" => Some(Self::Failed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Submitted, rejected and failed applications never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Submitted | Self::Rejected | Self::Failed)
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tracked intent/outcome of applying to a posting.
#[derive(Debug, Clone)]
pub struct Application {
    pub id: i64,
    pub posting_id: i64,
    pub analysis_id: i64,
    pub status: ApplicationStatus,
    pub cover_letter: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One scrape invocation, opened at start and closed at completion.
#[derive(Debug, Clone)]
pub struct SearchSession {
    pub id: i64,
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    pub max_postings: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub postings_found: i64,
    pub postings_new: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ApplicationStatus::PendingReview,
            ApplicationStatus::Approved,
            ApplicationStatus::Submitted,
            ApplicationStatus::Failed,
            ApplicationStatus::Rejected,
        ] {
            assert_eq!(ApplicationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ApplicationStatus::parse("interview"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ApplicationStatus::Submitted.is_terminal());
        assert!(ApplicationStatus::Rejected.is_terminal());
        assert!(ApplicationStatus::Failed.is_terminal());
        assert!(!ApplicationStatus::PendingReview.is_terminal());
        assert!(!ApplicationStatus::Approved.is_terminal());
    }

    #[test]
    fn test_fallback_outcome_shape() {
        let outcome = AnalysisOutcome::fallback("reply was not valid JSON");
        assert_eq!(outcome.score, 0);
        assert!(!outcome.recommend);
        assert!(outcome.reasons[0].contains("reply was not valid JSON"));
    }
}
