use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// --- Job applications ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Applied,
    Interview,
    Offered,
    Rejected,
    Accepted,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Applied,
        JobStatus::Interview,
        JobStatus::Offered,
        JobStatus::Rejected,
        JobStatus::Accepted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Applied => "applied",
            JobStatus::Interview => "interview",
            JobStatus::Offered => "offered",
            JobStatus::Rejected => "rejected",
            JobStatus::Accepted => "accepted",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Applied => "Applied",
            JobStatus::Interview => "Interview",
            JobStatus::Offered => "Offered",
            JobStatus::Rejected => "Rejected",
            JobStatus::Accepted => "Accepted",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == lower)
            .ok_or_else(|| ValidationError::UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: String,
    pub company: String,
    pub role: String,
    pub applied_date: NaiveDate,
    pub status: JobStatus,
    pub notes: Option<String>,
    pub resume_attached: bool,
}

/// Fields supplied by the user when logging a new application.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub company: String,
    pub role: String,
    pub applied_date: NaiveDate,
    pub status: JobStatus,
    pub notes: Option<String>,
    pub resume_attached: bool,
}

impl NewApplication {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.company.trim().is_empty() {
            return Err(ValidationError::MissingField("company"));
        }
        if self.role.trim().is_empty() {
            return Err(ValidationError::MissingField("role"));
        }
        Ok(())
    }
}

/// Partial update of an application. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationPatch {
    pub company: Option<String>,
    pub role: Option<String>,
    pub applied_date: Option<NaiveDate>,
    pub status: Option<JobStatus>,
    pub notes: Option<String>,
    pub resume_attached: Option<bool>,
}

impl ApplicationPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// A patch may not blank out a required field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.company.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ValidationError::MissingField("company"));
        }
        if self.role.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(ValidationError::MissingField("role"));
        }
        Ok(())
    }

    pub fn apply(&self, app: &mut JobApplication) {
        if let Some(company) = &self.company {
            app.company = company.clone();
        }
        if let Some(role) = &self.role {
            app.role = role.clone();
        }
        if let Some(date) = self.applied_date {
            app.applied_date = date;
        }
        if let Some(status) = self.status {
            app.status = status;
        }
        if let Some(notes) = &self.notes {
            app.notes = if notes.is_empty() { None } else { Some(notes.clone()) };
        }
        if let Some(attached) = self.resume_attached {
            app.resume_attached = attached;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub status: Option<JobStatus>,
    pub company: Option<String>, // case-insensitive substring
    /// Page size for listings. Leave unset wherever every record must be seen.
    pub limit: Option<usize>,
}

impl ApplicationFilter {
    pub fn matches(&self, app: &JobApplication) -> bool {
        if let Some(status) = self.status {
            if app.status != status {
                return false;
            }
        }
        if let Some(company) = &self.company {
            if !app.company.to_lowercase().contains(&company.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

// --- Generated content ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Resume,
    Email,
    Referral,
    Linkedin,
    Cover,
}

impl ContentKind {
    pub const ALL: [ContentKind; 5] = [
        ContentKind::Resume,
        ContentKind::Email,
        ContentKind::Referral,
        ContentKind::Linkedin,
        ContentKind::Cover,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Resume => "resume",
            ContentKind::Email => "email",
            ContentKind::Referral => "referral",
            ContentKind::Linkedin => "linkedin",
            ContentKind::Cover => "cover",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentKind::Resume => "Resume",
            ContentKind::Email => "Cold Email",
            ContentKind::Referral => "Referral Request",
            ContentKind::Linkedin => "LinkedIn Message",
            ContentKind::Cover => "Cover Letter",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ContentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| ValidationError::UnknownContentKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub id: String,
    pub kind: ContentKind,
    pub job_id: Option<String>,
    pub company: Option<String>, // denormalized at generation time
    pub role: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub input: String, // JSON sent to the generator
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub kind: Option<ContentKind>,
    pub job_id: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

// --- Tasks ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub due_date: NaiveDate,
    pub completed: bool,
    pub job_id: Option<String>,
}

// --- Accounts and files ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    pub name: String,
    pub mime: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> JobApplication {
        JobApplication {
            id: "1".to_string(),
            company: "TechCorp Inc.".to_string(),
            role: "Frontend Developer".to_string(),
            applied_date: NaiveDate::from_ymd_opt(2025, 4, 28).unwrap(),
            status: JobStatus::Interview,
            notes: Some("Technical interview scheduled".to_string()),
            resume_attached: true,
        }
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("Interview".parse::<JobStatus>().unwrap(), JobStatus::Interview);
        assert_eq!(" accepted ".parse::<JobStatus>().unwrap(), JobStatus::Accepted);
        assert!("closed".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_content_kind_labels() {
        assert_eq!(ContentKind::Email.label(), "Cold Email");
        assert_eq!("linkedin".parse::<ContentKind>().unwrap(), ContentKind::Linkedin);
        assert!("memo".parse::<ContentKind>().is_err());
    }

    #[test]
    fn test_patch_apply_only_touches_given_fields() {
        let mut app = sample();
        let patch = ApplicationPatch {
            role: Some("Staff Engineer".to_string()),
            notes: Some(String::new()),
            ..Default::default()
        };
        patch.apply(&mut app);

        assert_eq!(app.role, "Staff Engineer");
        assert_eq!(app.notes, None);
        assert_eq!(app.company, "TechCorp Inc.");
        assert_eq!(app.status, JobStatus::Interview);
        assert!(app.resume_attached);
    }

    #[test]
    fn test_filter_matches_company_substring() {
        let app = sample();
        let filter = ApplicationFilter {
            company: Some("techcorp".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&app));

        let filter = ApplicationFilter {
            status: Some(JobStatus::Applied),
            ..Default::default()
        };
        assert!(!filter.matches(&app));
    }

    #[test]
    fn test_new_application_requires_company_and_role() {
        let new = NewApplication {
            company: "  ".to_string(),
            role: "Engineer".to_string(),
            applied_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            status: JobStatus::Applied,
            notes: None,
            resume_attached: false,
        };
        assert!(matches!(new.validate(), Err(ValidationError::MissingField("company"))));
    }

    #[test]
    fn test_patch_rejects_blank_required_fields() {
        let patch = ApplicationPatch {
            company: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(patch.validate(), Err(ValidationError::MissingField("company")));

        let patch = ApplicationPatch {
            role: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(patch.validate(), Err(ValidationError::MissingField("role")));

        let patch = ApplicationPatch {
            company: Some("Acme".to_string()),
            notes: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(patch.validate(), Ok(()));
    }
}
