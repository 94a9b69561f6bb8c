//! Collaborator contracts the tracker talks to. `db::Workspace` implements the
//! record stores against SQLite, `storage::LocalBucket` implements files.

use anyhow::Result;
use chrono::NaiveDate;

use crate::models::{
    ApplicationFilter, ApplicationPatch, ContentFilter, ContentKind, FileRef, GeneratedContent,
    JobApplication, NewApplication, Task,
};

pub trait ApplicationStore {
    fn create_application(&self, new: &NewApplication) -> Result<JobApplication>;
    fn list_applications(&self, filter: &ApplicationFilter) -> Result<Vec<JobApplication>>;
    fn get_application(&self, id: &str) -> Result<Option<JobApplication>>;
    fn update_application(&self, id: &str, patch: &ApplicationPatch) -> Result<JobApplication>;
    fn delete_application(&self, id: &str) -> Result<()>;
}

/// Everything a content record needs besides the id and timestamp.
#[derive(Debug, Clone)]
pub struct NewContent<'a> {
    pub kind: ContentKind,
    pub job: Option<&'a JobApplication>,
    pub input: &'a str,
    pub body: &'a str,
}

pub trait ContentStore {
    fn create_content(&self, new: &NewContent<'_>) -> Result<GeneratedContent>;
    fn list_content(&self, filter: &ContentFilter) -> Result<Vec<GeneratedContent>>;
    fn get_content(&self, id: &str) -> Result<Option<GeneratedContent>>;
    fn delete_content(&self, id: &str) -> Result<()>;
}

pub trait TaskStore {
    fn create_task(&self, title: &str, due_date: NaiveDate, job_id: Option<&str>) -> Result<Task>;
    fn list_tasks(&self) -> Result<Vec<Task>>;
    fn set_task_completed(&self, id: &str, completed: bool) -> Result<()>;
    fn delete_task(&self, id: &str) -> Result<()>;
}

/// Raw file storage. Callers go through `storage::upload`, which validates
/// before anything reaches `put`.
pub trait FileStore {
    fn put(&self, name: &str, mime: &str, bytes: &[u8]) -> Result<FileRef>;
    fn list(&self) -> Result<Vec<FileRef>>;
    fn view_url(&self, id: &str) -> Result<String>;
    fn delete(&self, id: &str) -> Result<()>;
}
