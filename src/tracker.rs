use anyhow::{anyhow, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::ValidationError;
use crate::models::{
    ApplicationFilter, ApplicationPatch, JobApplication, JobStatus, NewApplication, Task,
};
use crate::store::ApplicationStore;

// --- Status aggregation ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub applied: usize,
    pub interview: usize,
    pub offered: usize,
    pub rejected: usize,
    pub accepted: usize,
}

impl StatusCounts {
    pub fn get(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Applied => self.applied,
            JobStatus::Interview => self.interview,
            JobStatus::Offered => self.offered,
            JobStatus::Rejected => self.rejected,
            JobStatus::Accepted => self.accepted,
        }
    }

    /// Offers shown on the dashboard include accepted ones.
    pub fn offers(&self) -> usize {
        self.offered + self.accepted
    }
}

pub fn aggregate(applications: &[JobApplication]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for app in applications {
        counts.total += 1;
        match app.status {
            JobStatus::Applied => counts.applied += 1,
            JobStatus::Interview => counts.interview += 1,
            JobStatus::Offered => counts.offered += 1,
            JobStatus::Rejected => counts.rejected += 1,
            JobStatus::Accepted => counts.accepted += 1,
        }
    }
    counts
}

// --- Mutation ---

/// Applies `patch` to the record with `id`. Returns its index, or `None` if
/// no record has that id (nothing is touched then).
pub fn apply_patch(
    applications: &mut [JobApplication],
    id: &str,
    patch: &ApplicationPatch,
) -> Option<usize> {
    let pos = applications.iter().position(|app| app.id == id)?;
    patch.apply(&mut applications[pos]);
    Some(pos)
}

/// Any status may follow any other; there is no transition graph.
pub fn set_status(
    mut applications: Vec<JobApplication>,
    id: &str,
    status: JobStatus,
) -> Vec<JobApplication> {
    apply_patch(&mut applications, id, &ApplicationPatch::status(status));
    applications
}

pub fn toggle_task(mut tasks: Vec<Task>, id: &str) -> Vec<Task> {
    if let Some(task) = tasks.iter_mut().find(|task| task.id == id) {
        task.completed = !task.completed;
    }
    tasks
}

/// Tasks ordered by due date, earliest first.
pub fn upcoming_tasks(tasks: &[Task]) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by_key(|task| task.due_date);
    sorted
}

// --- Sorting ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Company,
    Role,
    Applied,
    Status,
}

impl FromStr for SortField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "company" => Ok(SortField::Company),
            "role" => Ok(SortField::Role),
            "applied" | "date" | "applied-date" => Ok(SortField::Applied),
            "status" => Ok(SortField::Status),
            _ => Err(ValidationError::UnknownSortField(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            field: SortField::Applied,
            direction: SortDirection::Descending,
        }
    }
}

fn compare_by(field: SortField, a: &JobApplication, b: &JobApplication) -> Ordering {
    match field {
        SortField::Company => a.company.cmp(&b.company),
        SortField::Role => a.role.cmp(&b.role),
        SortField::Applied => a.applied_date.cmp(&b.applied_date),
        // Alphabetical on the label, not workflow order.
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
    }
}

/// Returns a sorted copy. The sort is stable, so ties keep their input order
/// in both directions.
pub fn sort_applications(applications: &[JobApplication], order: SortOrder) -> Vec<JobApplication> {
    let mut sorted = applications.to_vec();
    sorted.sort_by(|a, b| {
        let ord = compare_by(order.field, a, b);
        match order.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
    sorted
}

// --- Tracker ---

/// In-memory view of the user's applications. Mutations are applied locally
/// first and then forwarded to the store; a failed forward is reconciled by
/// re-reading the record from the store.
pub struct Tracker<'a> {
    store: &'a dyn ApplicationStore,
    filter: ApplicationFilter,
    applications: Vec<JobApplication>,
}

impl<'a> Tracker<'a> {
    pub fn load(store: &'a dyn ApplicationStore, filter: ApplicationFilter) -> Result<Self> {
        let applications = store.list_applications(&filter)?;
        debug!(count = applications.len(), "loaded applications");
        Ok(Self {
            store,
            filter,
            applications,
        })
    }

    pub fn applications(&self) -> &[JobApplication] {
        &self.applications
    }

    pub fn counts(&self) -> StatusCounts {
        aggregate(&self.applications)
    }

    pub fn sorted(&self, order: SortOrder) -> Vec<JobApplication> {
        sort_applications(&self.applications, order)
    }

    pub fn get(&self, id: &str) -> Option<&JobApplication> {
        self.applications.iter().find(|app| app.id == id)
    }

    /// Resolves a full id or a unique id prefix.
    pub fn resolve(&self, prefix: &str) -> Result<Option<&JobApplication>> {
        if let Some(app) = self.get(prefix) {
            return Ok(Some(app));
        }
        let mut matches = self.applications.iter().filter(|app| app.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(app), None) => Ok(Some(app)),
            (None, _) => Ok(None),
            (Some(_), Some(_)) => Err(anyhow!("Id prefix '{}' is ambiguous", prefix)),
        }
    }

    pub fn add(&mut self, new: &NewApplication) -> Result<JobApplication> {
        new.validate()?;
        let created = self.store.create_application(new)?;
        info!(id = %created.id, company = %created.company, "application created");
        if self.filter.matches(&created) {
            self.applications.push(created.clone());
        }
        Ok(created)
    }

    /// Returns `Ok(None)` when no application has `id`.
    pub fn change_status(&mut self, id: &str, status: JobStatus) -> Result<Option<JobApplication>> {
        if self.get(id).is_none() {
            debug!(id, "status change for unknown application ignored");
            return Ok(None);
        }
        self.applications = set_status(std::mem::take(&mut self.applications), id, status);
        self.forward(id, &ApplicationPatch::status(status))
    }

    pub fn edit(&mut self, id: &str, patch: &ApplicationPatch) -> Result<Option<JobApplication>> {
        if patch.is_empty() {
            return Err(ValidationError::EmptyPatch.into());
        }
        patch.validate()?;
        if apply_patch(&mut self.applications, id, patch).is_none() {
            debug!(id, "edit for unknown application ignored");
            return Ok(None);
        }
        self.forward(id, patch)
    }

    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let Some(pos) = self.applications.iter().position(|app| app.id == id) else {
            return Ok(false);
        };
        self.store.delete_application(id)?;
        self.applications.remove(pos);
        info!(id, "application deleted");
        Ok(true)
    }

    /// Sends a change already applied locally to the store.
    fn forward(&mut self, id: &str, patch: &ApplicationPatch) -> Result<Option<JobApplication>> {
        match self.store.update_application(id, patch) {
            Ok(stored) => {
                info!(id, status = %stored.status, "application updated");
                if let Some(local) = self.applications.iter_mut().find(|app| app.id == id) {
                    *local = stored.clone();
                }
                Ok(Some(stored))
            }
            Err(err) => {
                warn!(id, error = %err, "remote update failed, reconciling");
                self.reconcile(id);
                Err(err.context(format!("Failed to update application {}", id)))
            }
        }
    }

    fn reconcile(&mut self, id: &str) {
        let pos = self.applications.iter().position(|app| app.id == id);
        match (self.store.get_application(id), pos) {
            (Ok(Some(stored)), Some(pos)) => self.applications[pos] = stored,
            (Ok(None), Some(pos)) => {
                self.applications.remove(pos);
            }
            (Ok(_), None) => {}
            (Err(err), _) => {
                warn!(id, error = %err, "re-fetch failed, keeping local copy");
            }
        }
    }
}
