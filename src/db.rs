use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::{
    new_id, ApplicationFilter, ApplicationPatch, ContentFilter, ContentKind, GeneratedContent,
    JobApplication, JobStatus, NewApplication, Task, User,
};
use crate::store::{ApplicationStore, ContentStore, NewContent, TaskStore};

const DEFAULT_CONTENT_LIMIT: usize = 50;

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                current INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS applications (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                company TEXT NOT NULL,
                role TEXT NOT NULL,
                applied_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'applied' CHECK (status IN ('applied', 'interview', 'offered', 'rejected', 'accepted')),
                notes TEXT,
                resume_attached INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS generated_content (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                kind TEXT NOT NULL CHECK (kind IN ('resume', 'email', 'referral', 'linkedin', 'cover')),
                job_id TEXT REFERENCES applications(id) ON DELETE SET NULL,
                company TEXT,
                role TEXT,
                input TEXT NOT NULL,
                body TEXT NOT NULL,
                generated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                due_date TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                job_id TEXT REFERENCES applications(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_applications_owner ON applications(owner_id, status);
            CREATE INDEX IF NOT EXISTS idx_content_owner ON generated_content(owner_id, generated_at);
            CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks(owner_id, due_date);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='applications'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!(
                "Database not initialized. Run 'jobflow init' first."
            ));
        }
        Ok(())
    }

    /// Store handle scoped to one user's records.
    pub fn workspace(&self, user: &User) -> Workspace<'_> {
        Workspace {
            conn: &self.conn,
            owner_id: user.id.clone(),
        }
    }

    // --- Accounts and sessions ---

    pub fn insert_user(&self, user: &User, password_hash: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO users (id, name, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
                params![user.id, user.name, user.email, password_hash],
            )
            .context("Failed to create user")?;
        Ok(())
    }

    /// Returns the user and their stored password hash.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<(User, String)>> {
        let result = self.conn.query_row(
            "SELECT id, name, email, password_hash FROM users WHERE email = ?1",
            [email],
            |row| Ok((row_to_user(row)?, row.get::<_, String>(3)?)),
        );
        match result {
            Ok(found) => Ok(Some(found)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Starts a session for `user_id` and makes it the current one.
    pub fn start_session(&self, token: &str, user_id: &str) -> Result<()> {
        // The previous session stays current if the insert fails.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("UPDATE sessions SET current = 0 WHERE current = 1", [])?;
        tx.execute(
            "INSERT INTO sessions (token, user_id, current) VALUES (?1, ?2, 1)",
            params![token, user_id],
        )?;
        tx.commit().context("Error starting session")
    }

    pub fn current_session_user(&self) -> Result<Option<User>> {
        let result = self.conn.query_row(
            "SELECT u.id, u.name, u.email
             FROM sessions s
             JOIN users u ON s.user_id = u.id
             WHERE s.current = 1",
            [],
            row_to_user,
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns false when there was no current session.
    pub fn end_current_session(&self) -> Result<bool> {
        let removed = self.conn.execute("DELETE FROM sessions WHERE current = 1", [])?;
        Ok(removed > 0)
    }
}

/// `LIKE` pattern for a literal, case-insensitive substring match.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::from("%");
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
    })
}

// --- Enum columns ---

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for ContentKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for ContentKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

// --- Per-user workspace ---

#[derive(Debug, Clone, Copy)]
pub enum Table {
    Applications,
    Content,
    Tasks,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Applications => "applications",
            Table::Content => "generated_content",
            Table::Tasks => "tasks",
        }
    }
}

pub struct Workspace<'a> {
    conn: &'a Connection,
    owner_id: String,
}

impl Workspace<'_> {
    /// Resolves a full id or a unique prefix within this user's rows.
    pub fn resolve_id(&self, table: Table, prefix: &str) -> Result<String> {
        let sql = format!(
            "SELECT id FROM {} WHERE owner_id = ?1 AND substr(id, 1, length(?2)) = ?2 LIMIT 2",
            table.name()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params![self.owner_id, prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        match ids.as_slice() {
            [id] => Ok(id.clone()),
            [] => Err(anyhow!("No {} entry matches '{}'", table.name(), prefix)),
            _ if ids.iter().any(|id| id == prefix) => Ok(prefix.to_string()),
            _ => Err(anyhow!("Id prefix '{}' is ambiguous", prefix)),
        }
    }

    fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<JobApplication> {
        Ok(JobApplication {
            id: row.get(0)?,
            company: row.get(1)?,
            role: row.get(2)?,
            applied_date: row.get(3)?,
            status: row.get(4)?,
            notes: row.get(5)?,
            resume_attached: row.get(6)?,
        })
    }

    fn row_to_content(row: &rusqlite::Row) -> rusqlite::Result<GeneratedContent> {
        Ok(GeneratedContent {
            id: row.get(0)?,
            kind: row.get(1)?,
            job_id: row.get(2)?,
            company: row.get(3)?,
            role: row.get(4)?,
            input: row.get(5)?,
            body: row.get(6)?,
            generated_at: row.get(7)?,
        })
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            due_date: row.get(2)?,
            completed: row.get(3)?,
            job_id: row.get(4)?,
        })
    }
}

impl ApplicationStore for Workspace<'_> {
    fn create_application(&self, new: &NewApplication) -> Result<JobApplication> {
        let app = JobApplication {
            id: new_id(),
            company: new.company.trim().to_string(),
            role: new.role.trim().to_string(),
            applied_date: new.applied_date,
            status: new.status,
            notes: new.notes.clone().filter(|n| !n.is_empty()),
            resume_attached: new.resume_attached,
        };
        self.conn
            .execute(
                "INSERT INTO applications (id, owner_id, company, role, applied_date, status, notes, resume_attached)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    app.id,
                    self.owner_id,
                    app.company,
                    app.role,
                    app.applied_date,
                    app.status,
                    app.notes,
                    app.resume_attached
                ],
            )
            .context("Error creating job application")?;
        Ok(app)
    }

    fn list_applications(&self, filter: &ApplicationFilter) -> Result<Vec<JobApplication>> {
        let mut sql = String::from(
            "SELECT id, company, role, applied_date, status, notes, resume_attached
             FROM applications
             WHERE owner_id = ?1",
        );
        let mut params: Vec<String> = vec![self.owner_id.clone()];

        if let Some(status) = filter.status {
            params.push(status.as_str().to_string());
            sql.push_str(&format!(" AND status = ?{}", params.len()));
        }

        if let Some(company) = &filter.company {
            params.push(contains_pattern(company));
            sql.push_str(&format!(" AND LOWER(company) LIKE ?{} ESCAPE '\\'", params.len()));
        }

        sql.push_str(" ORDER BY applied_date DESC, created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), Self::row_to_application)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Error listing job applications")
    }

    fn get_application(&self, id: &str) -> Result<Option<JobApplication>> {
        let result = self.conn.query_row(
            "SELECT id, company, role, applied_date, status, notes, resume_attached
             FROM applications WHERE owner_id = ?1 AND id = ?2",
            params![self.owner_id, id],
            Self::row_to_application,
        );
        match result {
            Ok(app) => Ok(Some(app)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Error getting job application {}", id)),
        }
    }

    fn update_application(&self, id: &str, patch: &ApplicationPatch) -> Result<JobApplication> {
        let mut app = self
            .get_application(id)?
            .ok_or_else(|| anyhow!("Job application {} not found", id))?;
        patch.apply(&mut app);

        self.conn
            .execute(
                "UPDATE applications
                 SET company = ?1, role = ?2, applied_date = ?3, status = ?4, notes = ?5,
                     resume_attached = ?6, updated_at = datetime('now')
                 WHERE owner_id = ?7 AND id = ?8",
                params![
                    app.company,
                    app.role,
                    app.applied_date,
                    app.status,
                    app.notes,
                    app.resume_attached,
                    self.owner_id,
                    id
                ],
            )
            .with_context(|| format!("Error updating job application {}", id))?;
        debug!(id, "application row updated");
        Ok(app)
    }

    fn delete_application(&self, id: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM applications WHERE owner_id = ?1 AND id = ?2",
                params![self.owner_id, id],
            )
            .with_context(|| format!("Error deleting job application {}", id))?;
        Ok(())
    }
}

impl ContentStore for Workspace<'_> {
    fn create_content(&self, new: &NewContent<'_>) -> Result<GeneratedContent> {
        let content = GeneratedContent {
            id: new_id(),
            kind: new.kind,
            job_id: new.job.map(|job| job.id.clone()),
            company: new.job.map(|job| job.company.clone()),
            role: new.job.map(|job| job.role.clone()),
            generated_at: Utc::now(),
            input: new.input.to_string(),
            body: new.body.to_string(),
        };
        self.conn
            .execute(
                "INSERT INTO generated_content (id, owner_id, kind, job_id, company, role, input, body, generated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    content.id,
                    self.owner_id,
                    content.kind,
                    content.job_id,
                    content.company,
                    content.role,
                    content.input,
                    content.body,
                    content.generated_at
                ],
            )
            .context("Error creating generated content")?;
        Ok(content)
    }

    fn list_content(&self, filter: &ContentFilter) -> Result<Vec<GeneratedContent>> {
        let mut sql = String::from(
            "SELECT id, kind, job_id, company, role, input, body, generated_at
             FROM generated_content
             WHERE owner_id = ?1",
        );
        let mut params: Vec<String> = vec![self.owner_id.clone()];

        if let Some(kind) = filter.kind {
            params.push(kind.as_str().to_string());
            sql.push_str(&format!(" AND kind = ?{}", params.len()));
        }

        if let Some(job_id) = &filter.job_id {
            params.push(job_id.clone());
            sql.push_str(&format!(" AND job_id = ?{}", params.len()));
        }

        if let Some(term) = &filter.search {
            params.push(contains_pattern(term));
            sql.push_str(&format!(
                " AND LOWER(COALESCE(company, '') || ' ' || COALESCE(role, '') || ' ' || body) LIKE ?{} ESCAPE '\\'",
                params.len()
            ));
        }

        sql.push_str(&format!(
            " ORDER BY generated_at DESC, rowid DESC LIMIT {}",
            filter.limit.unwrap_or(DEFAULT_CONTENT_LIMIT)
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), Self::row_to_content)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Error listing generated content")
    }

    fn get_content(&self, id: &str) -> Result<Option<GeneratedContent>> {
        let result = self.conn.query_row(
            "SELECT id, kind, job_id, company, role, input, body, generated_at
             FROM generated_content WHERE owner_id = ?1 AND id = ?2",
            params![self.owner_id, id],
            Self::row_to_content,
        );
        match result {
            Ok(content) => Ok(Some(content)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Error getting generated content {}", id)),
        }
    }

    fn delete_content(&self, id: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM generated_content WHERE owner_id = ?1 AND id = ?2",
                params![self.owner_id, id],
            )
            .with_context(|| format!("Error deleting generated content {}", id))?;
        Ok(())
    }
}

impl TaskStore for Workspace<'_> {
    fn create_task(&self, title: &str, due_date: NaiveDate, job_id: Option<&str>) -> Result<Task> {
        let task = Task {
            id: new_id(),
            title: title.trim().to_string(),
            due_date,
            completed: false,
            job_id: job_id.map(str::to_string),
        };
        self.conn
            .execute(
                "INSERT INTO tasks (id, owner_id, title, due_date, job_id) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![task.id, self.owner_id, task.title, task.due_date, task.job_id],
            )
            .context("Error creating task")?;
        Ok(task)
    }

    fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, due_date, completed, job_id
             FROM tasks WHERE owner_id = ?1 ORDER BY due_date",
        )?;
        let rows = stmt.query_map([&self.owner_id], Self::row_to_task)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Error listing tasks")
    }

    fn set_task_completed(&self, id: &str, completed: bool) -> Result<()> {
        self.conn
            .execute(
                "UPDATE tasks SET completed = ?1 WHERE owner_id = ?2 AND id = ?3",
                params![completed, self.owner_id, id],
            )
            .with_context(|| format!("Error updating task {}", id))?;
        Ok(())
    }

    fn delete_task(&self, id: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM tasks WHERE owner_id = ?1 AND id = ?2",
                params![self.owner_id, id],
            )
            .with_context(|| format!("Error deleting task {}", id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Tracker;

    fn user(db: &Database, name: &str) -> User {
        let user = User {
            id: new_id(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
        };
        db.insert_user(&user, "hash").unwrap();
        user
    }

    fn new_app(company: &str, date: (i32, u32, u32), status: JobStatus) -> NewApplication {
        NewApplication {
            company: company.to_string(),
            role: "Software Engineer".to_string(),
            applied_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            status,
            notes: None,
            resume_attached: false,
        }
    }

    #[test]
    fn test_ensure_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("jobflow.db")).unwrap();
        assert!(db.ensure_initialized().is_err());
        db.init().unwrap();
        db.init().unwrap();
        assert!(db.ensure_initialized().is_ok());
    }

    #[test]
    fn test_application_crud() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "Alice");
        let ws = db.workspace(&alice);

        let created = ws
            .create_application(&new_app("TechCorp Inc.", (2025, 4, 28), JobStatus::Applied))
            .unwrap();
        let fetched = ws.get_application(&created.id).unwrap().unwrap();
        assert_eq!(created, fetched);

        let updated = ws
            .update_application(&created.id, &ApplicationPatch::status(JobStatus::Offered))
            .unwrap();
        assert_eq!(updated.status, JobStatus::Offered);
        assert_eq!(updated.company, "TechCorp Inc.");
        assert_eq!(
            ws.get_application(&created.id).unwrap().unwrap().status,
            JobStatus::Offered
        );

        ws.delete_application(&created.id).unwrap();
        assert!(ws.get_application(&created.id).unwrap().is_none());
        assert!(ws
            .update_application(&created.id, &ApplicationPatch::status(JobStatus::Applied))
            .is_err());
    }

    #[test]
    fn test_list_applications_filters_and_orders() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "Alice");
        let ws = db.workspace(&alice);
        ws.create_application(&new_app("Data Systems", (2025, 4, 25), JobStatus::Applied)).unwrap();
        ws.create_application(&new_app("Web Solutions", (2025, 5, 1), JobStatus::Applied)).unwrap();
        ws.create_application(&new_app("CloudScale", (2025, 4, 10), JobStatus::Accepted)).unwrap();

        let all = ws.list_applications(&ApplicationFilter::default()).unwrap();
        let companies: Vec<_> = all.iter().map(|a| a.company.as_str()).collect();
        assert_eq!(companies, vec!["Web Solutions", "Data Systems", "CloudScale"]);

        let applied = ws
            .list_applications(&ApplicationFilter {
                status: Some(JobStatus::Applied),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(applied.len(), 2);

        let cloud = ws
            .list_applications(&ApplicationFilter {
                company: Some("CLOUD".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cloud.len(), 1);
        assert_eq!(cloud[0].status, JobStatus::Accepted);
    }

    #[test]
    fn test_records_are_scoped_to_owner() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "Alice");
        let bob = user(&db, "Bob");

        let app = db
            .workspace(&alice)
            .create_application(&new_app("Acme", (2025, 5, 1), JobStatus::Applied))
            .unwrap();

        let bob_ws = db.workspace(&bob);
        assert!(bob_ws.list_applications(&ApplicationFilter::default()).unwrap().is_empty());
        assert!(bob_ws.get_application(&app.id).unwrap().is_none());
        bob_ws.delete_application(&app.id).unwrap();
        assert!(db.workspace(&alice).get_application(&app.id).unwrap().is_some());
    }

    #[test]
    fn test_content_create_list_search() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "Alice");
        let ws = db.workspace(&alice);
        let job = ws
            .create_application(&new_app("Data Systems", (2025, 4, 25), JobStatus::Applied))
            .unwrap();

        let cover = ws
            .create_content(&NewContent {
                kind: ContentKind::Cover,
                job: Some(&job),
                input: "{}",
                body: "Dear Hiring Manager, distributed systems",
            })
            .unwrap();
        assert_eq!(cover.company.as_deref(), Some("Data Systems"));

        ws.create_content(&NewContent {
            kind: ContentKind::Email,
            job: None,
            input: "{}",
            body: "Hello there",
        })
        .unwrap();

        let all = ws.list_content(&ContentFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].id, cover.id);

        let covers = ws
            .list_content(&ContentFilter {
                kind: Some(ContentKind::Cover),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(covers.len(), 1);

        let found = ws
            .list_content(&ContentFilter {
                search: Some("data sys".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, cover.id);

        let fetched = ws.get_content(&cover.id).unwrap().unwrap();
        assert_eq!(fetched.body, cover.body);

        ws.delete_content(&cover.id).unwrap();
        assert!(ws.get_content(&cover.id).unwrap().is_none());
    }

    #[test]
    fn test_tasks() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "Alice");
        let ws = db.workspace(&alice);

        let later = ws
            .create_task("Prepare for interview", NaiveDate::from_ymd_opt(2025, 5, 10).unwrap(), None)
            .unwrap();
        let sooner = ws
            .create_task("Follow up", NaiveDate::from_ymd_opt(2025, 5, 4).unwrap(), None)
            .unwrap();

        let tasks = ws.list_tasks().unwrap();
        assert_eq!(tasks[0].id, sooner.id);

        ws.set_task_completed(&later.id, true).unwrap();
        let tasks = ws.list_tasks().unwrap();
        assert!(tasks[1].completed);

        ws.delete_task(&sooner.id).unwrap();
        assert_eq!(ws.list_tasks().unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_id_prefix() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "Alice");
        let ws = db.workspace(&alice);
        let app = ws
            .create_application(&new_app("Acme", (2025, 5, 1), JobStatus::Applied))
            .unwrap();

        assert_eq!(ws.resolve_id(Table::Applications, &app.id[..8]).unwrap(), app.id);
        assert_eq!(ws.resolve_id(Table::Applications, &app.id).unwrap(), app.id);
        assert!(ws.resolve_id(Table::Tasks, &app.id[..8]).is_err());
    }

    #[test]
    fn test_sessions() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "Alice");
        let bob = user(&db, "Bob");

        assert!(db.current_session_user().unwrap().is_none());
        db.start_session("t1", &alice.id).unwrap();
        db.start_session("t2", &bob.id).unwrap();
        assert_eq!(db.current_session_user().unwrap().unwrap(), bob);

        assert!(db.end_current_session().unwrap());
        assert!(db.current_session_user().unwrap().is_none());
        assert!(!db.end_current_session().unwrap());

        let (found, hash) = db.find_user_by_email("ALICE@example.com").unwrap().unwrap();
        assert_eq!(found, alice);
        assert_eq!(hash, "hash");
    }

    #[test]
    fn test_failed_session_start_keeps_current() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "Alice");
        let bob = user(&db, "Bob");

        db.start_session("t1", &alice.id).unwrap();
        // token collision makes the insert fail
        assert!(db.start_session("t1", &bob.id).is_err());
        assert_eq!(db.current_session_user().unwrap().unwrap(), alice);
    }

    #[test]
    fn test_tracker_sees_more_than_a_page() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "Alice");
        let ws = db.workspace(&alice);
        let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut ids = Vec::new();
        for day in 0..101u64 {
            let app = ws
                .create_application(&NewApplication {
                    applied_date: first + chrono::Days::new(day),
                    ..new_app(&format!("Company {}", day), (2024, 1, 1), JobStatus::Applied)
                })
                .unwrap();
            ids.push(app.id);
        }

        let mut tracker = Tracker::load(&ws, ApplicationFilter::default()).unwrap();
        assert_eq!(tracker.counts().total, 101);

        let oldest = &ids[0];
        let updated = tracker.change_status(oldest, JobStatus::Offered).unwrap().unwrap();
        assert_eq!(updated.status, JobStatus::Offered);
        assert_eq!(ws.get_application(oldest).unwrap().unwrap().status, JobStatus::Offered);
        assert_eq!(tracker.counts().offered, 1);

        let page = ws
            .list_applications(&ApplicationFilter {
                limit: Some(10),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.len(), 10);
        assert_eq!(page[0].company, "Company 100");
    }

    #[test]
    fn test_like_wildcards_match_literally() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "Alice");
        let ws = db.workspace(&alice);
        ws.create_application(&new_app("Acme", (2025, 5, 1), JobStatus::Applied)).unwrap();
        ws.create_application(&new_app("Under_Score Labs", (2025, 5, 2), JobStatus::Applied))
            .unwrap();

        let found = ws
            .list_applications(&ApplicationFilter {
                company: Some("_".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].company, "Under_Score Labs");

        ws.create_content(&NewContent {
            kind: ContentKind::Email,
            job: None,
            input: "{}",
            body: "Raised conversion by 40%",
        })
        .unwrap();
        ws.create_content(&NewContent {
            kind: ContentKind::Email,
            job: None,
            input: "{}",
            body: "Hello there",
        })
        .unwrap();
        let found = ws
            .list_content(&ContentFilter {
                search: Some("%".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].body.contains("40%"));
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }
}
