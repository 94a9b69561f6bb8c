mod auth;
mod config;
mod db;
mod error;
mod generate;
mod history;
mod models;
mod storage;
mod store;
mod telemetry;
mod tracker;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use auth::SessionProvider;
use config::Config;
use db::{Database, Table, Workspace};
use error::ValidationError;
use generate::{create_provider, resolve_model, ContentGenerator, GenerationInput};
use models::{
    ApplicationFilter, ApplicationPatch, ContentFilter, ContentKind, JobApplication, JobStatus,
    NewApplication, User,
};
use storage::LocalBucket;
use store::{ContentStore, FileStore, TaskStore};
use tracker::{SortDirection, SortField, SortOrder, Tracker};

#[derive(Parser)]
#[command(name = "jobflow")]
#[command(about = "Track job applications and generate application content")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Create an account and sign in
    Signup {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password (prompted on stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign in
    Login {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (prompted on stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign out
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Log a job application
    Add {
        /// Company name
        company: String,

        /// Role title
        role: String,

        /// Applied date (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<String>,

        /// Status (applied, interview, offered, rejected, accepted)
        #[arg(short, long, default_value = "applied")]
        status: String,

        /// Free-text notes
        #[arg(short, long)]
        notes: Option<String>,

        /// A resume was attached to the application
        #[arg(long)]
        resume: bool,
    },

    /// List applications
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by company (substring)
        #[arg(short, long)]
        company: Option<String>,

        /// Sort field (company, role, applied, status)
        #[arg(long)]
        sort: Option<String>,

        /// Sort ascending
        #[arg(long, conflicts_with = "desc")]
        asc: bool,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Show at most this many (most recent first)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show application details
    Show {
        /// Application id (or unique prefix)
        id: String,
    },

    /// Change an application's status
    Status {
        /// Application id (or unique prefix)
        id: String,

        /// New status (applied, interview, offered, rejected, accepted)
        status: String,
    },

    /// Edit application fields
    Edit {
        /// Application id (or unique prefix)
        id: String,

        #[arg(long)]
        company: Option<String>,

        #[arg(long)]
        role: Option<String>,

        /// Applied date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// Notes (empty string clears them)
        #[arg(long)]
        notes: Option<String>,

        /// Resume attached (true/false)
        #[arg(long)]
        resume: Option<bool>,
    },

    /// Delete an application
    Delete {
        /// Application id (or unique prefix)
        id: String,
    },

    /// Show status counts
    Stats,

    /// Summary, recent applications and upcoming tasks
    Dashboard,

    /// Generate content for an application
    Generate {
        /// Content type (resume, email, referral, linkedin, cover)
        kind: String,

        /// Related application id (or unique prefix)
        #[arg(short, long)]
        job: Option<String>,

        /// Job description text
        #[arg(short, long, conflicts_with = "description_file")]
        description: Option<String>,

        /// Read the job description from a file
        #[arg(long)]
        description_file: Option<PathBuf>,

        /// Strengths or achievements to highlight
        #[arg(long)]
        highlights: Option<String>,

        /// Plain-text resume to draw facts from
        #[arg(long)]
        resume_file: Option<PathBuf>,

        /// Model to use (default from JOBFLOW_MODEL)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Browse generated content
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    /// Manage uploaded resume files
    Resume {
        #[command(subcommand)]
        command: ResumeCommands,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List generated content, newest first
    List {
        /// Filter by content type
        #[arg(short, long)]
        kind: Option<String>,

        /// Search company, role and text
        #[arg(short, long)]
        search: Option<String>,

        /// Only content for this application
        #[arg(short, long)]
        job: Option<String>,

        /// Maximum entries
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Show a generated document
    Show {
        /// Content id (or unique prefix)
        id: String,
    },

    /// Delete a generated document
    Delete {
        /// Content id (or unique prefix)
        id: String,
    },

    /// Write a generated document to a text file
    Export {
        /// Content id (or unique prefix)
        id: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Count generated content by type
    Stats,
}

#[derive(Subcommand)]
enum ResumeCommands {
    /// Upload a resume (PDF or DOCX, max 5 MB)
    Upload {
        /// Path to the file
        file: PathBuf,
    },

    /// List uploaded resumes
    List,

    /// Print a URL for viewing a resume
    Url {
        /// File id (or unique prefix)
        id: String,
    },

    /// Delete an uploaded resume
    Delete {
        /// File id (or unique prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a task
    Add {
        /// Task title
        title: String,

        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: String,

        /// Related application id (or unique prefix)
        #[arg(short, long)]
        job: Option<String>,
    },

    /// List tasks by due date
    List {
        /// Include completed tasks
        #[arg(short, long)]
        all: bool,
    },

    /// Toggle a task's completion
    Done {
        /// Task id (or unique prefix)
        id: String,
    },

    /// Delete a task
    Delete {
        /// Task id (or unique prefix)
        id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    telemetry::init(&config.log_level)?;

    let db = Database::open(&config.db_path)?;
    if let Commands::Init = cli.command {
        db.init()?;
        println!("Database initialized at {}", db.path().display());
        return Ok(());
    }
    db.ensure_initialized()?;

    let session = SessionProvider::new(&db);

    match cli.command {
        Commands::Init => unreachable!("handled above"),

        Commands::Signup {
            email,
            name,
            password,
        } => {
            let password = password.map_or_else(read_password, Ok)?;
            let user = session.create_account(&email, &password, &name)?;
            println!("Account created. Signed in as {} <{}>.", user.name, user.email);
        }

        Commands::Login { email, password } => {
            let password = password.map_or_else(read_password, Ok)?;
            let user = session.login(&email, &password)?;
            println!("Signed in as {} <{}>.", user.name, user.email);
        }

        Commands::Logout => {
            session.logout()?;
            println!("Signed out.");
        }

        Commands::Whoami => match session.current_user() {
            Some(user) => println!("{} <{}>", user.name, user.email),
            None => println!("Not logged in."),
        },

        command => {
            let user = session.require_user()?;
            let ws = db.workspace(&user);
            run_user_command(command, &config, &user, &ws)?;
        }
    }

    Ok(())
}

fn run_user_command(command: Commands, config: &Config, user: &User, ws: &Workspace) -> Result<()> {
    match command {
        Commands::Add {
            company,
            role,
            date,
            status,
            notes,
            resume,
        } => {
            let new = NewApplication {
                company,
                role,
                applied_date: match date {
                    Some(d) => parse_date(&d)?,
                    None => Local::now().date_naive(),
                },
                status: status.parse()?,
                notes,
                resume_attached: resume,
            };
            let mut tracker = Tracker::load(ws, ApplicationFilter::default())?;
            let app = tracker.add(&new)?;
            println!("Added application {} ({} - {})", short(&app.id), app.company, app.role);
        }

        Commands::List {
            status,
            company,
            sort,
            asc,
            desc,
            limit,
        } => {
            let filter = ApplicationFilter {
                status: status.as_deref().map(str::parse).transpose()?,
                company,
                limit,
            };
            let order = sort_order(sort.as_deref(), asc, desc)?;
            let tracker = Tracker::load(ws, filter)?;
            let apps = tracker.sorted(order);
            if apps.is_empty() {
                println!("No applications found.");
            } else {
                print_applications(&apps);
            }
        }

        Commands::Show { id } => {
            let tracker = Tracker::load(ws, ApplicationFilter::default())?;
            match tracker.resolve(&id)? {
                Some(app) => print_application(app, ws)?,
                None => println!("Application '{}' not found.", id),
            }
        }

        Commands::Status { id, status } => {
            let status: JobStatus = status.parse()?;
            let mut tracker = Tracker::load(ws, ApplicationFilter::default())?;
            let full_id = tracker.resolve(&id)?.map(|app| app.id.clone()).unwrap_or(id);
            match tracker.change_status(&full_id, status)? {
                Some(app) => println!(
                    "Status of {} ({}) updated to {}.",
                    short(&app.id),
                    app.company,
                    app.status.label()
                ),
                None => println!("No application matches '{}'. Nothing changed.", full_id),
            }
        }

        Commands::Edit {
            id,
            company,
            role,
            date,
            notes,
            resume,
        } => {
            let patch = ApplicationPatch {
                company,
                role,
                applied_date: date.as_deref().map(parse_date).transpose()?,
                status: None,
                notes,
                resume_attached: resume,
            };
            let mut tracker = Tracker::load(ws, ApplicationFilter::default())?;
            let full_id = tracker.resolve(&id)?.map(|app| app.id.clone()).unwrap_or(id);
            match tracker.edit(&full_id, &patch)? {
                Some(app) => println!("Updated application {} ({}).", short(&app.id), app.company),
                None => println!("No application matches '{}'. Nothing changed.", full_id),
            }
        }

        Commands::Delete { id } => {
            let mut tracker = Tracker::load(ws, ApplicationFilter::default())?;
            let Some(full_id) = tracker.resolve(&id)?.map(|app| app.id.clone()) else {
                println!("Application '{}' not found.", id);
                return Ok(());
            };
            tracker.remove(&full_id)?;
            println!("Deleted application {}.", short(&full_id));
        }

        Commands::Stats => {
            let tracker = Tracker::load(ws, ApplicationFilter::default())?;
            let counts = tracker.counts();
            println!("{:<12} {:>6}", "STATUS", "COUNT");
            println!("{}", "-".repeat(19));
            for status in JobStatus::ALL {
                println!("{:<12} {:>6}", status.label(), counts.get(status));
            }
            println!("{}", "-".repeat(19));
            println!("{:<12} {:>6}", "Total", counts.total);
        }

        Commands::Dashboard => {
            let tracker = Tracker::load(ws, ApplicationFilter::default())?;
            let counts = tracker.counts();
            println!("Welcome back, {}.\n", user.name);
            println!("  Total applications: {}", counts.total);
            println!("  Interview stage:    {}", counts.interview);
            println!("  Offers:             {}", counts.offers());
            println!("  Rejections:         {}", counts.rejected);

            if !tracker.applications().is_empty() {
                let recent = tracker.sorted(SortOrder::default());
                println!("\nRecent applications:");
                for app in recent.iter().take(3) {
                    println!(
                        "  {:<24} {:<24} {}",
                        truncate(&app.company, 22),
                        truncate(&app.role, 22),
                        app.status.label()
                    );
                }
            }

            let tasks: Vec<_> = tracker::upcoming_tasks(&ws.list_tasks()?)
                .into_iter()
                .filter(|task| !task.completed)
                .collect();
            println!("\nUpcoming tasks:");
            if tasks.is_empty() {
                println!("  No upcoming tasks.");
            }
            for task in tasks {
                println!("  {:<8} {}", task.due_date.format("%b %-d"), task.title);
            }
        }

        Commands::Generate {
            kind,
            job,
            description,
            description_file,
            highlights,
            resume_file,
            model,
        } => {
            let kind: ContentKind = kind.parse()?;
            let job = match job {
                Some(id) => Some(find_application(ws, &id)?),
                None => None,
            };
            let job_description = match (description, description_file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => String::new(),
            };
            let resume = resume_file
                .map(|path| {
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read resume file: {}", path.display()))
                })
                .transpose()?;
            let input = GenerationInput {
                job,
                job_description,
                highlights,
                resume,
            };
            input.validate()?;

            let spec = resolve_model(model.as_deref().unwrap_or(&config.model))?;
            let provider = create_provider(&spec)?;
            println!("Generating {} with {}...", kind.label().to_lowercase(), spec.short_name);
            let content = ContentGenerator::new(provider.as_ref(), ws).generate(kind, &input)?;
            println!("Saved as {}.\n", short(&content.id));
            println!("{}", content.body);
        }

        Commands::History { command } => run_history_command(command, ws)?,

        Commands::Resume { command } => {
            let bucket = LocalBucket::new(&config.files_dir, &user.id)?;
            match command {
                ResumeCommands::Upload { file } => {
                    let uploaded = storage::upload(&bucket, &file)?;
                    println!(
                        "Uploaded {} ({}, {}) as {}.",
                        uploaded.name,
                        uploaded.mime,
                        format_size(uploaded.size),
                        short(&uploaded.id)
                    );
                }

                ResumeCommands::List => {
                    let files = bucket.list()?;
                    if files.is_empty() {
                        println!("No resumes uploaded.");
                    } else {
                        println!("{:<10} {:<36} {:>10} {:<14}", "ID", "NAME", "SIZE", "UPLOADED");
                        println!("{}", "-".repeat(73));
                        for file in files {
                            println!(
                                "{:<10} {:<36} {:>10} {:<14}",
                                short(&file.id),
                                truncate(&file.name, 34),
                                format_size(file.size),
                                format_date(file.uploaded_at.date_naive())
                            );
                        }
                    }
                }

                ResumeCommands::Url { id } => {
                    let id = bucket.resolve_id(&id)?;
                    println!("{}", bucket.view_url(&id)?);
                }

                ResumeCommands::Delete { id } => {
                    let id = bucket.resolve_id(&id)?;
                    bucket.delete(&id)?;
                    println!("Deleted resume {}.", short(&id));
                }
            }
        }

        Commands::Task { command } => match command {
            TaskCommands::Add { title, due, job } => {
                if title.trim().is_empty() {
                    return Err(ValidationError::MissingField("title").into());
                }
                let due = parse_date(&due)?;
                let job_id = match job {
                    Some(id) => Some(find_application(ws, &id)?.id),
                    None => None,
                };
                let task = ws.create_task(&title, due, job_id.as_deref())?;
                println!("Added task {} due {}.", short(&task.id), format_date(task.due_date));
            }

            TaskCommands::List { all } => {
                let tasks: Vec<_> = tracker::upcoming_tasks(&ws.list_tasks()?)
                    .into_iter()
                    .filter(|task| all || !task.completed)
                    .collect();
                if tasks.is_empty() {
                    println!("No tasks.");
                } else {
                    println!("{:<10} {:<4} {:<14} {:<40}", "ID", "DONE", "DUE", "TITLE");
                    println!("{}", "-".repeat(70));
                    for task in tasks {
                        println!(
                            "{:<10} {:<4} {:<14} {:<40}",
                            short(&task.id),
                            if task.completed { "[x]" } else { "[ ]" },
                            format_date(task.due_date),
                            truncate(&task.title, 40)
                        );
                    }
                }
            }

            TaskCommands::Done { id } => {
                let id = ws.resolve_id(Table::Tasks, &id)?;
                let tasks = tracker::toggle_task(ws.list_tasks()?, &id);
                if let Some(task) = tasks.iter().find(|task| task.id == id) {
                    ws.set_task_completed(&id, task.completed)?;
                    let state = if task.completed { "completed" } else { "reopened" };
                    println!("Task '{}' {}.", task.title, state);
                }
            }

            TaskCommands::Delete { id } => {
                let id = ws.resolve_id(Table::Tasks, &id)?;
                ws.delete_task(&id)?;
                println!("Deleted task {}.", short(&id));
            }
        },

        Commands::Init
        | Commands::Signup { .. }
        | Commands::Login { .. }
        | Commands::Logout
        | Commands::Whoami => unreachable!("session commands are handled in main"),
    }

    Ok(())
}

fn run_history_command(command: HistoryCommands, ws: &Workspace) -> Result<()> {
    match command {
        HistoryCommands::List {
            kind,
            search,
            job,
            limit,
        } => {
            let filter = ContentFilter {
                kind: kind.as_deref().map(str::parse).transpose()?,
                job_id: match job {
                    Some(id) => Some(ws.resolve_id(Table::Applications, &id)?),
                    None => None,
                },
                search,
                limit: Some(limit),
            };
            let items = ws.list_content(&filter)?;
            if items.is_empty() {
                println!("No content found. Generate new content to see it here.");
            } else {
                println!("{:<10} {:<18} {:<22} {:<22} {:<14}", "ID", "TYPE", "COMPANY", "ROLE", "GENERATED");
                println!("{}", "-".repeat(90));
                for item in items {
                    println!(
                        "{:<10} {:<18} {:<22} {:<22} {:<14}",
                        short(&item.id),
                        item.kind.label(),
                        truncate(item.company.as_deref().unwrap_or("-"), 20),
                        truncate(item.role.as_deref().unwrap_or("-"), 20),
                        format_date(item.generated_at.date_naive())
                    );
                }
            }
        }

        HistoryCommands::Show { id } => {
            let id = ws.resolve_id(Table::Content, &id)?;
            let item = ws
                .get_content(&id)?
                .ok_or_else(|| anyhow!("Content {} not found", id))?;
            println!("{} ({})", item.kind.label(), short(&item.id));
            if let Some(company) = &item.company {
                println!("Company: {}", company);
            }
            if let Some(role) = &item.role {
                println!("Role: {}", role);
            }
            println!("Generated: {}", format_date(item.generated_at.date_naive()));
            println!("\n--- Content ---\n{}", item.body);
        }

        HistoryCommands::Delete { id } => {
            let id = ws.resolve_id(Table::Content, &id)?;
            ws.delete_content(&id)?;
            println!("Deleted content {}.", short(&id));
        }

        HistoryCommands::Export { id, dir } => {
            let id = ws.resolve_id(Table::Content, &id)?;
            let item = ws
                .get_content(&id)?
                .ok_or_else(|| anyhow!("Content {} not found", id))?;
            let path = history::export(&item, &dir)?;
            println!("Saved to {}", path.display());
        }

        HistoryCommands::Stats => {
            let items = ws.list_content(&ContentFilter {
                limit: Some(i64::MAX as usize),
                ..Default::default()
            })?;
            let counts = history::aggregate_content(&items);
            println!("{:<18} {:>6}", "TYPE", "COUNT");
            println!("{}", "-".repeat(25));
            for kind in ContentKind::ALL {
                println!("{:<18} {:>6}", kind.label(), counts.get(kind));
            }
            println!("{}", "-".repeat(25));
            println!("{:<18} {:>6}", "Total", counts.total);
        }
    }
    Ok(())
}

fn find_application(ws: &Workspace, id: &str) -> Result<JobApplication> {
    let tracker = Tracker::load(ws, ApplicationFilter::default())?;
    tracker
        .resolve(id)?
        .cloned()
        .ok_or_else(|| anyhow!("Application '{}' not found", id))
}

fn sort_order(field: Option<&str>, asc: bool, desc: bool) -> Result<SortOrder> {
    let Some(field) = field else {
        let mut order = SortOrder::default();
        if asc {
            order.direction = order.direction.reversed();
        }
        return Ok(order);
    };
    let field: SortField = field.parse()?;
    let direction = if desc {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    Ok(SortOrder { field, direction })
}

fn print_applications(apps: &[JobApplication]) {
    println!(
        "{:<10} {:<22} {:<24} {:<14} {:<10} {:<6}",
        "ID", "COMPANY", "ROLE", "APPLIED", "STATUS", "RESUME"
    );
    println!("{}", "-".repeat(91));
    for app in apps {
        println!(
            "{:<10} {:<22} {:<24} {:<14} {:<10} {:<6}",
            short(&app.id),
            truncate(&app.company, 20),
            truncate(&app.role, 22),
            format_date(app.applied_date),
            app.status.label(),
            if app.resume_attached { "yes" } else { "no" }
        );
    }
}

fn print_application(app: &JobApplication, ws: &Workspace) -> Result<()> {
    println!("Application {}", app.id);
    println!("Company: {}", app.company);
    println!("Role: {}", app.role);
    println!("Applied: {}", format_date(app.applied_date));
    println!("Status: {}", app.status.label());
    println!("Resume attached: {}", if app.resume_attached { "yes" } else { "no" });
    if let Some(notes) = &app.notes {
        println!("\n--- Notes ---\n{}", textwrap::fill(notes, 80));
    }

    let content = ws.list_content(&ContentFilter {
        job_id: Some(app.id.clone()),
        ..Default::default()
    })?;
    if !content.is_empty() {
        println!("\nGenerated content ({}):", content.len());
        for item in content {
            println!(
                "  {} - {} ({})",
                short(&item.id),
                item.kind.label(),
                format_date(item.generated_at.date_naive())
            );
        }
    }
    Ok(())
}

fn read_password() -> Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
