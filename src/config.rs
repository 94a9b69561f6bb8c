use anyhow::Result;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "claude-sonnet";

/// Runtime settings from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub files_dir: PathBuf,
    pub model: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // .env is optional
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = default_data_dir();
        Config {
            db_path: lookup("JOBFLOW_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("jobflow.db")),
            files_dir: lookup("JOBFLOW_FILES")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("files")),
            model: lookup("JOBFLOW_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "warn".to_string()),
        }
    }
}

fn default_data_dir() -> PathBuf {
    // XDG data directory, or the current directory as a fallback
    directories::ProjectDirs::from("", "", "jobflow")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
