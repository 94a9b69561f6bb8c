use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::models::{ContentKind, GeneratedContent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentCounts {
    pub total: usize,
    pub resume: usize,
    pub email: usize,
    pub referral: usize,
    pub linkedin: usize,
    pub cover: usize,
}

impl ContentCounts {
    pub fn get(&self, kind: ContentKind) -> usize {
        match kind {
            ContentKind::Resume => self.resume,
            ContentKind::Email => self.email,
            ContentKind::Referral => self.referral,
            ContentKind::Linkedin => self.linkedin,
            ContentKind::Cover => self.cover,
        }
    }
}

pub fn aggregate_content(items: &[GeneratedContent]) -> ContentCounts {
    let mut counts = ContentCounts::default();
    for item in items {
        counts.total += 1;
        match item.kind {
            ContentKind::Resume => counts.resume += 1,
            ContentKind::Email => counts.email += 1,
            ContentKind::Referral => counts.referral += 1,
            ContentKind::Linkedin => counts.linkedin += 1,
            ContentKind::Cover => counts.cover += 1,
        }
    }
    counts
}

/// `<kind>-<company>.txt`, or `<kind>-untitled.txt` without a company.
pub fn export_file_name(content: &GeneratedContent) -> String {
    let company = content
        .company
        .as_deref()
        .map(|c| {
            c.chars()
                .map(|ch| if ch.is_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
                .collect::<String>()
        })
        .filter(|c| !c.trim_matches('_').is_empty())
        .unwrap_or_else(|| "untitled".to_string());
    format!("{}-{}.txt", content.kind, company)
}

pub fn export(content: &GeneratedContent, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(export_file_name(content));
    std::fs::write(&path, &content.body)
        .with_context(|| format!("Failed to write to {}", path.display()))?;
    Ok(path)
}
