// src/source/filesystem.rs
use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{slugify, MigrationScript, ScriptSource};
use crate::config::SourceConfig;
use crate::migration::{MigrationError, Result};

/// Width of the millisecond timestamp prefix. Fixed so that lexical order of
/// file names equals numeric order of prefixes.
const PREFIX_WIDTH: usize = 13;

/// Migration scripts stored as files in a single directory.
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    directory: PathBuf,
    file_extension: Option<String>,
}

impl FileSystemSource {
    pub fn new(directory: impl Into<PathBuf>, file_extension: Option<&str>) -> Self {
        Self {
            directory: directory.into(),
            file_extension: file_extension
                .filter(|ext| !ext.is_empty())
                .map(str::to_string),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(&config.directory, config.extension())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn has_valid_extension(&self, file_name: &str) -> bool {
        match &self.file_extension {
            Some(ext) => file_name.ends_with(ext.as_str()),
            None => true,
        }
    }

    fn unavailable(&self, source: std::io::Error) -> MigrationError {
        MigrationError::SourceUnavailable {
            location: self.directory.display().to_string(),
            source,
        }
    }

    /// Sorted names of the migration files currently in the directory.
    fn list_file_names(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.directory).map_err(|e| self.unavailable(e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| self.unavailable(e))?;
            let file_type = entry.file_type().map_err(|e| self.unavailable(e))?;
            if !file_type.is_file() {
                continue;
            }
            // Non UTF-8 names cannot be recorded as identifiers
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 file name");
                continue;
            };
            if self.has_valid_extension(&name) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Name for a new script: `<ms prefix>_<slug><ext>`, where the prefix is
    /// the current time in milliseconds bumped past the largest existing
    /// prefix when the clock has not moved on.
    ///
    /// Files outside the timestamp scheme (`V1__init.sql`, `init.sql`) can
    /// sort after any numeric prefix. The new name then extends the last
    /// existing one so it still loads last.
    fn next_identifier(&self, slug: &str) -> Result<String> {
        let names = match self.list_file_names() {
            Ok(names) => names,
            Err(_) if !self.directory.exists() => Vec::new(),
            Err(e) => return Err(e),
        };

        let now = Utc::now().timestamp_millis().max(0) as u64;
        let prefix = match names.iter().filter_map(|n| leading_number(n)).max() {
            Some(latest) if latest >= now => latest + 1,
            _ => now,
        };

        let ext = self.file_extension.as_deref().unwrap_or("");
        let candidate = format!("{:0width$}_{}{}", prefix, slug, ext, width = PREFIX_WIDTH);

        Ok(match names.last() {
            Some(last) if candidate.as_str() <= last.as_str() => {
                // `_` sorts after `.`, so `<stem>_...` follows `<stem>.ext`
                let stem = match last.strip_suffix(ext) {
                    Some(stem) if ext.starts_with('.') => stem,
                    _ => last.as_str(),
                };
                format!(
                    "{}_{:0width$}_{}{}",
                    stem,
                    prefix,
                    slug,
                    ext,
                    width = PREFIX_WIDTH
                )
            }
            _ => candidate,
        })
    }

    fn header(name: &str) -> String {
        format!(
            "-- Migration: {}\n-- Created: {}\n",
            name,
            Utc::now().to_rfc3339()
        )
    }
}

fn leading_number(file_name: &str) -> Option<u64> {
    let digits: String = file_name.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

#[async_trait]
impl ScriptSource for FileSystemSource {
    async fn load_all(&self) -> Result<Vec<MigrationScript>> {
        let names = self.list_file_names()?;

        let mut scripts = Vec::with_capacity(names.len());
        for name in names {
            let path = self.directory.join(&name);
            let raw_text = fs::read_to_string(&path).map_err(|e| MigrationError::SourceUnavailable {
                location: path.display().to_string(),
                source: e,
            })?;
            scripts.push(MigrationScript::new(name, raw_text));
        }

        tracing::debug!(
            directory = %self.directory.display(),
            count = scripts.len(),
            "Loaded migration scripts"
        );
        Ok(scripts)
    }

    async fn create(&self, name: &str, content: &str) -> Result<String> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(MigrationError::InvalidName(name.to_string()));
        }

        fs::create_dir_all(&self.directory).map_err(|e| MigrationError::WriteError {
            path: self.directory.clone(),
            source: e,
        })?;

        let identifier = self.next_identifier(&slug)?;
        let path = self.directory.join(&identifier);

        let mut body = Self::header(name);
        if !content.is_empty() {
            body.push('\n');
            body.push_str(content);
            if !content.ends_with('\n') {
                body.push('\n');
            }
        }

        let write_error = |e| MigrationError::WriteError {
            path: path.clone(),
            source: e,
        };
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(write_error)?;
        file.write_all(body.as_bytes()).map_err(write_error)?;

        tracing::info!(identifier = %identifier, "Created migration");
        Ok(identifier)
    }
}
