// src/source/mod.rs
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Mutex;

use crate::migration::{MigrationError, Result};

pub mod filesystem;

pub use filesystem::FileSystemSource;

/// A migration script as loaded from a source, before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    /// Unique and stable across runs; recorded in the tracking table.
    pub identifier: String,
    pub raw_text: String,
}

impl MigrationScript {
    pub fn new(identifier: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            raw_text: raw_text.into(),
        }
    }
}

#[async_trait]
pub trait ScriptSource: Debug + Send + Sync {
    /// All scripts, in the order they must be applied.
    async fn load_all(&self) -> Result<Vec<MigrationScript>>;

    /// Adds a script that sorts after every existing one and returns its
    /// identifier.
    async fn create(&self, name: &str, content: &str) -> Result<String>;
}

/// Turns a human friendly name into `lower-case-words`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// In-memory source. Used for the built-in preparation scripts.
#[derive(Debug, Default)]
pub struct StaticSource {
    scripts: Mutex<Vec<MigrationScript>>,
}

impl StaticSource {
    pub fn new(scripts: Vec<MigrationScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
        }
    }
}

#[async_trait]
impl ScriptSource for StaticSource {
    async fn load_all(&self) -> Result<Vec<MigrationScript>> {
        let scripts = self.scripts.lock().map_err(|_| MigrationError::SourceUnavailable {
            location: "memory".to_string(),
            source: std::io::Error::other("script list lock poisoned"),
        })?;
        Ok(scripts.clone())
    }

    async fn create(&self, name: &str, content: &str) -> Result<String> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(MigrationError::InvalidName(name.to_string()));
        }

        let mut scripts = self.scripts.lock().map_err(|_| MigrationError::WriteError {
            path: "memory".into(),
            source: std::io::Error::other("script list lock poisoned"),
        })?;
        let identifier = format!("{:04}_{}", scripts.len() + 1, slug);
        scripts.push(MigrationScript::new(identifier.clone(), content));
        Ok(identifier)
    }
}
