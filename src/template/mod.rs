use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::MigrationConfig;

pub mod jinja;

pub use jinja::JinjaRenderer;

/// Key under which the active [`MigrationConfig`] is exposed to templates.
pub const MIGRATION_KEY: &str = "migration";

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Rendering failure reported by a [`TemplateRenderer`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TemplateError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TemplateError {
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Data exposed to a script while it is rendered.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    #[serde(flatten)]
    values: Map<String, Value>,
}

impl RenderContext {
    pub fn new(config: &MigrationConfig) -> Self {
        let mut values = Map::new();
        values.insert(
            MIGRATION_KEY.to_string(),
            json!({
                "schema_name": config.schema_name,
                "table_name": config.table_name,
                "keep_track_of_migration": config.keep_track_of_migration,
                "qualified_table": config.qualified_table(),
            }),
        );
        Self { values }
    }

    /// Adds user-defined variables. The reserved `migration` key is never
    /// overwritten.
    pub fn with_variables(mut self, variables: &BTreeMap<String, Value>) -> Self {
        for (key, value) in variables {
            if key != MIGRATION_KEY {
                self.values.insert(key.clone(), value.clone());
            }
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// Expands a raw migration script into executable SQL.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, context: &RenderContext) -> Result<String, TemplateError>;
}
