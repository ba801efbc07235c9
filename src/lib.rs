pub mod config;
pub mod database;
pub mod engine;
pub mod migration;
pub mod source;
pub mod template;

pub use migration::{MigrationError, Migrator};
pub use source::{MigrationScript, ScriptSource};
