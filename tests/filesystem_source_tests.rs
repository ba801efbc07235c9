use std::fs;
use tempfile::TempDir;
use tidemark::migration::MigrationError;
use tidemark::source::{FileSystemSource, ScriptSource};

fn write_scripts(dir: &std::path::Path) {
    for i in (1..=10).rev() {
        fs::write(
            dir.join(format!("{:04}_script.sql", i)),
            format!("SELECT {};", i),
        )
        .unwrap();
        fs::write(dir.join(format!("{:04}_notes.ext", i)), "not sql").unwrap();
    }
}

#[tokio::test]
async fn filesystem_source_filters_by_extension() {
    let temp = TempDir::new().unwrap();
    write_scripts(temp.path());

    let source = FileSystemSource::new(temp.path(), Some(".sql"));
    let scripts = source.load_all().await.unwrap();

    assert_eq!(scripts.len(), 10);
    assert!(scripts.iter().all(|s| s.identifier.ends_with(".sql")));
    assert_eq!(scripts[0].identifier, "0001_script.sql");
    assert_eq!(scripts[0].raw_text, "SELECT 1;");
    assert_eq!(scripts[9].identifier, "0010_script.sql");
}

#[tokio::test]
async fn filesystem_source_without_extension_loads_every_file() {
    let temp = TempDir::new().unwrap();
    write_scripts(temp.path());

    let source = FileSystemSource::new(temp.path(), None);
    let scripts = source.load_all().await.unwrap();

    assert_eq!(scripts.len(), 20);
    let ids: Vec<_> = scripts.iter().map(|s| s.identifier.as_str()).collect();
    assert_eq!(&ids[..2], ["0001_notes.ext", "0001_script.sql"]);
}

#[tokio::test]
async fn filesystem_source_ignores_subdirectories() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("0000_archive.sql")).unwrap();
    fs::write(temp.path().join("0001_init.sql"), "SELECT 1;").unwrap();

    let source = FileSystemSource::new(temp.path(), Some(".sql"));
    let scripts = source.load_all().await.unwrap();

    assert_eq!(scripts.len(), 1);
    assert_eq!(scripts[0].identifier, "0001_init.sql");
}

#[tokio::test]
async fn filesystem_source_empty_directory() {
    let temp = TempDir::new().unwrap();

    let source = FileSystemSource::new(temp.path(), Some(".sql"));
    assert!(source.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn filesystem_source_missing_directory_is_unavailable() {
    let temp = TempDir::new().unwrap();

    let source = FileSystemSource::new(temp.path().join("missing"), Some(".sql"));
    let err = source.load_all().await.unwrap_err();

    assert!(matches!(err, MigrationError::SourceUnavailable { .. }));
}

#[tokio::test]
async fn filesystem_source_create_sorts_after_existing() {
    let temp = TempDir::new().unwrap();
    write_scripts(temp.path());
    let source = FileSystemSource::new(temp.path(), Some(".sql"));

    let id = source.create("Add Users", "CREATE TABLE users (id INTEGER);").await.unwrap();

    let scripts = source.load_all().await.unwrap();
    assert_eq!(scripts.len(), 11);
    assert_eq!(scripts.last().unwrap().identifier, id);
    assert!(scripts.last().unwrap().raw_text.contains("CREATE TABLE users"));
}

#[tokio::test]
async fn filesystem_source_create_makes_directory() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("db").join("migrations");
    let source = FileSystemSource::new(&dir, Some(".sql"));

    let id = source.create("init", "").await.unwrap();

    assert!(dir.join(&id).is_file());
}

#[tokio::test]
async fn filesystem_source_create_rejects_blank_name() {
    let temp = TempDir::new().unwrap();
    let source = FileSystemSource::new(temp.path(), Some(".sql"));

    let err = source.create("  !! ", "").await.unwrap_err();

    assert!(matches!(err, MigrationError::InvalidName(_)));
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn filesystem_source_create_sorts_after_non_timestamp_names() {
    for existing in ["2_users.sql", "init.sql", "V1__init.sql"] {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(existing), "SELECT 1;").unwrap();
        let source = FileSystemSource::new(temp.path(), Some(".sql"));

        let id = source.create("next", "SELECT 2;").await.unwrap();
        let second = source.create("after next", "SELECT 3;").await.unwrap();

        let ids: Vec<_> = source
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.identifier)
            .collect();
        assert_eq!(ids, vec![existing.to_string(), id, second]);
    }
}
