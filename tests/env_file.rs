//! Env file editing tests
//!
//! The host backend rewrites a single key in a service's env file. Values
//! may change length, and everything else in the file must survive.

use nua::ConvergenceBackend;
use nua::backend::{EnvFile, EnvFileError, HostConfigBackend, VERSION_KEY};
use std::path::Path;
use tempfile::TempDir;

const SERVICE_ENV: &str = "# managed by nua\nIMAGE=registry.example.com/app\nVERSION=1.9.0\n\nLOG_LEVEL=info\n";

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn test_longer_value_preserves_other_lines() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "app.env", SERVICE_ENV);

    let mut env = EnvFile::load(&path).unwrap();
    assert!(env.set(VERSION_KEY, "1.10.0-rc.1"));
    env.save(&path).unwrap();

    assert_eq!(
        read(&path),
        "# managed by nua\nIMAGE=registry.example.com/app\nVERSION=1.10.0-rc.1\n\nLOG_LEVEL=info\n"
    );
}

#[test]
fn test_shorter_value_leaves_no_residue() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "app.env", "VERSION=10.20.30-beta.4\nPORT=8080\n");

    let mut env = EnvFile::load(&path).unwrap();
    env.set(VERSION_KEY, "2.0");
    env.save(&path).unwrap();

    assert_eq!(read(&path), "VERSION=2.0\nPORT=8080\n");
}

#[test]
fn test_crlf_file_keeps_crlf() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "app.env", "VERSION=1.9.0\r\nPORT=8080\r\n");

    let mut env = EnvFile::load(&path).unwrap();
    env.set(VERSION_KEY, "2.0.0");
    env.save(&path).unwrap();

    assert_eq!(read(&path), "VERSION=2.0.0\r\nPORT=8080\r\n");
}

#[test]
fn test_missing_key_is_appended() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "app.env", "PORT=8080");

    let mut env = EnvFile::load(&path).unwrap();
    env.set(VERSION_KEY, "1.0.0");
    env.save(&path).unwrap();

    let reloaded = EnvFile::load(&path).unwrap();
    assert_eq!(reloaded.get("PORT"), Some("8080"));
    assert_eq!(reloaded.get(VERSION_KEY), Some("1.0.0"));
}

#[test]
fn test_missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.env");

    let err = EnvFile::load(&path).unwrap_err();
    assert!(matches!(err, EnvFileError::NotFound(p) if p == path));
}

#[test]
fn test_save_leaves_no_temp_files_behind() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "app.env", SERVICE_ENV);

    let mut env = EnvFile::load(&path).unwrap();
    env.set(VERSION_KEY, "2.0.0");
    env.save(&path).unwrap();

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("app.env")]);
}

#[tokio::test]
async fn test_host_backend_converges_env_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "app.env", SERVICE_ENV);
    let backend = HostConfigBackend::new(&path);

    assert_eq!(
        backend.installed_version().await.unwrap().as_deref(),
        Some("1.9.0")
    );

    backend.apply(&"v2.0.0".to_string()).await.unwrap();
    assert_eq!(
        backend.installed_version().await.unwrap().as_deref(),
        Some("v2.0.0")
    );
    assert!(read(&path).contains("LOG_LEVEL=info"));
}

#[tokio::test]
async fn test_host_backend_fails_without_env_file() {
    let dir = TempDir::new().unwrap();
    let backend = HostConfigBackend::new(dir.path().join("missing.env"));

    let err = backend.apply(&"1.0.0".to_string()).await.unwrap_err();
    assert!(err.chain().any(|cause| cause.to_string().contains("does not exist")));
}
