#![cfg(unix)]

use std::fs;
use taskmill::commands::run;
use taskmill_config::Settings;
use tempfile::TempDir;

fn settings_in(temp: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.cache.path = Some(temp.path().join("cache.json"));
    settings.retry.max_attempts = 1;
    settings
}

fn write_batch(temp: &TempDir, body: serde_json::Value) -> std::path::PathBuf {
    let path = temp.path().join("batch.json");
    fs::write(&path, serde_json::to_vec(&body).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn cached_commands_run_once_across_invocations() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(&temp);
    let batch = write_batch(
        &temp,
        serde_json::json!([
            {
                "name": "append",
                "program": "sh",
                "args": ["-c", "echo run >> counter"],
                "cwd": temp.path()
            }
        ]),
    );

    run::execute(&settings, &batch).await.unwrap();
    run::execute(&settings, &batch).await.unwrap();

    let counter = fs::read_to_string(temp.path().join("counter")).unwrap();
    assert_eq!(counter.lines().count(), 1);
}

#[tokio::test]
async fn uncached_commands_run_every_time() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(&temp);
    let batch = write_batch(
        &temp,
        serde_json::json!([
            {
                "name": "append",
                "program": "sh",
                "args": ["-c", "echo run >> counter"],
                "cwd": temp.path(),
                "cache": false
            }
        ]),
    );

    run::execute(&settings, &batch).await.unwrap();
    run::execute(&settings, &batch).await.unwrap();

    let counter = fs::read_to_string(temp.path().join("counter")).unwrap();
    assert_eq!(counter.lines().count(), 2);
}

#[tokio::test]
async fn failing_command_fails_the_run_but_not_its_siblings() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(&temp);
    let batch = write_batch(
        &temp,
        serde_json::json!([
            {"name": "broken", "program": "sh", "args": ["-c", "exit 2"]},
            {
                "name": "marker",
                "program": "sh",
                "args": ["-c", "touch done"],
                "cwd": temp.path()
            }
        ]),
    );

    let error = run::execute(&settings, &batch).await.unwrap_err();

    assert!(error.to_string().contains("1 of 2 commands failed"));
    assert!(temp.path().join("done").exists());
}

#[tokio::test]
async fn missing_working_directory_is_created_and_retried() {
    let temp = TempDir::new().unwrap();
    let mut settings = settings_in(&temp);
    settings.retry.max_attempts = 2;
    settings.retry.backoff_unit_ms = 1;
    let workdir = temp.path().join("nested").join("work");
    let batch = write_batch(
        &temp,
        serde_json::json!([
            {"name": "in-workdir", "program": "sh", "args": ["-c", "touch here"], "cwd": workdir}
        ]),
    );

    run::execute(&settings, &batch).await.unwrap();

    assert!(workdir.join("here").exists());
}
