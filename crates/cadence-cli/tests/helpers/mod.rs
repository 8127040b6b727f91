use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Runs the `cadence` binary against a throwaway database
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// A command with the database path set and the working directory
    /// isolated from any `cadence.toml` on the machine.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence").expect("Failed to find cadence binary");
        cmd.env("CADENCE_DATABASE_PATH", &self.db_path)
            .env_remove("CADENCE_LOG")
            .current_dir(self.temp_dir.path());
        cmd
    }

    #[allow(dead_code)]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Runs `create` and returns the id of the new series.
    pub fn create_series(&self, args: &[&str]) -> String {
        let mut full = vec!["create"];
        full.extend_from_slice(args);
        let output = self.run_success(&full).get_output().stdout.clone();
        created_id(&String::from_utf8_lossy(&output))
    }

    pub fn stdout_of(&self, args: &[&str]) -> String {
        let output = self.run_success(args).get_output().stdout.clone();
        String::from_utf8_lossy(&output).into_owned()
    }
}

/// Extracts the id from the last "Created series" line of `stdout`.
pub fn created_id(stdout: &str) -> String {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("✓ Created series "))
        .last()
        .map(|id| id.trim().to_string())
        .expect("no series id in output")
}

pub mod assertions {
    use predicates::prelude::*;

    pub fn series_created() -> impl Predicate<str> {
        predicate::str::contains("✓ Created series")
    }

    pub fn has_occurrence_table_headers() -> impl Predicate<str> {
        predicate::str::contains("Start")
            .and(predicate::str::contains("End"))
            .and(predicate::str::contains("Title"))
            .and(predicate::str::contains("Status"))
    }

    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error").or(predicate::str::contains("error"))
    }
}
