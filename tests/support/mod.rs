#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Throwaway store directory for one test
pub struct TestStore {
    dir: TempDir,
}

impl TestStore {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join("atarefa.toml");
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Command bound to this store, with no session user from the environment
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("atarefa").expect("atarefa binary");
        cmd.env("ATAREFA_STORE", self.path())
            .env_remove("ATAREFA_USER")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run with `--json`, require success and return the `data` payload
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let envelope: Value = serde_json::from_slice(&output).expect("json envelope");
        assert_eq!(envelope["status"], "success", "{envelope}");
        envelope["data"].clone()
    }

    /// Register a person and return the new id
    pub fn add_person(&self, name: &str, email: &str) -> String {
        let data = self.json(&[
            "person",
            "add",
            "--name",
            name,
            "--email",
            email,
            "--national-id",
            "123.456.789-01",
            "--birth-date",
            "1990-05-17",
        ]);
        data["id"].as_str().expect("person id").to_string()
    }
}

pub fn str_field<'a>(value: &'a Value, field: &str) -> &'a str {
    value[field].as_str().unwrap_or_default()
}
