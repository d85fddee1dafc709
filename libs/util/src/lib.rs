use std::path::{Path, PathBuf};

use anyhow::Context;
use toml::{map::Map, Value};

/// Overrides the directory that holds `Secrets.toml` and `Config*.toml`.
pub const HOME_ENV: &str = "SANAT_HOME";

pub fn workspace_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return PathBuf::from(home);
    }

    let output = std::process::Command::new(env!("CARGO"))
        .arg("locate-project")
        .arg("--workspace")
        .arg("--message-format=plain")
        .output();

    let located = output.ok().and_then(|output| {
        let stdout = String::from_utf8(output.stdout).ok()?;
        let cargo_path = Path::new(stdout.trim());
        cargo_path.parent().map(Path::to_path_buf)
    });

    match located {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => PathBuf::from("."),
    }
}

pub fn load_config(config_name: &str) -> anyhow::Result<Map<String, Value>> {
    load_toml(&workspace_dir().join(config_name))
}

pub fn load_env() -> anyhow::Result<Map<String, Value>> {
    load_toml(&workspace_dir().join("Secrets.toml"))
}

pub fn load_toml(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    toml::from_str::<Map<String, Value>>(&text)
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Reads `table.key` as a string.
pub fn get_str(
    config: &Map<String, Value>,
    table: &str,
    key: &str,
) -> anyhow::Result<String> {
    config
        .get(table)
        .with_context(|| format!("failed to get {table} config"))?
        .get(key)
        .with_context(|| format!("failed to load {table}.{key} config"))?
        .as_str()
        .with_context(|| format!("failed to parse {table}.{key} config"))
        .map(str::to_string)
}

/// Reads `table.key` as an integer.
pub fn get_integer(
    config: &Map<String, Value>,
    table: &str,
    key: &str,
) -> anyhow::Result<i64> {
    config
        .get(table)
        .with_context(|| format!("failed to get {table} config"))?
        .get(key)
        .with_context(|| format!("failed to load {table}.{key} config"))?
        .as_integer()
        .with_context(|| format!("failed to parse {table}.{key} config"))
}
