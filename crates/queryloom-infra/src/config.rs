//! Configuration loader for Queryloom.
//!
//! Reads `config.toml` from the data directory (`~/.queryloom/` in
//! production), deserializes it into [`Settings`], then applies environment
//! variable overrides on top. Falls back to sensible defaults when the file
//! is missing or malformed, so a bare environment still boots.

use std::path::{Path, PathBuf};

use queryloom_types::config::Settings;
use secrecy::SecretString;

/// Load settings from `{data_dir}/config.toml` and the environment.
///
/// - If the file does not exist, starts from [`Settings::default()`].
/// - If the file exists but fails to parse, logs a warning and starts from
///   the default.
/// - Environment variables override whatever the file provided.
pub async fn load_settings(data_dir: &Path) -> Settings {
    let config_path = data_dir.join("config.toml");

    let mut settings = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => match toml::from_str::<Settings>(&content) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(
                    "Failed to parse {}: {err}, using defaults",
                    config_path.display()
                );
                Settings::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No config.toml found at {}, using defaults",
                config_path.display()
            );
            Settings::default()
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            Settings::default()
        }
    };

    apply_env_overrides(&mut settings);
    settings
}

/// Overlay environment variables onto `settings`.
///
/// Variable names follow the conventional deployment surface:
/// `MYSQL_HOSTNAME`, `MYSQL_PORT`, `MYSQL_DATABASE`, `MYSQL_USERNAME`,
/// `MYSQL_PASSWORD`, `LLM_SMART_MODEL`, `LLM_QUERY_MODEL`,
/// `LLM_TEMPERATURE_SMART`, `LLM_TEMPERATURE_QUERY`, `PROJECT_DIR`,
/// `ERD_FILENAME`. Unparseable numeric values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(hostname) = std::env::var("MYSQL_HOSTNAME") {
        settings.database.hostname = hostname;
    }
    if let Some(port) = env_parsed::<u16>("MYSQL_PORT") {
        settings.database.port = port;
    }
    if let Ok(database) = std::env::var("MYSQL_DATABASE") {
        settings.database.database = database;
    }
    if let Ok(username) = std::env::var("MYSQL_USERNAME") {
        settings.database.username = username;
    }
    if let Ok(password) = std::env::var("MYSQL_PASSWORD") {
        settings.database.password = password;
    }

    if let Ok(model) = std::env::var("LLM_SMART_MODEL") {
        settings.llm.smart_model = model;
    }
    if let Ok(model) = std::env::var("LLM_QUERY_MODEL") {
        settings.llm.query_model = model;
    }
    if let Some(temperature) = env_parsed::<f32>("LLM_TEMPERATURE_SMART") {
        settings.llm.smart_temperature = temperature;
    }
    if let Some(temperature) = env_parsed::<f32>("LLM_TEMPERATURE_QUERY") {
        settings.llm.query_temperature = temperature;
    }

    if let Ok(dir) = std::env::var("PROJECT_DIR") {
        settings.resources.project_dir = Some(PathBuf::from(dir));
    }
    if let Ok(filename) = std::env::var("ERD_FILENAME") {
        settings.resources.erd_filename = filename;
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {name}={raw}");
            None
        }
    }
}

/// Read the OpenAI API key from `OPENAI_API_KEY`.
///
/// Wrapped in [`SecretString`] so the key never appears in debug output.
pub fn openai_api_key() -> Option<SecretString> {
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from)
}

/// Data directory for checkpoints and config: `QUERYLOOM_DATA_DIR` or
/// `~/.queryloom`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("QUERYLOOM_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".queryloom")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_settings_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let settings = load_settings(tmp.path()).await;
        assert_eq!(settings.database.hostname, "localhost");
        assert_eq!(settings.llm.query_model, "gpt-4.1-mini");
    }

    #[tokio::test]
    async fn load_settings_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(
            &config_path,
            r#"
[database]
hostname = "db.internal"
port = 3307

[llm]
row_limit = 20
"#,
        )
        .await
        .unwrap();

        let settings = load_settings(tmp.path()).await;
        assert_eq!(settings.database.hostname, "db.internal");
        assert_eq!(settings.database.port, 3307);
        assert_eq!(settings.llm.row_limit, 20);
        // Unset sections keep their defaults.
        assert_eq!(settings.resources.erd_filename, "ERD.md");
    }

    #[tokio::test]
    async fn load_settings_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(&config_path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let settings = load_settings(tmp.path()).await;
        assert_eq!(settings.database.database, "test");
    }

    #[test]
    fn env_parsed_rejects_garbage() {
        // Uses a name no other test sets to avoid cross-test interference.
        unsafe { std::env::set_var("QUERYLOOM_TEST_PORT_GARBAGE", "not-a-number") };
        let parsed: Option<u16> = env_parsed("QUERYLOOM_TEST_PORT_GARBAGE");
        assert!(parsed.is_none());
        unsafe { std::env::remove_var("QUERYLOOM_TEST_PORT_GARBAGE") };
    }
}
