//! Global configuration loader for Menagerie.
//!
//! Reads `config.toml` from the data directory (`~/.menagerie/` in
//! production) and deserializes it into [`GlobalConfig`]. Falls back to
//! defaults when the file is missing or malformed.

use std::path::Path;

use menagerie_types::config::GlobalConfig;

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.default_context_turns, 10);
        assert_eq!(config.reply_timeout_ms, 30_000);
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
default_context_turns = 6
reply_timeout_ms = 5000

[generator]
base_url = "http://generator.internal:9090"
model = "ambassador-small"
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.default_context_turns, 6);
        assert_eq!(config.reply_timeout_ms, 5_000);
        assert_eq!(config.generator.base_url, "http://generator.internal:9090");
        assert_eq!(config.generator.model, "ambassador-small");
        assert_eq!(config.generator.max_tokens, 1024);
    }

    #[tokio::test]
    async fn load_global_config_malformed_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "default_context_turns = [nope")
            .await
            .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.default_context_turns, 10);
    }
}
