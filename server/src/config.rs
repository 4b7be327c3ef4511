use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub configurations: Vec<SeedConfiguration>,
    /// Name of the configuration that starts out active.
    pub default: String,
    /// Where to snapshot conversations between runs. In-memory only if unset.
    #[serde(default)]
    pub history_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedConfiguration {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SeedConfiguration {
    fn new(name: &str, description: &str, tags: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            configurations: vec![
                SeedConfiguration::new("Friendly", "Warm, casual and encouraging.", &["casual"]),
                SeedConfiguration::new("Formal", "Precise and businesslike.", &["professional"]),
            ],
            default: "Friendly".to_string(),
            history_file: None,
        }
    }
}

pub async fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: AppConfig = serde_json::from_str(&content)
        .with_context(|| format!("invalid configuration file {}", path.display()))?;
    anyhow::ensure!(
        !config.configurations.is_empty(),
        "{} lists no configurations",
        path.display()
    );
    let mut names = HashSet::new();
    if let Some(duplicate) = config
        .configurations
        .iter()
        .find(|seed| !names.insert(seed.name.as_str()))
    {
        anyhow::bail!(
            "{} lists configuration '{}' more than once",
            path.display(),
            duplicate.name
        );
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_seed_configurations() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "configurations": [
                    {{ "name": "Pirate", "tags": ["fun"] }},
                    {{ "name": "Butler", "description": "At your service." }}
                ],
                "default": "Butler"
            }}"#
        )
        .unwrap();

        let config = load_config(file.path()).await.unwrap();

        assert_eq!(config.configurations.len(), 2);
        assert_eq!(config.configurations[0].tags, vec!["fun".to_string()]);
        assert_eq!(config.default, "Butler");
        assert!(config.history_file.is_none());
    }

    #[tokio::test]
    async fn rejects_repeated_configuration_names() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "configurations": [{{ "name": "Friendly" }}, {{ "name": "Friendly" }}],
                "default": "Friendly"
            }}"#
        )
        .unwrap();

        let err = load_config(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("'Friendly' more than once"), "{err}");
    }

    #[tokio::test]
    async fn rejects_empty_configuration_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "configurations": [], "default": "x" }}"#).unwrap();

        assert!(load_config(file.path()).await.is_err());
    }
}
