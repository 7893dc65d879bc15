use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Number, Value};

use super::paths::AppPaths;
use super::settings::AppConfig;
use super::validation::validate_config;
use crate::core::errors::ConfigError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 6] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "credential",
    "database_url",
];

const SENSITIVE_WHITELIST: [&str; 1] = ["max_tokens"];

#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Text,
    Integer,
    Float,
    List,
}

/// Environment variables layered over the file configuration.
const ENV_OVERRIDES: [(&str, &[&str], EnvKind); 18] = [
    ("HOST", &["server", "host"], EnvKind::Text),
    ("PORT", &["server", "port"], EnvKind::Integer),
    ("API_KEY", &["server", "api_key"], EnvKind::Text),
    ("CORS_ORIGINS", &["server", "cors_allowed_origins"], EnvKind::List),
    ("DATABASE_URL", &["store", "database_url"], EnvKind::Text),
    ("OPENAI_API_KEY", &["generation", "api_key"], EnvKind::Text),
    ("OPENAI_BASE_URL", &["generation", "base_url"], EnvKind::Text),
    ("OPENAI_MODEL", &["generation", "model"], EnvKind::Text),
    ("EMBEDDING_MODEL", &["rag", "embedding_model"], EnvKind::Text),
    ("RAG_SIMILARITY_THRESHOLD", &["rag", "similarity_threshold"], EnvKind::Float),
    ("RAG_TOP_K", &["rag", "top_k"], EnvKind::Integer),
    ("PINECONE_API_KEY", &["rag", "pinecone_api_key"], EnvKind::Text),
    ("PINECONE_INDEX_NAME", &["rag", "index_name"], EnvKind::Text),
    ("PINECONE_INDEX_HOST", &["rag", "index_host"], EnvKind::Text),
    ("PINECONE_ENVIRONMENT", &["rag", "region"], EnvKind::Text),
    ("MAX_HISTORY_MESSAGES", &["chat", "max_history_display"], EnvKind::Integer),
    ("MAX_HISTORY_LENGTH", &["chat", "max_history"], EnvKind::Integer),
    ("LOG_LEVEL", &["logging", "level"], EnvKind::Text),
];

/// Loads configuration in layers: `config.yml`, then `secrets.yaml`, then
/// environment variables.
#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("CHILLPANDA_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        let mut merged = deep_merge(&public_config, &secrets_config);
        apply_env_overrides(&mut merged, |key| env::var(key).ok())?;

        let config: AppConfig = serde_json::from_value(merged)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Config rendered for logs, with secrets masked.
    pub fn redacted(&self, config: &AppConfig) -> Value {
        serde_json::to_value(config)
            .map(|value| redact_sensitive_values(&value))
            .unwrap_or(Value::Null)
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let value = serde_yaml::from_str::<Value>(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    match value {
        Value::Object(_) => Ok(value),
        _ => Ok(Value::Object(Map::new())),
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for (key, path, kind) in ENV_OVERRIDES {
        let Some(raw) = lookup(key) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let invalid = || ConfigError::InvalidEnv {
            key: key.to_string(),
            value: raw.to_string(),
        };
        let value = match kind {
            EnvKind::Text => Value::String(raw.to_string()),
            EnvKind::Integer => Value::Number(raw.parse::<i64>().map_err(|_| invalid())?.into()),
            EnvKind::Float => raw
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(invalid)?,
            EnvKind::List => Value::Array(
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| Value::String(item.to_string()))
                    .collect(),
            ),
        };
        ensure_object_path(config, path, value);
    }
    Ok(())
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn deep_merge_lets_secrets_override_public_values() {
        let public_config = json!({
            "generation": { "model": "gpt-4o-mini", "api_key": null },
            "rag": { "top_k": 3 }
        });
        let secrets = json!({
            "generation": { "api_key": "sk-test" }
        });

        let merged = deep_merge(&public_config, &secrets);

        assert_eq!(
            merged,
            json!({
                "generation": { "model": "gpt-4o-mini", "api_key": "sk-test" },
                "rag": { "top_k": 3 }
            })
        );
    }

    #[test]
    fn env_overrides_create_missing_sections_and_parse_types() {
        let mut config = json!({});
        let lookup = lookup_from(&[
            ("PORT", "9100"),
            ("RAG_SIMILARITY_THRESHOLD", "0.65"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("OPENAI_MODEL", "gpt-4o"),
        ]);

        apply_env_overrides(&mut config, lookup).unwrap();

        assert_eq!(config["server"]["port"], json!(9100));
        assert_eq!(config["rag"]["similarity_threshold"], json!(0.65));
        assert_eq!(
            config["server"]["cors_allowed_origins"],
            json!(["http://a.test", "http://b.test"])
        );
        assert_eq!(config["generation"]["model"], json!("gpt-4o"));
    }

    #[test]
    fn env_overrides_reject_unparseable_numbers() {
        let mut config = json!({});
        let lookup = lookup_from(&[("MAX_HISTORY_LENGTH", "ten")]);

        let err = apply_env_overrides(&mut config, lookup).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidEnv { ref key, .. } if key == "MAX_HISTORY_LENGTH"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = json!({ "generation": { "model": "keep-me" } });
        let lookup = lookup_from(&[("OPENAI_MODEL", "   ")]);

        apply_env_overrides(&mut config, lookup).unwrap();

        assert_eq!(config["generation"]["model"], json!("keep-me"));
    }

    #[test]
    fn redaction_masks_keys_but_not_token_limits() {
        let config = AppConfig {
            generation: crate::core::config::GenerationConfig {
                api_key: Some("sk-live".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let value = serde_json::to_value(&config).unwrap();

        let redacted = redact_sensitive_values(&value);

        assert_eq!(redacted["generation"]["api_key"], json!("****"));
        assert_eq!(redacted["generation"]["max_tokens"], json!(300));
        assert_eq!(redacted["rag"]["pinecone_api_key"], Value::Null);
    }

    #[test]
    fn yaml_file_values_reach_typed_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yml");
        fs::write(
            &path,
            "rag:\n  top_k: 5\n  similarity_threshold: 0.8\nchat:\n  max_history: 20\n",
        )
        .unwrap();

        let value = load_yaml_file(&path).unwrap();
        let config: AppConfig = serde_json::from_value(value).unwrap();

        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.rag.similarity_threshold, 0.8);
        assert_eq!(config.chat.max_history, 20);
        assert_eq!(config.chat.prompt_history_turns, 6);
        assert_eq!(config.generation.model, "gpt-4o-mini");
    }

    #[test]
    fn missing_yaml_file_is_an_empty_layer() {
        let tmp = tempfile::tempdir().unwrap();
        let value = load_yaml_file(&tmp.path().join("absent.yml")).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yml");
        fs::write(&path, "rag: [unclosed").unwrap();

        let err = load_yaml_file(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
