use super::settings::AppConfig;
use crate::core::errors::ConfigError;

pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let rag = &config.rag;
    validate_f64_range(
        "rag.similarity_threshold",
        rag.similarity_threshold,
        0.0,
        1.0,
    )?;
    validate_u64_range("rag.top_k", rag.top_k as u64, 1, 100)?;
    validate_u64_range("rag.timeout_secs", rag.timeout_secs, 1, 600)?;
    validate_u64_range(
        "rag.embedding_dimension",
        rag.embedding_dimension as u64,
        1,
        20_000,
    )?;
    validate_non_empty("rag.embedding_model", &rag.embedding_model)?;
    validate_non_empty("rag.index_name", &rag.index_name)?;

    let generation = &config.generation;
    validate_f64_range("generation.temperature", generation.temperature, 0.0, 2.0)?;
    validate_u64_range(
        "generation.max_tokens",
        generation.max_tokens as u64,
        1,
        32_768,
    )?;
    validate_u64_range("generation.timeout_secs", generation.timeout_secs, 1, 600)?;
    validate_non_empty("generation.model", &generation.model)?;
    validate_non_empty("generation.base_url", &generation.base_url)?;

    let chat = &config.chat;
    if chat.max_history < 1 {
        return Err(ConfigError::invalid(
            "chat.max_history",
            "must be at least 1",
        ));
    }
    validate_u64_range(
        "chat.prompt_history_turns",
        chat.prompt_history_turns as u64,
        1,
        1_000,
    )?;
    if chat.max_history_display < 1 {
        return Err(ConfigError::invalid(
            "chat.max_history_display",
            "must be at least 1",
        ));
    }

    validate_u64_range(
        "store.max_connections",
        config.store.max_connections as u64,
        1,
        1_000,
    )?;
    validate_non_empty("server.host", &config.server.host)?;

    Ok(())
}

fn validate_f64_range(path: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::invalid(
            path,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn validate_u64_range(path: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::invalid(
            path,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn validate_non_empty(path: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(path, "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn rejects_threshold_outside_unit_interval() {
        let mut config = AppConfig::default();
        config.rag.similarity_threshold = 1.5;

        let err = validate_config(&config).unwrap_err();

        assert!(
            matches!(err, ConfigError::Invalid { ref path, .. } if path == "rag.similarity_threshold")
        );
    }

    #[test]
    fn rejects_zero_top_k_and_zero_history() {
        let mut config = AppConfig::default();
        config.rag.top_k = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.chat.max_history = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_blank_model() {
        let mut config = AppConfig::default();
        config.generation.model = "  ".to_string();

        let err = validate_config(&config).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { ref path, .. } if path == "generation.model"));
    }
}
