use crate::config::{parse_duration, Config};
use crate::error::{CineError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_engine(config, &mut errors);
        Self::validate_search(config, &mut errors);
        Self::validate_server(config, &mut errors);
        Self::validate_client(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CineError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_engine(config: &Config, errors: &mut Vec<ValidationError>) {
        let url = &config.engine.url;
        if reqwest::Url::parse(url).is_err() {
            errors.push(ValidationError::new(
                "engine.url",
                format!("Invalid URL: {}", url),
            ));
        }

        if config.engine.index.is_empty() {
            errors.push(ValidationError::new(
                "engine.index",
                "Index name cannot be empty",
            ));
        }

        if config.engine.model_id.is_empty() {
            errors.push(ValidationError::new(
                "engine.model_id",
                "Model id cannot be empty",
            ));
        }

        Self::validate_duration("engine.request_timeout", &config.engine.request_timeout, errors);
        Self::validate_duration(
            "engine.semantic_timeout",
            &config.engine.semantic_timeout,
            errors,
        );
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        let search = &config.search;

        if search.max_page_size == 0 {
            errors.push(ValidationError::new(
                "search.max_page_size",
                "Max page size must be greater than 0",
            ));
        }

        if search.default_page_size == 0 || search.default_page_size > search.max_page_size {
            errors.push(ValidationError::new(
                "search.default_page_size",
                format!(
                    "Default page size must be between 1 and {}, got {}",
                    search.max_page_size, search.default_page_size
                ),
            ));
        }

        if search.max_result_window < search.max_page_size {
            errors.push(ValidationError::new(
                "search.max_result_window",
                format!(
                    "Max result window must be at least max_page_size ({}), got {}",
                    search.max_page_size, search.max_result_window
                ),
            ));
        }

        if search.rank_window_size == 0 {
            errors.push(ValidationError::new(
                "search.rank_window_size",
                "Rank window size must be greater than 0",
            ));
        }

        if search.facet_size == 0 || search.genre_list_size == 0 {
            errors.push(ValidationError::new(
                "search.facet_size",
                "Facet sizes must be greater than 0",
            ));
        }

        if search.similar_max_limit == 0
            || search.similar_default_limit == 0
            || search.similar_default_limit > search.similar_max_limit
        {
            errors.push(ValidationError::new(
                "search.similar_default_limit",
                format!(
                    "Similar default limit must be between 1 and {}, got {}",
                    search.similar_max_limit, search.similar_default_limit
                ),
            ));
        }

        Self::validate_duration("search.availability_ttl", &search.availability_ttl, errors);
    }

    fn validate_server(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.server.bind.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "server.bind",
                format!("Invalid bind address: {}", config.server.bind),
            ));
        }
    }

    fn validate_client(config: &Config, errors: &mut Vec<ValidationError>) {
        if reqwest::Url::parse(&config.client.base_url).is_err() {
            errors.push(ValidationError::new(
                "client.base_url",
                format!("Invalid URL: {}", config.client.base_url),
            ));
        }

        if config.client.page_size == 0 || config.client.page_size > config.search.max_page_size
        {
            errors.push(ValidationError::new(
                "client.page_size",
                format!(
                    "Client page size must be between 1 and {}",
                    config.search.max_page_size
                ),
            ));
        }

        Self::validate_duration("client.debounce", &config.client.debounce, errors);
    }

    fn validate_duration(path: &str, value: &str, errors: &mut Vec<ValidationError>) {
        if parse_duration(value).is_none() {
            errors.push(ValidationError::new(
                path,
                format!("Invalid duration format: {}", value),
            ));
        }
    }
}
