use crate::config::types::{
    Config, CrawlerConfig, ExtractionConfig, HttpConfig, PdfConfig, TargetConfig,
    MAX_PAGES_CEILING, MIN_DELAY_SECS,
};
use crate::record::ExtractionMethod;
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_target_config(&config.target)?;
    validate_http_config(&config.http)?;
    validate_extraction_config(&config.extraction)?;
    validate_pdf_config(&config.pdf)?;
    Ok(())
}

/// Clamps run limits to their documented bounds
///
/// `max-pages` is capped at [`MAX_PAGES_CEILING`] and `delay` raised to
/// [`MIN_DELAY_SECS`]. Each adjustment is logged and returned.
pub fn apply_limits(config: &mut Config) -> Vec<String> {
    let mut adjustments = Vec::new();

    if config.crawler.max_pages > MAX_PAGES_CEILING {
        adjustments.push(format!(
            "max_pages limited to {} (requested {})",
            MAX_PAGES_CEILING, config.crawler.max_pages
        ));
        config.crawler.max_pages = MAX_PAGES_CEILING;
    }

    if config.crawler.delay < MIN_DELAY_SECS {
        adjustments.push(format!(
            "delay increased to {}s minimum (requested {}s)",
            MIN_DELAY_SECS, config.crawler.delay
        ));
        config.crawler.delay = MIN_DELAY_SECS;
    }

    for adjustment in &adjustments {
        tracing::warn!("{}", adjustment);
    }

    adjustments
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1, got 0".to_string(),
        ));
    }

    if config.concurrency < 1 || config.concurrency > 16 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 16, got {}",
            config.concurrency
        )));
    }

    if config.max_pending < 1 {
        return Err(ConfigError::Validation(
            "max_pending must be >= 1, got 0".to_string(),
        ));
    }

    if !config.delay.is_finite() {
        return Err(ConfigError::Validation(format!(
            "delay must be a finite number of seconds, got {}",
            config.delay
        )));
    }

    Ok(())
}

/// Validates the target site configuration
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    validate_http_url("base_url", &config.base_url)?;

    for url in config
        .start_urls
        .iter()
        .chain(&config.fallback_urls)
        .chain(&config.connectivity_urls)
    {
        validate_http_url("target URL", url)?;
    }

    if config.content_markers.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "content_markers cannot contain empty strings".to_string(),
        ));
    }

    Ok(())
}

/// Validates HTTP client configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    for (name, timeout) in [
        ("page_timeout", config.page_timeout),
        ("connectivity_timeout", config.connectivity_timeout),
        ("pdf_timeout", config.pdf_timeout),
        ("connect_timeout", config.connect_timeout),
    ] {
        if timeout == 0 {
            return Err(ConfigError::Validation(format!("{} must be >= 1s", name)));
        }
    }

    Ok(())
}

/// Validates content extraction configuration
fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    if config.content_selectors.is_empty() {
        return Err(ConfigError::Validation(
            "content_selectors must list at least one selector".to_string(),
        ));
    }

    for selector in &config.content_selectors {
        Selector::parse(selector)
            .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))?;
    }

    if config.body_char_limit == 0 {
        return Err(ConfigError::Validation(
            "body_char_limit must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates PDF configuration
fn validate_pdf_config(config: &PdfConfig) -> Result<(), ConfigError> {
    if config.max_bytes == 0 || config.max_pages == 0 || config.char_limit == 0 {
        return Err(ConfigError::Validation(
            "pdf max_bytes, max_pages and char_limit must all be >= 1".to_string(),
        ));
    }

    if !config.delay.is_finite() || config.delay < 0.0 {
        return Err(ConfigError::Validation(format!(
            "pdf delay must be a non-negative number of seconds, got {}",
            config.delay
        )));
    }

    if config.backends.is_empty() {
        return Err(ConfigError::Validation(
            "pdf backends must list at least one backend".to_string(),
        ));
    }

    for name in &config.backends {
        if ExtractionMethod::from_backend_name(name).is_none() {
            return Err(ConfigError::Validation(format!(
                "unknown pdf backend '{}' (expected 'pdf-extract' or 'lopdf')",
                name
            )));
        }
    }

    Ok(())
}

/// Validates that a string is an absolute http(s) URL with a host
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            field, value
        )));
    }

    Ok(())
}
