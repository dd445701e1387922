use crate::config::types::{Config, RunInput};
use crate::config::validation::{apply_limits, validate};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// The configuration is validated and its run limits are clamped.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use site_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Max pages: {}", config.crawler.max_pages);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses, validates and clamps a configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(content)?;
    prepare(&mut config)?;
    Ok(config)
}

/// Validates a configuration and clamps its run limits
///
/// Call again after applying overrides; clamping is idempotent.
pub fn prepare(config: &mut Config) -> Result<(), ConfigError> {
    validate(config)?;
    apply_limits(config);
    Ok(())
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash identifies the configuration a dataset was produced with.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Reads a run input JSON object from a file
pub fn load_run_input(path: &Path) -> Result<RunInput, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

impl RunInput {
    /// Applies the present keys of this input on top of `config`
    ///
    /// The result still needs [`prepare`] to clamp it.
    pub fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(max_pages) = self.max_pages {
            if max_pages < 1 {
                return Err(ConfigError::Validation(format!(
                    "max_pages must be >= 1, got {}",
                    max_pages
                )));
            }
            config.crawler.max_pages = u32::try_from(max_pages).unwrap_or(u32::MAX);
        }

        if let Some(delay) = self.delay {
            config.crawler.delay = delay;
        }

        if let Some(extract_pdfs) = self.extract_pdfs {
            config.crawler.extract_pdfs = extract_pdfs;
        }

        Ok(())
    }
}
