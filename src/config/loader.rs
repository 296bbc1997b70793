//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use regex_lite::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Configuration loader
pub struct ConfigLoader;

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("env var pattern is valid")
    })
}

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from YAML text
    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand `${VAR_NAME}` and `${VAR_NAME:-default}`
    ///
    /// An unset variable without a default is an error, so a placeholder
    /// never ends up as a literal value such as a signing secret.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut unresolved = Vec::new();
        let expanded = env_var_pattern()
            .replace_all(content, |cap: &regex_lite::Captures<'_>| {
                match std::env::var(&cap[1]) {
                    Ok(value) => value,
                    Err(_) => match cap.get(2) {
                        Some(default) => default.as_str().to_string(),
                        None => {
                            unresolved.push(cap[1].to_string());
                            String::new()
                        }
                    },
                }
            })
            .into_owned();

        if !unresolved.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "environment variable(s) not set: {}",
                unresolved.join(", ")
            )));
        }
        Ok(expanded)
    }
}
