//! Environment variable substitution for configuration text
//!
//! Secrets such as tokens and role secret ids are usually injected through
//! the environment rather than written into the config file. Values are
//! referenced with the `${VAR_NAME}` syntax. Whole-line YAML comments are
//! left untouched.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::env;

use crate::config::ConfigError;

/// Regex pattern for matching environment variable references: ${VAR_NAME}
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Substitute environment variable references in configuration text.
///
/// Returns an error listing all missing variables if any are not set.
///
/// # Examples
///
/// ```ignore
/// use vault_cert_storage::env::substitute_env_vars;
///
/// std::env::set_var("VAULT_TOKEN", "dead-beef");
/// let result = substitute_env_vars("token: ${VAULT_TOKEN}").unwrap();
/// assert_eq!(result, "token: dead-beef");
/// ```
pub fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut missing_vars: Vec<String> = Vec::new();

    let lines: Vec<String> = input
        .split('\n')
        .map(|line| {
            if line.trim_start().starts_with('#') {
                return line.to_string();
            }

            ENV_VAR_PATTERN
                .replace_all(line, |caps: &Captures| {
                    let var_name = &caps[1];
                    match env::var(var_name) {
                        Ok(value) => value,
                        Err(_) => {
                            if !missing_vars.iter().any(|v| v == var_name) {
                                missing_vars.push(var_name.to_string());
                            }
                            String::new()
                        }
                    }
                })
                .into_owned()
        })
        .collect();

    if !missing_vars.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Missing environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}
