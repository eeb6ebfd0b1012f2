//! Environment variable loading with precise diagnostics
//!
//! Startup configuration comes from the environment (optionally seeded from
//! a `.env` file). A missing required variable is a startup failure naming
//! the variable, never a silent default.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Read a required environment variable
pub fn required_var(name: &'static str) -> Result<String, EnvError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(EnvError::Missing(name)),
    }
}

/// Read an optional environment variable, trimming empty values to None
pub fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_var_names_the_variable() {
        let err = required_var("SPLICE_TEST_SURELY_UNSET").unwrap_err();
        assert!(err.to_string().contains("SPLICE_TEST_SURELY_UNSET"));
    }

    #[test]
    fn test_optional_var_filters_empty() {
        std::env::set_var("SPLICE_TEST_EMPTY", "  ");
        assert_eq!(optional_var("SPLICE_TEST_EMPTY"), None);
        std::env::remove_var("SPLICE_TEST_EMPTY");
    }
}
