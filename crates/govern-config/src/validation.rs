//! Configuration validation
//!
//! Load-time validation covers the governor's own table. Start-section
//! attributes (executable path, working directory) are validated by the
//! activator at start time, so a bad application records its own failure
//! without taking the config down.

use crate::schema::RawConfig;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Application name cannot be blank")]
    BlankName,

    #[error("Duplicate application name: {0}")]
    DuplicateName(String),

    #[error("Application '{name}': {message}")]
    ApplicationError { name: String, message: String },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for app in &config.applications {
        if app.name.trim().is_empty() {
            errors.push(ValidationError::BlankName);
            continue;
        }

        if !seen.insert(&app.name) {
            errors.push(ValidationError::DuplicateName(app.name.clone()));
        }

        // Names travel inside the binding URI and the hello line, so they
        // cannot contain separators used by either.
        if app.name.contains(['/', ' ']) {
            errors.push(ValidationError::ApplicationError {
                name: app.name.clone(),
                message: "name cannot contain '/' or spaces".into(),
            });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_config;
    use crate::ConfigError;

    #[test]
    fn reject_duplicate_names() {
        let config = r#"
            config_version = 1

            [[applications]]
            name = "billing"
            [applications.start]
            executable = "/usr/bin/billing"

            [[applications]]
            name = "billing"
            [applications.start]
            executable = "/usr/bin/billing"
        "#;

        let result = parse_config(config);
        assert!(matches!(
            result,
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn reject_name_with_slash() {
        let config = r#"
            config_version = 1

            [[applications]]
            name = "billing/eu"
            [applications.start]
            executable = "/usr/bin/billing"
        "#;

        let result = parse_config(config);
        assert!(matches!(
            result,
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn blank_executable_passes_load_validation() {
        // Deliberate: the activator reports this failure at start time.
        let config = r#"
            config_version = 1

            [[applications]]
            name = "billing"
            [applications.start]
            executable = ""
        "#;

        assert!(parse_config(config).is_ok());
    }
}
