use std::{collections::HashMap, net::SocketAddr};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::models::{AppConfig, ServiceConfig};

static ROUTE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[[:word:]]+$").expect("valid regex"));

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Non-fatal findings. The configuration is usable as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// A route name is declared by more than one service; the last one wins.
    DuplicateName {
        name: String,
        services: Vec<String>,
        winner: String,
    },
    NoServices,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::DuplicateName {
                name,
                services,
                winner,
            } => write!(
                f,
                "route name '{name}' is declared by services [{}]; requests go to '{winner}'",
                services.join(", ")
            ),
            ValidationWarning::NoServices => {
                write!(f, "no services configured; every request will be answered with 404")
            }
        }
    }
}

/// Application configuration validator
pub struct AppConfigValidator;

impl AppConfigValidator {
    /// Validate the entire configuration, returning warnings when it is usable.
    pub fn validate(config: &AppConfig) -> ValidationResult<Vec<ValidationWarning>> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        for (key, service) in &config.services {
            if let Err(mut service_errors) = Self::validate_service(key, service) {
                errors.append(&mut service_errors);
            }
        }

        if !errors.is_empty() {
            return Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            });
        }

        let mut warnings = Self::find_duplicate_names(config);
        if config.services.is_empty() {
            warnings.push(ValidationWarning::NoServices);
        }
        Ok(warnings)
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_service(key: &str, service: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if service.names().is_empty() {
            errors.push(ValidationError::MissingField {
                field: format!("services.{key}.names"),
            });
        }

        for name in service.names() {
            if !ROUTE_NAME_RE.is_match(name) {
                errors.push(ValidationError::InvalidField {
                    field: format!("services.{key}.names"),
                    message: format!(
                        "'{name}' is not reachable: names may only contain letters, digits and '_'"
                    ),
                });
            }
        }

        if let ServiceConfig::Static { root, .. } = service
            && root.as_os_str().is_empty()
        {
            errors.push(ValidationError::MissingField {
                field: format!("services.{key}.root"),
            });
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn find_duplicate_names(config: &AppConfig) -> Vec<ValidationWarning> {
        let mut owners: HashMap<&str, Vec<String>> = HashMap::new();
        let mut order = Vec::new();
        for (key, name) in config.declared_names() {
            let entry = owners.entry(name).or_insert_with(|| {
                order.push(name);
                Vec::new()
            });
            entry.push(key.to_string());
        }

        order
            .into_iter()
            .filter_map(|name| {
                let services = owners.remove(name)?;
                if services.len() < 2 {
                    return None;
                }
                let winner = services.last()?.clone();
                Some(ValidationWarning::DuplicateName {
                    name: name.to_string(),
                    services,
                    winner,
                })
            })
            .collect()
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        errors
            .iter()
            .enumerate()
            .map(|(i, e)| format!("  {}. {e}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
