use url::Url;

/// Validation results with specific error messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    /// Turn a failed validation into an error built from its message
    pub fn or_else<E>(self, make_error: impl FnOnce(String) -> E) -> Result<(), E> {
        if self.is_valid {
            Ok(())
        } else {
            Err(make_error(self.error.unwrap_or_else(|| "Validation failed".to_string())))
        }
    }
}

/// Validate an HTTP/HTTPS URL endpoint
pub fn validate_http_endpoint(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Target cannot be empty");
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return ValidationResult::err(format!(
                    "Invalid scheme '{scheme}'. Must be http or https"
                ));
            }

            if url.host_str().is_none() {
                return ValidationResult::err("URL must have a valid host");
            }

            ValidationResult::ok()
        }
        Err(e) => {
            // If it fails to parse, check if it's missing a scheme
            if !target.contains("://") {
                ValidationResult::err("URL must include scheme (http:// or https://)")
            } else {
                ValidationResult::err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Validate a monitor display name
pub fn validate_monitor_name(name: &str) -> ValidationResult {
    const MAX_NAME_LENGTH: usize = 100;

    if name.trim().is_empty() {
        return ValidationResult::err("Name cannot be empty");
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return ValidationResult::err(format!(
            "Name is too long (maximum {MAX_NAME_LENGTH} characters)"
        ));
    }

    ValidationResult::ok()
}
