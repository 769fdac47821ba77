//! Request validation backed by garde.

use crate::domain::DomainError;
use garde::{Report, Validate};

/// Run garde validation and fold every failure into one `ValidationError`.
pub fn validate_request<T>(request: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    request
        .validate()
        .map_err(|report| DomainError::ValidationError(describe(&report)))
}

fn describe(report: &Report) -> String {
    let mut parts = Vec::new();
    for (path, error) in report.iter() {
        let path = path.to_string();
        if path.is_empty() {
            parts.push(error.message().to_string());
        } else {
            parts.push(format!("{}: {}", path, error.message()));
        }
    }
    parts.join("; ")
}
