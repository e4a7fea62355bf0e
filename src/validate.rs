//! Shape checks on user input, run before any network call

use regex::Regex;
use thiserror::Error;

use crate::config::Token;

/// Tokens shorter than this are rejected outright
pub const MIN_TOKEN_LENGTH: usize = 10;

const ORGANIZATION_NAME_PATTERN: &str = r"^[a-zA-Z0-9-]+$";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("token cannot be empty")]
    EmptyToken,

    #[error("token appears to be too short")]
    TokenTooShort,

    #[error("organization name cannot be empty")]
    EmptyOrganization,

    #[error("invalid organization name format: {0} (only letters, digits and hyphens are allowed)")]
    InvalidOrganization(String),

    #[error("group ID cannot be empty")]
    EmptyGroupId,

    #[error("group ID must be a valid integer: {0}")]
    InvalidGroupId(String),
}

pub fn validate_token(token: &Token) -> Result<(), ValidationError> {
    if token.is_empty() {
        return Err(ValidationError::EmptyToken);
    }
    if token.expose().chars().count() < MIN_TOKEN_LENGTH {
        return Err(ValidationError::TokenTooShort);
    }
    Ok(())
}

pub fn validate_organization_name(org: &str) -> Result<(), ValidationError> {
    if org.is_empty() {
        return Err(ValidationError::EmptyOrganization);
    }

    let valid = Regex::new(ORGANIZATION_NAME_PATTERN)
        .map(|pattern| pattern.is_match(org))
        .unwrap_or(false);

    if !valid {
        return Err(ValidationError::InvalidOrganization(org.to_string()));
    }
    Ok(())
}

/// Parse a GitLab numeric group identifier
pub fn parse_group_id(value: &str) -> Result<u64, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyGroupId);
    }

    value
        .parse::<u64>()
        .map_err(|_| ValidationError::InvalidGroupId(value.to_string()))
}
