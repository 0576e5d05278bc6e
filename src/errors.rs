use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ErpError>;

#[derive(Debug, Error)]
pub enum ErpError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("invalid credentials or no role assigned")]
    NoRoleAssigned,
    #[error("authentication required")]
    Unauthenticated,
    #[error("permission denied: {0}")]
    Forbidden(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("a student with email {0} already exists")]
    DuplicateEmail(String),
    #[error("receipt number not available for this payment")]
    MissingReceiptNumber,
    #[error("confirmation required before deleting {0}")]
    ConfirmationRequired(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("{0}")]
    PartialFailure(PartialFailure),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Outcome of a two-step write that did not complete cleanly.
///
/// `inserted && !deleted` is the dangerous case: the record now exists in
/// both the source and the destination table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PartialFailure {
    pub operation: String,
    pub inserted: bool,
    pub deleted: bool,
    pub cause: String,
}

impl PartialFailure {
    pub fn is_partial(&self) -> bool {
        self.inserted && !self.deleted
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} incomplete (inserted: {}, deleted: {}): {}",
            self.operation, self.inserted, self.deleted, self.cause
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Auth,
    Read,
    Validation,
    PartialFailure,
    Internal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Error,
    Critical,
}

/// A user-facing toast derived from an operation result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notice {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Info,
        }
    }
}

impl ErpError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidCredentials
            | Self::NoRoleAssigned
            | Self::Unauthenticated
            | Self::Forbidden(_) => ErrorClass::Auth,
            Self::Validation(_)
            | Self::DuplicateEmail(_)
            | Self::MissingReceiptNumber
            | Self::ConfirmationRequired(_) => ErrorClass::Validation,
            Self::NotFound(_) | Self::Unavailable(_) | Self::Backend(_) => ErrorClass::Read,
            Self::PartialFailure(_) => ErrorClass::PartialFailure,
            Self::Serialization(_) | Self::Internal(_) => ErrorClass::Internal,
        }
    }

    pub fn severity(&self) -> Severity {
        match self.class() {
            ErrorClass::PartialFailure => Severity::Critical,
            _ => Severity::Error,
        }
    }

    /// Whether the session must be cleared after this error.
    pub fn clears_session(&self) -> bool {
        matches!(self, Self::NoRoleAssigned | Self::Unauthenticated)
    }

    pub fn notice(&self, title: &str) -> Notice {
        let title = match self.class() {
            ErrorClass::PartialFailure => format!("{title}: manual cleanup needed"),
            _ => title.to_string(),
        };
        Notice {
            title,
            description: self.to_string(),
            severity: self.severity(),
        }
    }
}

pub fn ensure(condition: bool, error: ErpError) -> ServiceResult<()> {
    if condition { Ok(()) } else { Err(error) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_outranks_clean_failure() {
        let partial = ErpError::PartialFailure(PartialFailure {
            operation: "approve".into(),
            inserted: true,
            deleted: false,
            cause: "delete timed out".into(),
        });
        let clean = ErpError::Backend("insert rejected".into());
        assert!(partial.severity() > clean.severity());
        assert!(partial.notice("Approval").title.contains("manual cleanup"));
        assert_eq!(clean.notice("Approval").title, "Approval");
    }

    #[test]
    fn validation_errors_classified_before_network() {
        assert_eq!(
            ErpError::DuplicateEmail("a@b.co".into()).class(),
            ErrorClass::Validation
        );
        assert_eq!(ErpError::MissingReceiptNumber.class(), ErrorClass::Validation);
        assert_eq!(ErpError::NoRoleAssigned.class(), ErrorClass::Auth);
        assert!(ErpError::NoRoleAssigned.clears_session());
    }
}
