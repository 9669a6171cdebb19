use std::fmt;

use crate::model::BlockId;

/// Machine-readable error codes for callers that branch on failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    MissingIdentity,
    InvalidInput,
    BlockNotFound,
    DuplicateProperty,
    ConcurrencyConflict,
    DepthLimitExceeded,
    StorageFailure,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::MissingIdentity => "E1003",
            Self::InvalidInput => "E2001",
            Self::BlockNotFound => "E2002",
            Self::DuplicateProperty => "E2003",
            Self::ConcurrencyConflict => "E3001",
            Self::DepthLimitExceeded => "E3002",
            Self::StorageFailure => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::MissingIdentity => "User identity required",
            Self::InvalidInput => "Invalid input",
            Self::BlockNotFound => "Block not found",
            Self::DuplicateProperty => "Duplicate property name",
            Self::ConcurrencyConflict => "Block was modified concurrently",
            Self::DepthLimitExceeded => "Tree depth limit exceeded",
            Self::StorageFailure => "Storage failure",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `qr init` to create the block store."),
            Self::ConfigParseError => Some("Fix syntax in .quire/config.toml and retry."),
            Self::MissingIdentity => Some("Set --user or the QUIRE_USER environment variable."),
            Self::InvalidInput => None,
            Self::BlockNotFound => Some("Use `qr roots --workspace <id>` to list live blocks."),
            Self::DuplicateProperty => Some("Use `qr prop set` to change an existing property."),
            Self::ConcurrencyConflict => {
                Some("Re-read the block and retry with its current version.")
            }
            Self::DepthLimitExceeded => {
                Some("Raise [tree] max_depth or check the hierarchy for parent cycles.")
            }
            Self::StorageFailure => Some("The operation was rolled back; retry once."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure taxonomy for block repository and tree materializer operations.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    /// Missing or malformed required fields. Nothing was written.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The block does not exist, or is soft-deleted in a default-scope read.
    #[error("block not found: '{0}'")]
    NotFound(String),

    /// A property with this name is already attached to the block.
    #[error("property '{name}' already exists on block '{block_id}'")]
    DuplicateProperty { block_id: BlockId, name: String },

    /// The caller's expected version did not match the stored version.
    #[error("block '{block_id}' is at version {actual}, expected {expected}")]
    ConcurrencyConflict {
        block_id: BlockId,
        expected: i64,
        actual: i64,
    },

    /// Traversal from `root_id` went deeper than the configured cap.
    #[error("tree under '{root_id}' exceeds max depth {limit}")]
    DepthLimitExceeded { root_id: BlockId, limit: u32 },

    /// Transaction or connectivity failure. The enclosing operation was rolled back.
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl BlockError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub(crate) fn not_found(id: impl fmt::Display) -> Self {
        Self::NotFound(id.to_string())
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::NotFound(_) => ErrorCode::BlockNotFound,
            Self::DuplicateProperty { .. } => ErrorCode::DuplicateProperty,
            Self::ConcurrencyConflict { .. } => ErrorCode::ConcurrencyConflict,
            Self::DepthLimitExceeded { .. } => ErrorCode::DepthLimitExceeded,
            Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether the caller caused the failure (as opposed to the store).
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::NotFound(_)
                | Self::DuplicateProperty { .. }
                | Self::ConcurrencyConflict { .. }
        )
    }
}

pub type BlockResult<T> = Result<T, BlockError>;

#[cfg(test)]
mod tests {
    use super::{BlockError, ErrorCode};
    use std::collections::HashSet;
    use uuid::Uuid;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::MissingIdentity,
            ErrorCode::InvalidInput,
            ErrorCode::BlockNotFound,
            ErrorCode::DuplicateProperty,
            ErrorCode::ConcurrencyConflict,
            ErrorCode::DepthLimitExceeded,
            ErrorCode::StorageFailure,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::ConcurrencyConflict.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn block_errors_map_to_codes() {
        let id = Uuid::nil();
        assert_eq!(
            BlockError::not_found(id).code(),
            ErrorCode::BlockNotFound
        );
        assert_eq!(
            BlockError::DepthLimitExceeded {
                root_id: id,
                limit: 4
            }
            .code(),
            ErrorCode::DepthLimitExceeded
        );
        assert_eq!(
            BlockError::Storage(rusqlite::Error::InvalidQuery).code(),
            ErrorCode::StorageFailure
        );
    }

    #[test]
    fn storage_failures_are_not_caller_errors() {
        assert!(BlockError::invalid("type is required").is_caller_error());
        assert!(!BlockError::Storage(rusqlite::Error::InvalidQuery).is_caller_error());
        assert!(
            !BlockError::DepthLimitExceeded {
                root_id: uuid::Uuid::nil(),
                limit: 1
            }
            .is_caller_error()
        );
    }

    #[test]
    fn display_names_the_block() {
        let err = BlockError::ConcurrencyConflict {
            block_id: Uuid::nil(),
            expected: 2,
            actual: 3,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("version 3"));
        assert!(rendered.contains("expected 2"));
    }
}
