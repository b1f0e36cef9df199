//! Error types for DDL rendering and diff compilation.

/// Errors that can occur while rendering a table or compiling a table diff.
#[derive(Debug, thiserror::Error)]
pub enum DdlError {
    /// A logical type the platform has no declaration for.
    #[error("Unsupported column type '{0}'")]
    UnsupportedType(String),

    /// A change the dialect cannot express, even by rebuilding the table.
    #[error("Unsupported alteration of table '{table}': {reason}")]
    UnsupportedAlteration {
        /// The table being altered.
        table: String,
        /// Why the alteration is impossible.
        reason: String,
    },

    /// A diff references a column that does not exist in the table.
    #[error("There is no column with name '{column}' on table '{table}'")]
    ColumnNotFound {
        /// The table being altered.
        table: String,
        /// The missing column.
        column: String,
    },

    /// A diff references an index that does not exist in the table.
    #[error("There is no index with name '{index}' on table '{table}'")]
    IndexNotFound {
        /// The table being altered.
        table: String,
        /// The missing index.
        index: String,
    },

    /// A diff references a foreign key that does not exist in the table.
    #[error("There is no foreign key with name '{foreign_key}' on table '{table}'")]
    ForeignKeyNotFound {
        /// The table being altered.
        table: String,
        /// The missing foreign key.
        foreign_key: String,
    },

    /// A foreign key lost one of its columns without being dropped.
    #[error(
        "Foreign key '{foreign_key}' on table '{table}' references removed column '{column}'"
    )]
    DanglingForeignKey {
        /// The table being altered.
        table: String,
        /// The orphaned constraint.
        foreign_key: String,
        /// The removed column it still references.
        column: String,
    },

    /// A table definition violates a structural invariant.
    #[error("Invalid schema for table '{table}': {reason}")]
    InvalidSchema {
        /// The offending table.
        table: String,
        /// The violated invariant.
        reason: String,
    },

    /// A table diff is self-contradictory.
    #[error("Invalid diff for table '{table}': {reason}")]
    InvalidDiff {
        /// The table being altered.
        table: String,
        /// The contradiction.
        reason: String,
    },

    /// A dialect profile could not be parsed.
    #[error("Invalid platform profile: {0}")]
    Config(#[from] toml::de::Error),
}

impl DdlError {
    pub(crate) fn invalid_schema(table: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_diff(table: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDiff {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported_alteration(table: &str, reason: impl Into<String>) -> Self {
        Self::UnsupportedAlteration {
            table: table.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for DDL operations.
pub type Result<T> = std::result::Result<T, DdlError>;
