//! Logical column types and their mapping to dialect type declarations.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DdlError, Result};

/// Platform-neutral column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    /// True/false.
    Boolean,
    /// 32-bit integer.
    Integer,
    /// 16-bit integer.
    SmallInt,
    /// 64-bit integer.
    BigInt,
    /// Exact numeric with precision and scale.
    Decimal,
    /// Double precision floating point.
    Float,
    /// Character string, variable or fixed width.
    String,
    /// Large text.
    Text,
    /// Binary string.
    Binary,
    /// Large binary object.
    Blob,
    /// Date without time.
    Date,
    /// Time without date.
    Time,
    /// Date and time.
    DateTime,
    /// UUID.
    Guid,
    /// JSON document.
    Json,
}

impl LogicalType {
    /// All logical types.
    pub const ALL: [Self; 15] = [
        Self::Boolean,
        Self::Integer,
        Self::SmallInt,
        Self::BigInt,
        Self::Decimal,
        Self::Float,
        Self::String,
        Self::Text,
        Self::Binary,
        Self::Blob,
        Self::Date,
        Self::Time,
        Self::DateTime,
        Self::Guid,
        Self::Json,
    ];

    /// Returns the canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::SmallInt => "smallint",
            Self::BigInt => "bigint",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::String => "string",
            Self::Text => "text",
            Self::Binary => "binary",
            Self::Blob => "blob",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::Guid => "guid",
            Self::Json => "json",
        }
    }

    /// Returns true for integer, smallint and bigint.
    #[must_use]
    pub fn is_integer_family(self) -> bool {
        matches!(self, Self::Integer | Self::SmallInt | Self::BigInt)
    }

    /// Returns true for types whose literals are written unquoted.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        self.is_integer_family() || matches!(self, Self::Decimal | Self::Float)
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogicalType {
    type Err = DdlError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.name() == lower)
            .ok_or_else(|| DdlError::UnsupportedType(s.to_string()))
    }
}

/// Options that influence a type declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeOptions {
    /// Maximum length for strings and binaries.
    pub length: Option<u32>,
    /// Total digits for decimals.
    pub precision: Option<u32>,
    /// Fractional digits for decimals.
    pub scale: Option<u32>,
    /// Unsigned integer.
    pub unsigned: bool,
    /// Fixed-width string.
    pub fixed: bool,
    /// Auto-incrementing integer.
    pub autoincrement: bool,
    /// Column belongs to the primary key.
    pub primary: bool,
}

/// How one logical type is declared by a dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeTemplate {
    /// A declaration that ignores every option.
    Plain {
        /// The declaration.
        sql: String,
    },
    /// An integer declaration that honours `unsigned` and `autoincrement`.
    Integer {
        /// The declaration.
        sql: String,
    },
    /// A character declaration with an optional length.
    Character {
        /// Variable-width name, e.g. `VARCHAR`.
        variable: String,
        /// Fixed-width name, e.g. `CHAR`.
        fixed: String,
    },
    /// An exact numeric declaration with precision and scale.
    Numeric {
        /// The declaration name, e.g. `NUMERIC`.
        sql: String,
        /// Precision used when none is given.
        default_precision: u32,
        /// Scale used when none is given.
        default_scale: u32,
    },
}

impl TypeTemplate {
    fn plain(sql: &str) -> Self {
        Self::Plain {
            sql: sql.to_string(),
        }
    }

    fn integer(sql: &str) -> Self {
        Self::Integer {
            sql: sql.to_string(),
        }
    }
}

/// Logical type to declaration dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTable {
    /// Declaration used for every auto-incrementing integer column.
    pub autoincrement: String,
    /// Per-type templates.
    pub types: BTreeMap<LogicalType, TypeTemplate>,
}

impl TypeTable {
    /// The SQLite declarations.
    #[must_use]
    pub fn sqlite() -> Self {
        let types = BTreeMap::from([
            (LogicalType::Boolean, TypeTemplate::plain("BOOLEAN")),
            (LogicalType::Integer, TypeTemplate::integer("INTEGER")),
            (LogicalType::SmallInt, TypeTemplate::integer("SMALLINT")),
            (LogicalType::BigInt, TypeTemplate::integer("BIGINT")),
            (
                LogicalType::Decimal,
                TypeTemplate::Numeric {
                    sql: "NUMERIC".to_string(),
                    default_precision: 10,
                    default_scale: 0,
                },
            ),
            (LogicalType::Float, TypeTemplate::plain("DOUBLE PRECISION")),
            (
                LogicalType::String,
                TypeTemplate::Character {
                    variable: "VARCHAR".to_string(),
                    fixed: "CHAR".to_string(),
                },
            ),
            (LogicalType::Text, TypeTemplate::plain("CLOB")),
            (LogicalType::Binary, TypeTemplate::plain("BLOB")),
            (LogicalType::Blob, TypeTemplate::plain("BLOB")),
            (LogicalType::Date, TypeTemplate::plain("DATE")),
            (LogicalType::Time, TypeTemplate::plain("TIME")),
            (LogicalType::DateTime, TypeTemplate::plain("DATETIME")),
            (LogicalType::Guid, TypeTemplate::plain("CHAR(36)")),
            (LogicalType::Json, TypeTemplate::plain("CLOB")),
        ]);

        Self {
            autoincrement: "INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
            types,
        }
    }

    /// Maps a logical type to its declaration.
    ///
    /// Any integer-family type with `autoincrement` set maps to the
    /// surrogate [`TypeTable::autoincrement`] declaration, whatever its width
    /// or signedness.
    pub fn map_type(&self, logical_type: LogicalType, options: &TypeOptions) -> Result<String> {
        let template = self
            .types
            .get(&logical_type)
            .ok_or_else(|| DdlError::UnsupportedType(logical_type.to_string()))?;

        if options.autoincrement && logical_type.is_integer_family() {
            return Ok(self.autoincrement.clone());
        }

        let sql = match template {
            TypeTemplate::Plain { sql } => sql.clone(),
            TypeTemplate::Integer { sql } => {
                if options.unsigned {
                    format!("{sql} UNSIGNED")
                } else {
                    sql.clone()
                }
            }
            TypeTemplate::Character { variable, fixed } => {
                let name = if options.fixed { fixed } else { variable };
                match options.length {
                    Some(length) if length > 0 => format!("{name}({length})"),
                    _ => name.clone(),
                }
            }
            TypeTemplate::Numeric {
                sql,
                default_precision,
                default_scale,
            } => format!(
                "{sql}({}, {})",
                options.precision.unwrap_or(*default_precision),
                options.scale.unwrap_or(*default_scale)
            ),
        };

        Ok(sql)
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::sqlite()
    }
}
