//! Dialect profiles.
//!
//! A [`PlatformProfile`] is plain data: everything the renderer and the diff
//! compiler need to know about a dialect. The built-in profile is SQLite;
//! other dialects (or SQLite builds with different capabilities) are
//! described by overlaying a TOML document on it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifier::Quoter;
use crate::types::{LogicalType, TypeTemplate, TypeTable};

/// SQLite keywords, from <https://www.sqlite.org/lang_keywords.html>.
const SQLITE_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN",
    "WHERE", "WINDOW", "WITH", "WITHOUT",
];

/// A default expression the dialect evaluates instead of storing literally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultKeyword {
    /// The expression, e.g. `CURRENT_TIMESTAMP`. Matched case-insensitively.
    pub keyword: String,
    /// Column types on which the expression is recognized.
    pub types: Vec<LogicalType>,
}

impl DefaultKeyword {
    fn new(keyword: &str, types: &[LogicalType]) -> Self {
        Self {
            keyword: keyword.to_string(),
            types: types.to_vec(),
        }
    }

    /// Returns true if `text` is this keyword on a column of `logical_type`.
    #[must_use]
    pub fn matches(&self, text: &str, logical_type: LogicalType) -> bool {
        self.keyword.eq_ignore_ascii_case(text.trim()) && self.types.contains(&logical_type)
    }
}

/// Which ALTER TABLE statements the dialect can run natively.
///
/// Anything not covered here is emulated by rebuilding the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// `ALTER TABLE … RENAME TO …`.
    pub rename_table: bool,
    /// `CREATE INDEX` / `DROP INDEX` on an existing table.
    pub index_changes: bool,
    /// `ALTER TABLE … ADD COLUMN …`.
    pub add_column: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            rename_table: true,
            index_changes: true,
            add_column: true,
        }
    }
}

/// What to do with a foreign key whose column is removed by a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DanglingForeignKeyPolicy {
    /// Fail with [`DdlError::DanglingForeignKey`](crate::DdlError::DanglingForeignKey).
    #[default]
    Reject,
    /// Drop the constraint from the rebuilt table and log a warning.
    Drop,
}

/// Everything dialect-specific, as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformProfile {
    /// Dialect name, used in logs.
    pub name: String,
    /// Identifier quote character.
    pub quote_char: char,
    /// Reserved words, uppercase.
    pub reserved_words: BTreeSet<String>,
    /// Quote identifiers that contain uppercase letters.
    pub quote_mixed_case: bool,
    /// Type declarations.
    pub types: TypeTable,
    /// Default expressions rendered verbatim.
    pub default_keywords: Vec<DefaultKeyword>,
    /// Native ALTER TABLE support.
    pub capabilities: Capabilities,
    /// Prefix of the temporary copy made while rebuilding a table.
    pub temp_table_prefix: String,
    /// Handling of foreign keys orphaned by a diff.
    pub dangling_foreign_keys: DanglingForeignKeyPolicy,
}

impl PlatformProfile {
    /// The SQLite profile.
    #[must_use]
    pub fn sqlite() -> Self {
        Self {
            name: "sqlite".to_string(),
            quote_char: '"',
            reserved_words: SQLITE_KEYWORDS.iter().map(ToString::to_string).collect(),
            quote_mixed_case: false,
            types: TypeTable::sqlite(),
            default_keywords: vec![
                DefaultKeyword::new("CURRENT_TIMESTAMP", &[LogicalType::DateTime]),
                DefaultKeyword::new("CURRENT_DATE", &[LogicalType::Date]),
                DefaultKeyword::new("CURRENT_TIME", &[LogicalType::Time]),
            ],
            capabilities: Capabilities::default(),
            temp_table_prefix: "__temp__".to_string(),
            dangling_foreign_keys: DanglingForeignKeyPolicy::Reject,
        }
    }

    /// Parses a TOML document and overlays it on the SQLite profile.
    ///
    /// Top-level keys replace the SQLite values. `extra_reserved_words` is
    /// added to the reserved words, and entries under `[types]` replace the
    /// declaration of that one logical type.
    ///
    /// ```toml
    /// name = "sqlite-legacy"
    /// extra_reserved_words = ["USER"]
    /// dangling_foreign_keys = "drop"
    ///
    /// [capabilities]
    /// add_column = false
    ///
    /// [types.json]
    /// kind = "plain"
    /// sql = "TEXT"
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let overlay: ProfileOverlay = toml::from_str(source)?;
        Ok(overlay.apply(Self::sqlite()))
    }

    /// Returns the identifier quoter for this dialect.
    #[must_use]
    pub fn quoter(&self) -> Quoter<'_> {
        Quoter::new(self.quote_char, &self.reserved_words, self.quote_mixed_case)
    }

    /// Finds the keyword expression `text` stands for on a column of
    /// `logical_type`, if any.
    #[must_use]
    pub fn default_keyword(&self, text: &str, logical_type: LogicalType) -> Option<&DefaultKeyword> {
        self.default_keywords
            .iter()
            .find(|keyword| keyword.matches(text, logical_type))
    }
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self::sqlite()
    }
}

/// TOML overlay; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProfileOverlay {
    name: Option<String>,
    quote_char: Option<char>,
    reserved_words: Option<Vec<String>>,
    extra_reserved_words: Vec<String>,
    quote_mixed_case: Option<bool>,
    autoincrement: Option<String>,
    types: BTreeMap<LogicalType, TypeTemplate>,
    default_keywords: Option<Vec<DefaultKeyword>>,
    capabilities: Option<Capabilities>,
    temp_table_prefix: Option<String>,
    dangling_foreign_keys: Option<DanglingForeignKeyPolicy>,
}

impl ProfileOverlay {
    fn apply(self, mut profile: PlatformProfile) -> PlatformProfile {
        if let Some(name) = self.name {
            profile.name = name;
        }
        if let Some(quote_char) = self.quote_char {
            profile.quote_char = quote_char;
        }
        if let Some(words) = self.reserved_words {
            profile.reserved_words = words.iter().map(|w| w.to_ascii_uppercase()).collect();
        }
        profile
            .reserved_words
            .extend(self.extra_reserved_words.iter().map(|w| w.to_ascii_uppercase()));
        if let Some(quote_mixed_case) = self.quote_mixed_case {
            profile.quote_mixed_case = quote_mixed_case;
        }
        if let Some(autoincrement) = self.autoincrement {
            profile.types.autoincrement = autoincrement;
        }
        profile.types.types.extend(self.types);
        if let Some(keywords) = self.default_keywords {
            profile.default_keywords = keywords;
        }
        if let Some(capabilities) = self.capabilities {
            profile.capabilities = capabilities;
        }
        if let Some(prefix) = self.temp_table_prefix {
            profile.temp_table_prefix = prefix;
        }
        if let Some(policy) = self.dangling_foreign_keys {
            profile.dangling_foreign_keys = policy;
        }
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DdlError;
    use crate::types::TypeOptions;

    #[test]
    fn test_sqlite_reserved_words() {
        let profile = PlatformProfile::sqlite();
        let quoter = profile.quoter();
        for word in ["key", "like", "create", "select", "table", "where", "from", "and"] {
            assert!(quoter.is_reserved(word), "{word} should be reserved");
        }
        for word in ["user", "comment", "id", "client", "article"] {
            assert!(!quoter.is_reserved(word), "{word} should not be reserved");
        }
    }

    #[test]
    fn test_default_keywords_are_type_bound() {
        let profile = PlatformProfile::sqlite();
        assert!(profile
            .default_keyword("CURRENT_DATE", LogicalType::Date)
            .is_some());
        assert!(profile
            .default_keyword("current_timestamp", LogicalType::DateTime)
            .is_some());
        assert!(profile
            .default_keyword("CURRENT_DATE", LogicalType::String)
            .is_none());
        assert!(profile.default_keyword("NOW()", LogicalType::Date).is_none());
    }

    #[test]
    fn test_empty_overlay_is_sqlite() {
        let profile = PlatformProfile::from_toml_str("").unwrap();
        assert_eq!(profile, PlatformProfile::sqlite());
    }

    #[test]
    fn test_overlay() {
        let profile = PlatformProfile::from_toml_str(
            r#"
            name = "sqlite-legacy"
            extra_reserved_words = ["user"]
            dangling_foreign_keys = "drop"

            [capabilities]
            add_column = false

            [types.json]
            kind = "plain"
            sql = "TEXT"
            "#,
        )
        .unwrap();

        assert_eq!(profile.name, "sqlite-legacy");
        assert!(profile.quoter().is_reserved("user"));
        assert!(profile.quoter().is_reserved("select"));
        assert_eq!(profile.dangling_foreign_keys, DanglingForeignKeyPolicy::Drop);
        assert!(!profile.capabilities.add_column);
        assert!(profile.capabilities.rename_table);
        assert_eq!(
            profile
                .types
                .map_type(LogicalType::Json, &TypeOptions::default())
                .unwrap(),
            "TEXT"
        );
        assert_eq!(
            profile
                .types
                .map_type(LogicalType::Text, &TypeOptions::default())
                .unwrap(),
            "CLOB"
        );
    }

    #[test]
    fn test_overlay_rejects_unknown_keys() {
        let result = PlatformProfile::from_toml_str("quote_character = '`'");
        assert!(matches!(result, Err(DdlError::Config(_))));
    }
}
