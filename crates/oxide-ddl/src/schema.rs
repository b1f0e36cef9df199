//! Schema representation types.
//!
//! These types describe a table the way the schema-management layer sees it,
//! independent of any SQL dialect. A [`Table`] is validated when it is built
//! and is never mutated afterwards; altering a table produces a new value.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{DdlError, Result};
use crate::identifier::{generate_identifier_name, name_key, same_name};
use crate::types::{LogicalType, TypeOptions};

/// Maximum length of generated index and constraint names.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Name of the primary key index.
pub const PRIMARY_KEY_NAME: &str = "primary";

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// Text default. Rendered as a quoted literal unless the dialect
    /// recognizes it as a keyword expression such as `CURRENT_DATE`.
    Text(String),
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for DefaultValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for DefaultValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// Schema definition for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Logical data type.
    #[serde(rename = "type")]
    pub logical_type: LogicalType,
    /// Whether the column allows NULL values.
    #[serde(default)]
    pub nullable: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Maximum length for strings and binaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    /// Total digits for decimals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    /// Fractional digits for decimals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// Unsigned integer.
    #[serde(default)]
    pub unsigned: bool,
    /// Auto-incrementing integer.
    #[serde(default)]
    pub autoincrement: bool,
    /// Fixed-width string.
    #[serde(default)]
    pub fixed: bool,
    /// Collation name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Free-form comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Column {
    /// Creates a NOT NULL column without a default.
    #[must_use]
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: false,
            default: None,
            length: None,
            precision: None,
            scale: None,
            unsigned: false,
            autoincrement: false,
            fixed: false,
            collation: None,
            comment: None,
        }
    }

    /// Sets the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<DefaultValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the maximum length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Sets the column as unsigned.
    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// Sets the column as fixed width.
    #[must_use]
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Returns a copy of this column under another name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Returns true if both columns are defined identically, ignoring names.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.renamed(other.name.clone()) == *other
    }

    /// Returns the type options of this column.
    #[must_use]
    pub fn type_options(&self, primary: bool) -> TypeOptions {
        TypeOptions {
            length: self.length,
            precision: self.precision,
            scale: self.scale,
            unsigned: self.unsigned,
            fixed: self.fixed,
            autoincrement: self.autoincrement,
            primary,
        }
    }
}

/// Schema definition for an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    /// Index name. Left empty, a name is generated when the table is built.
    #[serde(default)]
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    #[serde(default)]
    pub unique: bool,
    /// Whether this is the primary key.
    #[serde(default)]
    pub primary: bool,
    /// Partial index condition (WHERE clause).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Index {
    /// Creates a non-unique index.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            primary: false,
            condition: None,
        }
    }

    /// Creates a primary key index.
    #[must_use]
    pub fn primary_key<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unique: true,
            primary: true,
            ..Self::new(PRIMARY_KEY_NAME, columns)
        }
    }

    /// Sets the index as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets a partial index condition.
    #[must_use]
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Returns true if the index covers exactly these columns, in order.
    #[must_use]
    pub fn spans_columns(&self, columns: &[String]) -> bool {
        self.columns.len() == columns.len()
            && self
                .columns
                .iter()
                .zip(columns)
                .all(|(a, b)| same_name(a, b))
    }

    /// Returns true if `other` makes this index redundant.
    ///
    /// `other` must cover the same columns in the same order and be at least
    /// as strict (unique, primary) as this index.
    #[must_use]
    pub fn is_fulfilled_by(&self, other: &Self) -> bool {
        if !other.spans_columns(&self.columns) {
            return false;
        }
        if self.unique && !other.unique {
            return false;
        }
        if self.primary && !other.primary {
            return false;
        }
        self.condition == other.condition
    }
}

/// Schema definition for a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name. Left empty, a name is generated when the table is
    /// built.
    #[serde(default)]
    pub name: String,
    /// Column(s) in the referencing table.
    pub columns: Vec<String>,
    /// Referenced table name.
    pub foreign_table: String,
    /// Referenced column(s).
    pub foreign_columns: Vec<String>,
    /// Whether enforcement may be deferred to commit.
    #[serde(default)]
    pub deferrable: bool,
    /// Whether enforcement is deferred by default.
    #[serde(default)]
    pub deferred: bool,
    /// Action on update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ForeignKeyAction>,
    /// Action on delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ForeignKeyAction>,
}

impl ForeignKey {
    /// Creates an unnamed, immediate foreign key.
    #[must_use]
    pub fn new<L, F, S>(columns: L, foreign_table: impl Into<String>, foreign_columns: F) -> Self
    where
        L: IntoIterator<Item = S>,
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: String::new(),
            columns: columns.into_iter().map(Into::into).collect(),
            foreign_table: foreign_table.into(),
            foreign_columns: foreign_columns.into_iter().map(Into::into).collect(),
            deferrable: false,
            deferred: false,
            on_update: None,
            on_delete: None,
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Marks the constraint as deferrable.
    #[must_use]
    pub fn deferrable(mut self) -> Self {
        self.deferrable = true;
        self
    }

    /// Marks the constraint as initially deferred.
    #[must_use]
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = Some(action);
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = Some(action);
        self
    }
}

/// Plain, unvalidated parts of a [`Table`].
///
/// This is the serialized form of a table; [`Table::from_parts`] turns it
/// into a validated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableParts {
    /// Table name.
    pub name: String,
    /// Column definitions, in physical order.
    pub columns: Vec<Column>,
    /// Primary key column(s). Empty means no primary key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    /// Secondary indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
    /// Foreign key constraints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>,
}

/// Complete, validated definition of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableParts", into = "TableParts")]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    primary_key: Option<Index>,
    indexes: Vec<Index>,
    foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Starts building a table.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder::new(name)
    }

    /// Validates the parts and builds a table.
    ///
    /// Unnamed indexes and foreign keys get generated names. Unlike
    /// [`TableBuilder::foreign_key`], no implicit indexes are added.
    pub fn from_parts(parts: TableParts) -> Result<Self> {
        let TableParts {
            name,
            columns,
            primary_key,
            indexes,
            foreign_keys,
        } = parts;

        if name.is_empty() {
            return Err(DdlError::invalid_schema(&name, "table name is empty"));
        }
        if columns.is_empty() {
            return Err(DdlError::invalid_schema(&name, "table has no columns"));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(name_key(&column.name)) {
                return Err(DdlError::invalid_schema(
                    &name,
                    format!("duplicate column '{}'", column.name),
                ));
            }
            if let Some(DefaultValue::Float(value)) = column.default {
                if !value.is_finite() {
                    return Err(DdlError::invalid_schema(
                        &name,
                        format!("column '{}' has non-finite default {value}", column.name),
                    ));
                }
            }
        }

        let primary_key = if primary_key.is_empty() {
            None
        } else {
            Some(Index::primary_key(primary_key))
        };

        let indexes: Vec<Index> = indexes
            .into_iter()
            .map(|index| name_index(&name, index))
            .collect();
        let foreign_keys: Vec<ForeignKey> = foreign_keys
            .into_iter()
            .map(|fk| name_foreign_key(&name, fk))
            .collect();

        let table = Self {
            name,
            columns,
            primary_key,
            indexes,
            foreign_keys,
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        let table = &self.name;

        if let Some(pk) = &self.primary_key {
            self.validate_index_columns(pk)?;
        }

        let mut index_names = HashSet::new();
        for index in &self.indexes {
            if index.primary {
                return Err(DdlError::invalid_schema(
                    table,
                    format!("index '{}' is flagged primary; declare it as the primary key", index.name),
                ));
            }
            if !index_names.insert(name_key(&index.name)) {
                return Err(DdlError::invalid_schema(
                    table,
                    format!("duplicate index '{}'", index.name),
                ));
            }
            self.validate_index_columns(index)?;
        }

        let mut fk_names = HashSet::new();
        for fk in &self.foreign_keys {
            if !fk_names.insert(name_key(&fk.name)) {
                return Err(DdlError::invalid_schema(
                    table,
                    format!("duplicate foreign key '{}'", fk.name),
                ));
            }
            if fk.columns.is_empty() || fk.columns.len() != fk.foreign_columns.len() {
                return Err(DdlError::invalid_schema(
                    table,
                    format!(
                        "foreign key '{}' has {} local and {} referenced columns",
                        fk.name,
                        fk.columns.len(),
                        fk.foreign_columns.len()
                    ),
                ));
            }
            for column in &fk.columns {
                self.require_column(column, &fk.name)?;
            }
            if self.is_self_reference(fk) {
                for column in &fk.foreign_columns {
                    self.require_column(column, &fk.name)?;
                }
            }
        }

        Ok(())
    }

    fn validate_index_columns(&self, index: &Index) -> Result<()> {
        if index.columns.is_empty() {
            return Err(DdlError::invalid_schema(
                &self.name,
                format!("index '{}' has no columns", index.name),
            ));
        }
        let mut seen = HashSet::new();
        for column in &index.columns {
            if !seen.insert(name_key(column)) {
                return Err(DdlError::invalid_schema(
                    &self.name,
                    format!("index '{}' lists column '{column}' twice", index.name),
                ));
            }
            self.require_column(column, &index.name)?;
        }
        Ok(())
    }

    fn require_column(&self, column: &str, owner: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(DdlError::invalid_schema(
                &self.name,
                format!("'{owner}' references unknown column '{column}'"),
            ))
        }
    }

    /// Table name, as written by the caller.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in physical order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The primary key, if any.
    #[must_use]
    pub fn primary_key(&self) -> Option<&Index> {
        self.primary_key.as_ref()
    }

    /// Secondary indexes.
    #[must_use]
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Foreign key constraints.
    #[must_use]
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Gets a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| same_name(&c.name, name))
    }

    /// Returns true if the table has a column with this name.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Gets a secondary index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| same_name(&i.name, name))
    }

    /// Gets a foreign key by name.
    #[must_use]
    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| same_name(&fk.name, name))
    }

    /// Returns true if the foreign key references this table itself.
    #[must_use]
    pub fn is_self_reference(&self, fk: &ForeignKey) -> bool {
        same_name(&fk.foreign_table, &self.name)
    }

    /// Returns a copy under another name, with self-references following.
    #[must_use]
    pub fn renamed(&self, name: &str) -> Self {
        let foreign_keys = self
            .foreign_keys
            .iter()
            .map(|fk| {
                if self.is_self_reference(fk) {
                    ForeignKey {
                        foreign_table: name.to_string(),
                        ..fk.clone()
                    }
                } else {
                    fk.clone()
                }
            })
            .collect();

        Self {
            name: name.to_string(),
            columns: self.columns.clone(),
            primary_key: self.primary_key.clone(),
            indexes: self.indexes.clone(),
            foreign_keys,
        }
    }
}

impl TryFrom<TableParts> for Table {
    type Error = DdlError;

    fn try_from(parts: TableParts) -> Result<Self> {
        Self::from_parts(parts)
    }
}

impl From<Table> for TableParts {
    fn from(table: Table) -> Self {
        Self {
            name: table.name,
            columns: table.columns,
            primary_key: table.primary_key.map(|pk| pk.columns).unwrap_or_default(),
            indexes: table.indexes,
            foreign_keys: table.foreign_keys,
        }
    }
}

pub(crate) fn name_index(table: &str, mut index: Index) -> Index {
    if index.name.is_empty() {
        let prefix = if index.unique { "uniq" } else { "idx" };
        index.name = generate_identifier_name(prefix, table, &index.columns, MAX_IDENTIFIER_LENGTH);
    }
    index
}

pub(crate) fn name_foreign_key(table: &str, mut fk: ForeignKey) -> ForeignKey {
    if fk.name.is_empty() {
        fk.name = generate_identifier_name("fk", table, &fk.columns, MAX_IDENTIFIER_LENGTH);
    }
    fk
}

/// Incrementally assembles a [`Table`].
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
    indexes: Vec<Index>,
    implicit_indexes: Vec<String>,
    foreign_keys: Vec<ForeignKey>,
}

impl TableBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            implicit_indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an index, replacing any implicit index it makes redundant.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        let index = name_index(&self.name, index);
        let implicit = std::mem::take(&mut self.implicit_indexes);
        let (redundant, kept): (Vec<String>, Vec<String>) = implicit.into_iter().partition(|name| {
            self.indexes
                .iter()
                .any(|i| same_name(&i.name, name) && i.is_fulfilled_by(&index))
        });
        self.indexes
            .retain(|i| !redundant.iter().any(|name| same_name(&i.name, name)));
        self.implicit_indexes = kept;
        self.indexes.push(index);
        self
    }

    /// Adds a foreign key.
    ///
    /// Unless an existing index (or the primary key) already covers exactly
    /// the local columns, an implicit `IDX_…` index is added for them.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        let fk = name_foreign_key(&self.name, fk);
        let candidate = name_index(&self.name, Index::new("", fk.columns.clone()));

        let primary = (!self.primary_key.is_empty())
            .then(|| Index::primary_key(self.primary_key.clone()));
        let covered = self
            .indexes
            .iter()
            .chain(primary.as_ref())
            .any(|existing| candidate.is_fulfilled_by(existing));

        if !covered && self.indexes.iter().all(|i| !same_name(&i.name, &candidate.name)) {
            self.implicit_indexes.push(candidate.name.clone());
            self.indexes.push(candidate);
        }
        self.foreign_keys.push(fk);
        self
    }

    /// Validates and builds the table.
    pub fn build(self) -> Result<Table> {
        Table::from_parts(TableParts {
            name: self.name,
            columns: self.columns,
            primary_key: self.primary_key,
            indexes: self.indexes,
            foreign_keys: self.foreign_keys,
        })
    }
}
