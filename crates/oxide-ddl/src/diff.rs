//! Structural differences between two versions of a table.
//!
//! A [`TableDiff`] is assembled once through [`TableDiffBuilder`], which
//! checks every name it references against the original table and rejects
//! contradictory edits. The value is immutable afterwards.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{DdlError, Result};
use crate::identifier::{name_key, same_name};
use crate::schema::{name_foreign_key, name_index, Column, ForeignKey, Index, Table, PRIMARY_KEY_NAME};

/// A column edit: the column called `old_name` in the original table becomes
/// `column`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnChange {
    /// Name in the original table.
    pub old_name: String,
    /// New definition, including the (possibly unchanged) name.
    pub column: Column,
}

/// An index rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRename {
    /// Name in the original table.
    pub old_name: String,
    /// New name.
    pub new_name: String,
}

/// Serialized form of a [`TableDiff`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDiffParts {
    /// The table before the change.
    pub from_table: Table,
    /// New table name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    /// Columns to add, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added_columns: Vec<Column>,
    /// Columns whose definition changes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_columns: Vec<ColumnChange>,
    /// Columns that only change name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub renamed_columns: Vec<ColumnChange>,
    /// Names of columns to remove.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_columns: Vec<String>,
    /// Indexes to add.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added_indexes: Vec<Index>,
    /// Names of indexes to remove.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_indexes: Vec<String>,
    /// Index renames.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub renamed_indexes: Vec<IndexRename>,
    /// Foreign keys to add.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added_foreign_keys: Vec<ForeignKey>,
    /// Names of foreign keys to remove.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_foreign_keys: Vec<String>,
}

/// Validated difference between an original table and its next version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableDiffParts", into = "TableDiffParts")]
pub struct TableDiff {
    parts: TableDiffParts,
}

impl TableDiff {
    /// Starts a diff against `from_table`.
    #[must_use]
    pub fn builder(from_table: Table) -> TableDiffBuilder {
        TableDiffBuilder::new(from_table)
    }

    /// Validates the parts and builds a diff.
    pub fn from_parts(parts: TableDiffParts) -> Result<Self> {
        TableDiffBuilder { parts }.build()
    }

    /// The table before the change.
    #[must_use]
    pub fn from_table(&self) -> &Table {
        &self.parts.from_table
    }

    /// The new table name, if the table is renamed.
    #[must_use]
    pub fn new_name(&self) -> Option<&str> {
        self.parts.new_name.as_deref()
    }

    /// The table name after the change.
    #[must_use]
    pub fn final_name(&self) -> &str {
        self.new_name().unwrap_or_else(|| self.from_table().name())
    }

    /// Columns to add.
    #[must_use]
    pub fn added_columns(&self) -> &[Column] {
        &self.parts.added_columns
    }

    /// Columns whose definition changes.
    #[must_use]
    pub fn changed_columns(&self) -> &[ColumnChange] {
        &self.parts.changed_columns
    }

    /// Columns that only change name.
    #[must_use]
    pub fn renamed_columns(&self) -> &[ColumnChange] {
        &self.parts.renamed_columns
    }

    /// Names of removed columns.
    #[must_use]
    pub fn removed_columns(&self) -> &[String] {
        &self.parts.removed_columns
    }

    /// Indexes to add.
    #[must_use]
    pub fn added_indexes(&self) -> &[Index] {
        &self.parts.added_indexes
    }

    /// Names of removed indexes.
    #[must_use]
    pub fn removed_indexes(&self) -> &[String] {
        &self.parts.removed_indexes
    }

    /// Index renames.
    #[must_use]
    pub fn renamed_indexes(&self) -> &[IndexRename] {
        &self.parts.renamed_indexes
    }

    /// Foreign keys to add.
    #[must_use]
    pub fn added_foreign_keys(&self) -> &[ForeignKey] {
        &self.parts.added_foreign_keys
    }

    /// Names of removed foreign keys.
    #[must_use]
    pub fn removed_foreign_keys(&self) -> &[String] {
        &self.parts.removed_foreign_keys
    }

    /// Returns true if the diff changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let p = &self.parts;
        p.new_name.is_none()
            && p.added_columns.is_empty()
            && p.changed_columns.is_empty()
            && p.renamed_columns.is_empty()
            && p.removed_columns.is_empty()
            && p.added_indexes.is_empty()
            && p.removed_indexes.is_empty()
            && p.renamed_indexes.is_empty()
            && p.added_foreign_keys.is_empty()
            && p.removed_foreign_keys.is_empty()
    }

    /// Returns true if the column is removed by this diff.
    #[must_use]
    pub fn removes_column(&self, name: &str) -> bool {
        contains_name(&self.parts.removed_columns, name)
    }

    /// Returns true if the index is removed by this diff.
    #[must_use]
    pub fn removes_index(&self, name: &str) -> bool {
        contains_name(&self.parts.removed_indexes, name)
    }

    /// Returns true if the foreign key is removed by this diff.
    #[must_use]
    pub fn removes_foreign_key(&self, name: &str) -> bool {
        contains_name(&self.parts.removed_foreign_keys, name)
    }

    /// The edit applied to an original column, if it is renamed or changed.
    #[must_use]
    pub fn column_change(&self, old_name: &str) -> Option<&ColumnChange> {
        self.parts
            .renamed_columns
            .iter()
            .chain(&self.parts.changed_columns)
            .find(|change| same_name(&change.old_name, old_name))
    }

    /// The new name of an original index, if it is renamed.
    #[must_use]
    pub fn index_rename(&self, old_name: &str) -> Option<&IndexRename> {
        self.parts
            .renamed_indexes
            .iter()
            .find(|rename| same_name(&rename.old_name, old_name))
    }

    /// Column names after the change: surviving columns in original order,
    /// then added columns.
    #[must_use]
    pub fn final_column_names(&self) -> Vec<&str> {
        self.from_table()
            .columns()
            .iter()
            .filter(|c| !self.removes_column(&c.name))
            .map(|c| {
                self.column_change(&c.name)
                    .map_or(c.name.as_str(), |change| change.column.name.as_str())
            })
            .chain(self.parts.added_columns.iter().map(|c| c.name.as_str()))
            .collect()
    }
}

impl TryFrom<TableDiffParts> for TableDiff {
    type Error = DdlError;

    fn try_from(parts: TableDiffParts) -> Result<Self> {
        Self::from_parts(parts)
    }
}

impl From<TableDiff> for TableDiffParts {
    fn from(diff: TableDiff) -> Self {
        diff.parts
    }
}

fn contains_name(names: &[String], name: &str) -> bool {
    names.iter().any(|n| same_name(n, name))
}

fn is_primary_name(name: &str) -> bool {
    same_name(name, PRIMARY_KEY_NAME)
}

/// Assembles a [`TableDiff`].
#[derive(Debug, Clone)]
pub struct TableDiffBuilder {
    parts: TableDiffParts,
}

impl TableDiffBuilder {
    /// Starts an empty diff against `from_table`.
    #[must_use]
    pub fn new(from_table: Table) -> Self {
        Self {
            parts: TableDiffParts {
                from_table,
                new_name: None,
                added_columns: Vec::new(),
                changed_columns: Vec::new(),
                renamed_columns: Vec::new(),
                removed_columns: Vec::new(),
                added_indexes: Vec::new(),
                removed_indexes: Vec::new(),
                renamed_indexes: Vec::new(),
                added_foreign_keys: Vec::new(),
                removed_foreign_keys: Vec::new(),
            },
        }
    }

    /// Renames the table.
    #[must_use]
    pub fn rename_table(mut self, new_name: impl Into<String>) -> Self {
        self.parts.new_name = Some(new_name.into());
        self
    }

    /// Adds a column.
    #[must_use]
    pub fn add_column(mut self, column: Column) -> Self {
        self.parts.added_columns.push(column);
        self
    }

    /// Replaces the definition of an existing column.
    #[must_use]
    pub fn change_column(mut self, old_name: impl Into<String>, column: Column) -> Self {
        self.parts.changed_columns.push(ColumnChange {
            old_name: old_name.into(),
            column,
        });
        self
    }

    /// Renames an existing column.
    #[must_use]
    pub fn rename_column(mut self, old_name: impl Into<String>, column: Column) -> Self {
        self.parts.renamed_columns.push(ColumnChange {
            old_name: old_name.into(),
            column,
        });
        self
    }

    /// Removes a column.
    #[must_use]
    pub fn drop_column(mut self, name: impl Into<String>) -> Self {
        self.parts.removed_columns.push(name.into());
        self
    }

    /// Adds an index. An index flagged primary replaces the primary key.
    #[must_use]
    pub fn add_index(mut self, index: Index) -> Self {
        self.parts.added_indexes.push(index);
        self
    }

    /// Removes an index; `primary` removes the primary key.
    #[must_use]
    pub fn drop_index(mut self, name: impl Into<String>) -> Self {
        self.parts.removed_indexes.push(name.into());
        self
    }

    /// Renames an index.
    #[must_use]
    pub fn rename_index(mut self, old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        self.parts.renamed_indexes.push(IndexRename {
            old_name: old_name.into(),
            new_name: new_name.into(),
        });
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn add_foreign_key(mut self, fk: ForeignKey) -> Self {
        self.parts.added_foreign_keys.push(fk);
        self
    }

    /// Removes a foreign key.
    #[must_use]
    pub fn drop_foreign_key(mut self, name: impl Into<String>) -> Self {
        self.parts.removed_foreign_keys.push(name.into());
        self
    }

    /// Validates and builds the diff.
    pub fn build(mut self) -> Result<TableDiff> {
        let table_name = self.parts.from_table.name().to_string();

        if self.parts.new_name.as_deref() == Some(table_name.as_str()) {
            self.parts.new_name = None;
        }
        if self.parts.new_name.as_deref() == Some("") {
            return Err(DdlError::invalid_diff(&table_name, "new table name is empty"));
        }

        self.parts.added_indexes = std::mem::take(&mut self.parts.added_indexes)
            .into_iter()
            .map(|index| name_index(&table_name, index))
            .collect();
        self.parts.added_foreign_keys = std::mem::take(&mut self.parts.added_foreign_keys)
            .into_iter()
            .map(|fk| name_foreign_key(&table_name, fk))
            .collect();

        let diff = TableDiff { parts: self.parts };
        validate_columns(&diff)?;
        validate_indexes(&diff)?;
        validate_foreign_keys(&diff)?;
        Ok(diff)
    }
}

fn unique_keys<'a>(table: &str, what: &str, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name_key(name)) {
            return Err(DdlError::invalid_diff(
                table,
                format!("{what} '{name}' appears more than once"),
            ));
        }
    }
    Ok(())
}

fn validate_columns(diff: &TableDiff) -> Result<()> {
    let from = diff.from_table();
    let table = from.name();
    let p = &diff.parts;

    let edited = p
        .removed_columns
        .iter()
        .chain(p.changed_columns.iter().map(|c| &c.old_name))
        .chain(p.renamed_columns.iter().map(|c| &c.old_name));
    for name in edited {
        if !from.has_column(name) {
            return Err(DdlError::ColumnNotFound {
                table: table.to_string(),
                column: name.clone(),
            });
        }
    }

    unique_keys(
        table,
        "column edit for",
        p.removed_columns
            .iter()
            .map(String::as_str)
            .chain(p.changed_columns.iter().map(|c| c.old_name.as_str()))
            .chain(p.renamed_columns.iter().map(|c| c.old_name.as_str())),
    )?;

    unique_keys(table, "column", diff.final_column_names())
}

fn validate_indexes(diff: &TableDiff) -> Result<()> {
    let from = diff.from_table();
    let table = from.name();
    let p = &diff.parts;

    let index_exists = |name: &str| {
        if is_primary_name(name) {
            from.primary_key().is_some()
        } else {
            from.index(name).is_some()
        }
    };

    for name in p
        .removed_indexes
        .iter()
        .chain(p.renamed_indexes.iter().map(|r| &r.old_name))
    {
        if !index_exists(name) {
            return Err(DdlError::IndexNotFound {
                table: table.to_string(),
                index: name.clone(),
            });
        }
    }

    for rename in &p.renamed_indexes {
        if is_primary_name(&rename.old_name) || is_primary_name(&rename.new_name) {
            return Err(DdlError::invalid_diff(table, "the primary key cannot be renamed"));
        }
    }

    unique_keys(
        table,
        "index edit for",
        p.removed_indexes
            .iter()
            .chain(p.renamed_indexes.iter().map(|r| &r.old_name))
            .map(String::as_str),
    )?;

    let primary_removed = diff.removes_index(PRIMARY_KEY_NAME);
    let mut added_primary = false;
    for index in &p.added_indexes {
        if index.primary {
            if added_primary || (from.primary_key().is_some() && !primary_removed) {
                return Err(DdlError::invalid_diff(
                    table,
                    "a primary key is added while one is still present",
                ));
            }
            added_primary = true;
        } else if is_primary_name(&index.name) {
            return Err(DdlError::invalid_diff(
                table,
                format!("index name '{}' is reserved for the primary key", index.name),
            ));
        }
    }

    // Index names after the change must be unique.
    let surviving = from
        .indexes()
        .iter()
        .filter(|i| !diff.removes_index(&i.name) && diff.index_rename(&i.name).is_none())
        .map(|i| i.name.as_str());
    unique_keys(
        table,
        "index",
        surviving
            .chain(p.renamed_indexes.iter().map(|r| r.new_name.as_str()))
            .chain(
                p.added_indexes
                    .iter()
                    .filter(|i| !i.primary)
                    .map(|i| i.name.as_str()),
            ),
    )?;

    let final_columns = diff.final_column_names();
    for index in &p.added_indexes {
        require_final_columns(table, &final_columns, &index.columns)?;
    }
    Ok(())
}

fn validate_foreign_keys(diff: &TableDiff) -> Result<()> {
    let from = diff.from_table();
    let table = from.name();
    let p = &diff.parts;

    for name in &p.removed_foreign_keys {
        if from.foreign_key(name).is_none() {
            return Err(DdlError::ForeignKeyNotFound {
                table: table.to_string(),
                foreign_key: name.clone(),
            });
        }
    }
    unique_keys(
        table,
        "foreign key removal for",
        p.removed_foreign_keys.iter().map(String::as_str),
    )?;

    let surviving = from
        .foreign_keys()
        .iter()
        .filter(|fk| !diff.removes_foreign_key(&fk.name))
        .map(|fk| fk.name.as_str());
    unique_keys(
        table,
        "foreign key",
        surviving.chain(p.added_foreign_keys.iter().map(|fk| fk.name.as_str())),
    )?;

    let final_columns = diff.final_column_names();
    for fk in &p.added_foreign_keys {
        require_final_columns(table, &final_columns, &fk.columns)?;
    }
    Ok(())
}

fn require_final_columns(table: &str, final_columns: &[&str], columns: &[String]) -> Result<()> {
    match columns
        .iter()
        .find(|c| !final_columns.iter().any(|f| same_name(f, c)))
    {
        Some(missing) => Err(DdlError::ColumnNotFound {
            table: table.to_string(),
            column: missing.clone(),
        }),
        None => Ok(()),
    }
}
