//! Derives a [`TableDiff`] from two versions of a table.
//!
//! Columns are matched by name unless a rename hint (or rename detection)
//! pairs them differently. Indexes and foreign keys are matched by name; a
//! definition change becomes a removal plus an addition.

use std::collections::HashSet;

use crate::diff::{TableDiff, TableDiffBuilder};
use crate::error::{DdlError, Result};
use crate::identifier::{name_key, same_name};
use crate::schema::{Column, ForeignKey, Index, Table, PRIMARY_KEY_NAME};

/// Options for the comparator.
#[derive(Debug, Clone, Default)]
pub struct ComparatorOptions {
    /// Pair a removed and an added column with identical definitions as a
    /// rename.
    pub detect_column_renames: bool,
}

impl ComparatorOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables column rename detection.
    #[must_use]
    pub fn with_rename_detection(mut self) -> Self {
        self.detect_column_renames = true;
        self
    }
}

/// Renames known in advance, as `(old name, new name)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameHints {
    /// Column renames.
    pub columns: Vec<(String, String)>,
    /// Index renames.
    pub indexes: Vec<(String, String)>,
}

impl RenameHints {
    /// Creates empty hints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column rename.
    #[must_use]
    pub fn column(mut self, old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        self.columns.push((old_name.into(), new_name.into()));
        self
    }

    /// Adds an index rename.
    #[must_use]
    pub fn index(mut self, old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        self.indexes.push((old_name.into(), new_name.into()));
        self
    }
}

/// Compares table definitions.
#[derive(Debug, Default)]
pub struct Comparator {
    options: ComparatorOptions,
}

/// Column pairing between the two tables.
struct ColumnPairs<'a> {
    pairs: Vec<(&'a Column, &'a Column)>,
    removed: Vec<&'a Column>,
    added: Vec<&'a Column>,
}

impl ColumnPairs<'_> {
    fn new_name(&self, old_name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(from, _)| same_name(&from.name, old_name))
            .map(|(_, to)| to.name.as_str())
    }

    fn remap(&self, columns: &[String]) -> Option<Vec<String>> {
        columns
            .iter()
            .map(|c| self.new_name(c).map(ToString::to_string))
            .collect()
    }
}

impl Comparator {
    /// Creates a comparator with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a comparator with custom options.
    #[must_use]
    pub fn with_options(options: ComparatorOptions) -> Self {
        Self { options }
    }

    /// Returns the diff that turns `from` into `to`.
    pub fn compare(&self, from: &Table, to: &Table) -> Result<TableDiff> {
        self.compare_with_renames(from, to, &RenameHints::default())
    }

    /// Returns the diff that turns `from` into `to`, treating the hinted
    /// pairs as renames.
    pub fn compare_with_renames(&self, from: &Table, to: &Table, hints: &RenameHints) -> Result<TableDiff> {
        let columns = self.pair_columns(from, to, hints)?;
        let mut builder = TableDiff::builder(from.clone());

        if from.name() != to.name() {
            builder = builder.rename_table(to.name());
        }

        for &(old, new) in &columns.pairs {
            if old == new {
                continue;
            }
            builder = if old.same_definition(new) {
                builder.rename_column(old.name.clone(), new.clone())
            } else {
                builder.change_column(old.name.clone(), new.clone())
            };
        }
        for column in &columns.removed {
            builder = builder.drop_column(column.name.clone());
        }
        for column in &columns.added {
            builder = builder.add_column((*column).clone());
        }

        builder = compare_primary_keys(builder, from, to, &columns);
        builder = compare_indexes(builder, from, to, &columns, hints)?;
        builder = compare_foreign_keys(builder, from, to, &columns);

        builder.build()
    }

    fn pair_columns<'a>(&self, from: &'a Table, to: &'a Table, hints: &RenameHints) -> Result<ColumnPairs<'a>> {
        let mut pairs = Vec::new();
        let mut paired_from = HashSet::new();
        let mut paired_to = HashSet::new();

        for (old_name, new_name) in &hints.columns {
            let old = from.column(old_name).ok_or_else(|| DdlError::ColumnNotFound {
                table: from.name().to_string(),
                column: old_name.clone(),
            })?;
            let new = to.column(new_name).ok_or_else(|| DdlError::ColumnNotFound {
                table: to.name().to_string(),
                column: new_name.clone(),
            })?;
            paired_from.insert(name_key(&old.name));
            paired_to.insert(name_key(&new.name));
            pairs.push((old, new));
        }

        for old in from.columns() {
            if paired_from.contains(&name_key(&old.name)) || paired_to.contains(&name_key(&old.name)) {
                continue;
            }
            if let Some(new) = to.column(&old.name) {
                paired_from.insert(name_key(&old.name));
                paired_to.insert(name_key(&new.name));
                pairs.push((old, new));
            }
        }

        let mut removed: Vec<&Column> = from
            .columns()
            .iter()
            .filter(|c| !paired_from.contains(&name_key(&c.name)))
            .collect();
        let mut added: Vec<&Column> = to
            .columns()
            .iter()
            .filter(|c| !paired_to.contains(&name_key(&c.name)))
            .collect();

        if self.options.detect_column_renames {
            removed.retain(|old| {
                match added.iter().position(|new| old.same_definition(new)) {
                    Some(position) => {
                        pairs.push((*old, added.remove(position)));
                        false
                    }
                    None => true,
                }
            });
        }

        // Keep edits in the original declaration order.
        pairs.sort_by_key(|(old, _)| {
            from.columns()
                .iter()
                .position(|c| same_name(&c.name, &old.name))
        });

        Ok(ColumnPairs {
            pairs,
            removed,
            added,
        })
    }
}

fn compare_primary_keys(
    builder: TableDiffBuilder,
    from: &Table,
    to: &Table,
    columns: &ColumnPairs<'_>,
) -> TableDiffBuilder {
    let remapped = from.primary_key().and_then(|pk| columns.remap(&pk.columns));
    let target = to.primary_key().map(|pk| &pk.columns);

    let unchanged = match (&remapped, target) {
        (Some(a), Some(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_name(x, y)),
        (None, None) => from.primary_key().is_none(),
        _ => false,
    };
    if unchanged {
        return builder;
    }

    let mut builder = builder;
    if from.primary_key().is_some() {
        builder = builder.drop_index(PRIMARY_KEY_NAME);
    }
    if let Some(pk) = to.primary_key() {
        builder = builder.add_index(pk.clone());
    }
    builder
}

fn compare_indexes(
    mut builder: TableDiffBuilder,
    from: &Table,
    to: &Table,
    columns: &ColumnPairs<'_>,
    hints: &RenameHints,
) -> Result<TableDiffBuilder> {
    // What a `from` index becomes once its columns follow the pairing.
    let carried = |index: &Index, name: &str| {
        columns.remap(&index.columns).map(|remapped| Index {
            name: name.to_string(),
            columns: remapped,
            ..index.clone()
        })
    };

    let mut handled_from = HashSet::new();
    let mut handled_to = HashSet::new();

    for (old_name, new_name) in &hints.indexes {
        let old = from.index(old_name).ok_or_else(|| DdlError::IndexNotFound {
            table: from.name().to_string(),
            index: old_name.clone(),
        })?;
        let new = to.index(new_name).ok_or_else(|| DdlError::IndexNotFound {
            table: to.name().to_string(),
            index: new_name.clone(),
        })?;
        handled_from.insert(name_key(&old.name));
        handled_to.insert(name_key(&new.name));

        if carried(old, &new.name).as_ref() == Some(new) {
            builder = builder.rename_index(old.name.clone(), new.name.clone());
        } else {
            builder = builder.drop_index(old.name.clone()).add_index(new.clone());
        }
    }

    for old in from.indexes() {
        if handled_from.contains(&name_key(&old.name)) {
            continue;
        }
        match to.index(&old.name) {
            Some(new) if !handled_to.contains(&name_key(&new.name)) => {
                handled_to.insert(name_key(&new.name));
                if carried(old, &new.name).as_ref() != Some(new) {
                    builder = builder.drop_index(old.name.clone()).add_index(new.clone());
                }
            }
            _ => builder = builder.drop_index(old.name.clone()),
        }
    }

    for new in to.indexes() {
        if !handled_to.contains(&name_key(&new.name)) {
            builder = builder.add_index(new.clone());
        }
    }

    Ok(builder)
}

fn compare_foreign_keys(
    mut builder: TableDiffBuilder,
    from: &Table,
    to: &Table,
    columns: &ColumnPairs<'_>,
) -> TableDiffBuilder {
    let carried = |fk: &ForeignKey| -> Option<ForeignKey> {
        let local = columns.remap(&fk.columns)?;
        if from.is_self_reference(fk) {
            Some(ForeignKey {
                columns: local,
                foreign_table: to.name().to_string(),
                foreign_columns: columns.remap(&fk.foreign_columns)?,
                ..fk.clone()
            })
        } else {
            Some(ForeignKey {
                columns: local,
                ..fk.clone()
            })
        }
    };

    let mut kept = HashSet::new();
    for old in from.foreign_keys() {
        match to.foreign_key(&old.name) {
            Some(new) if carried(old).as_ref() == Some(new) => {
                kept.insert(name_key(&new.name));
            }
            _ => builder = builder.drop_foreign_key(old.name.clone()),
        }
    }
    for new in to.foreign_keys() {
        if !kept.contains(&name_key(&new.name)) {
            builder = builder.add_foreign_key(new.clone());
        }
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogicalType;

    fn int(name: &str) -> Column {
        Column::new(name, LogicalType::Integer)
    }

    fn from_table() -> Table {
        Table::builder("book")
            .column(int("id"))
            .column(Column::new("title", LogicalType::String).length(255))
            .column(int("author_id"))
            .primary_key(["id"])
            .index(Index::new("idx_title", ["title"]))
            .foreign_key(ForeignKey::new(["author_id"], "author", ["id"]).named("fk_author"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_identical_tables() {
        let diff = Comparator::new().compare(&from_table(), &from_table()).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_added_removed_and_changed_columns() {
        let to = Table::builder("book")
            .column(int("id"))
            .column(Column::new("title", LogicalType::Text))
            .column(Column::new("isbn", LogicalType::String).length(13).nullable())
            .primary_key(["id"])
            .index(Index::new("idx_title", ["title"]))
            .build()
            .unwrap();

        let diff = Comparator::new().compare(&from_table(), &to).unwrap();
        assert_eq!(diff.added_columns()[0].name, "isbn");
        assert_eq!(diff.removed_columns(), ["author_id".to_string()]);
        assert_eq!(diff.changed_columns()[0].old_name, "title");
        assert_eq!(diff.removed_foreign_keys(), ["fk_author".to_string()]);
        assert!(diff.renamed_columns().is_empty());
    }

    #[test]
    fn test_rename_hint_carries_indexes() {
        let to = Table::builder("volume")
            .column(int("id"))
            .column(Column::new("name", LogicalType::String).length(255))
            .column(int("author_id"))
            .primary_key(["id"])
            .index(Index::new("idx_title", ["name"]))
            .foreign_key(ForeignKey::new(["author_id"], "author", ["id"]).named("fk_author"))
            .build()
            .unwrap();

        let diff = Comparator::new()
            .compare_with_renames(&from_table(), &to, &RenameHints::new().column("title", "name"))
            .unwrap();
        assert_eq!(diff.new_name(), Some("volume"));
        assert_eq!(diff.renamed_columns()[0].old_name, "title");
        assert_eq!(diff.renamed_columns()[0].column.name, "name");
        assert!(diff.removed_indexes().iter().all(|i| i != "idx_title"));
        assert!(diff.added_indexes().iter().all(|i| i.name != "idx_title"));
        assert!(diff.removed_foreign_keys().is_empty());
    }

    #[test]
    fn test_rename_detection() {
        let to = Table::builder("book")
            .column(int("id"))
            .column(Column::new("name", LogicalType::String).length(255))
            .column(int("author_id"))
            .primary_key(["id"])
            .index(Index::new("idx_title", ["name"]))
            .foreign_key(ForeignKey::new(["author_id"], "author", ["id"]).named("fk_author"))
            .build()
            .unwrap();

        let plain = Comparator::new().compare(&from_table(), &to).unwrap();
        assert_eq!(plain.removed_columns(), ["title".to_string()]);
        assert_eq!(plain.added_columns()[0].name, "name");

        let detecting = Comparator::with_options(ComparatorOptions::new().with_rename_detection())
            .compare(&from_table(), &to)
            .unwrap();
        assert_eq!(detecting.renamed_columns()[0].column.name, "name");
        assert!(detecting.removed_columns().is_empty());
        assert!(detecting.added_columns().is_empty());
    }

    #[test]
    fn test_changed_index_is_drop_and_add() {
        let to = Table::builder("book")
            .column(int("id"))
            .column(Column::new("title", LogicalType::String).length(255))
            .column(int("author_id"))
            .primary_key(["id"])
            .index(Index::new("idx_title", ["title"]).unique())
            .foreign_key(ForeignKey::new(["author_id"], "author", ["id"]).named("fk_author"))
            .build()
            .unwrap();

        let diff = Comparator::new().compare(&from_table(), &to).unwrap();
        assert_eq!(diff.removed_indexes(), ["idx_title".to_string()]);
        assert!(diff.added_indexes()[0].unique);
    }

    #[test]
    fn test_index_rename_hint() {
        let to = Table::builder("book")
            .column(int("id"))
            .column(Column::new("title", LogicalType::String).length(255))
            .column(int("author_id"))
            .primary_key(["id"])
            .index(Index::new("idx_book_title", ["title"]))
            .foreign_key(ForeignKey::new(["author_id"], "author", ["id"]).named("fk_author"))
            .build()
            .unwrap();

        let diff = Comparator::new()
            .compare_with_renames(
                &from_table(),
                &to,
                &RenameHints::new().index("idx_title", "idx_book_title"),
            )
            .unwrap();
        assert_eq!(diff.renamed_indexes()[0].new_name, "idx_book_title");
        assert!(diff.removed_indexes().is_empty());
    }

    #[test]
    fn test_primary_key_change() {
        let to = Table::builder("book")
            .column(int("id"))
            .column(Column::new("title", LogicalType::String).length(255))
            .column(int("author_id"))
            .primary_key(["id", "author_id"])
            .index(Index::new("idx_title", ["title"]))
            .foreign_key(ForeignKey::new(["author_id"], "author", ["id"]).named("fk_author"))
            .build()
            .unwrap();

        let diff = Comparator::new().compare(&from_table(), &to).unwrap();
        assert_eq!(diff.removed_indexes(), ["primary".to_string()]);
        assert!(diff.added_indexes()[0].primary);
    }

    #[test]
    fn test_unknown_rename_hint() {
        let result = Comparator::new().compare_with_renames(
            &from_table(),
            &from_table(),
            &RenameHints::new().column("missing", "id"),
        );
        assert!(matches!(result, Err(DdlError::ColumnNotFound { .. })));
    }
}
