//! Old-to-new column correspondence and the table a diff produces.

use tracing::{debug, warn};

use crate::diff::TableDiff;
use crate::error::{DdlError, Result};
use crate::identifier::{same_name, unquote, Quoter};
use crate::profile::{DanglingForeignKeyPolicy, PlatformProfile};
use crate::schema::{Column, ForeignKey, Index, Table, TableParts, PRIMARY_KEY_NAME};

/// A column of the original table that survives the diff.
#[derive(Debug, Clone, PartialEq)]
pub struct SurvivingColumn {
    /// Name in the original table.
    pub old_name: String,
    /// Definition after the diff.
    pub column: Column,
}

/// Surviving columns of a diff, in original declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Correspondence {
    surviving: Vec<SurvivingColumn>,
}

impl Correspondence {
    /// Pairs every column the diff does not remove with its new definition.
    #[must_use]
    pub fn new(diff: &TableDiff) -> Self {
        let surviving = diff
            .from_table()
            .columns()
            .iter()
            .filter(|column| !diff.removes_column(&column.name))
            .map(|column| SurvivingColumn {
                old_name: column.name.clone(),
                column: diff
                    .column_change(&column.name)
                    .map_or_else(|| column.clone(), |change| change.column.clone()),
            })
            .collect();

        Self { surviving }
    }

    /// The surviving columns.
    #[must_use]
    pub fn surviving(&self) -> &[SurvivingColumn] {
        &self.surviving
    }

    /// Returns true if no column of the original table survives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surviving.is_empty()
    }

    /// Original names of the surviving columns.
    #[must_use]
    pub fn old_names(&self) -> Vec<&str> {
        self.surviving.iter().map(|s| s.old_name.as_str()).collect()
    }

    /// New names of the surviving columns.
    #[must_use]
    pub fn new_names(&self) -> Vec<&str> {
        self.surviving.iter().map(|s| s.column.name.as_str()).collect()
    }

    /// The new name of an original column, or `None` if it was removed.
    #[must_use]
    pub fn new_name(&self, old_name: &str) -> Option<&str> {
        self.surviving
            .iter()
            .find(|s| same_name(&s.old_name, old_name))
            .map(|s| s.column.name.as_str())
    }

    /// Maps original column names to new ones.
    ///
    /// Fails with the first column that did not survive.
    fn remap<'c>(&self, columns: &'c [String]) -> std::result::Result<Vec<String>, &'c str> {
        columns
            .iter()
            .map(|c| self.new_name(c).map(ToString::to_string).ok_or(c.as_str()))
            .collect()
    }
}

/// Derives the table produced by applying `diff`, under its final name.
pub(crate) fn altered_table(diff: &TableDiff, profile: &PlatformProfile) -> Result<Table> {
    let from = diff.from_table();
    let correspondence = Correspondence::new(diff);

    let columns = correspondence
        .surviving
        .iter()
        .map(|s| s.column.clone())
        .chain(diff.added_columns().iter().cloned())
        .collect();

    Ok(Table::from_parts(TableParts {
        name: from.name().to_string(),
        columns,
        primary_key: altered_primary_key(diff, &correspondence),
        indexes: altered_indexes(diff, &correspondence, &profile.quoter())?,
        foreign_keys: altered_foreign_keys(diff, &correspondence, profile.dangling_foreign_keys)?,
    })?
    .renamed(diff.final_name()))
}

fn altered_primary_key(diff: &TableDiff, correspondence: &Correspondence) -> Vec<String> {
    if let Some(added) = diff.added_indexes().iter().find(|i| i.primary) {
        return added.columns.clone();
    }
    let Some(pk) = diff.from_table().primary_key() else {
        return Vec::new();
    };
    if diff.removes_index(PRIMARY_KEY_NAME) {
        return Vec::new();
    }

    correspondence.remap(&pk.columns).unwrap_or_else(|column| {
        debug!(
            table = %diff.from_table().name(),
            column = %column,
            "Dropping primary key that lost a column"
        );
        Vec::new()
    })
}

fn altered_indexes(
    diff: &TableDiff,
    correspondence: &Correspondence,
    quoter: &Quoter<'_>,
) -> Result<Vec<Index>> {
    let from = diff.from_table();
    let mut kept = Vec::new();
    let mut renamed = Vec::new();

    for index in diff.from_table().indexes() {
        if diff.removes_index(&index.name) {
            continue;
        }
        let columns = match correspondence.remap(&index.columns) {
            Ok(columns) => columns,
            Err(column) => {
                debug!(
                    table = %diff.from_table().name(),
                    index = %index.name,
                    column = %column,
                    "Dropping index that lost a column"
                );
                continue;
            }
        };
        let condition = match &index.condition {
            Some(condition) => Some(
                remap_condition(condition, from, correspondence, quoter).map_err(|column| {
                    DdlError::unsupported_alteration(
                        from.name(),
                        format!(
                            "condition of index '{}' references removed column '{column}'",
                            index.name
                        ),
                    )
                })?,
            ),
            None => None,
        };

        match diff.index_rename(&index.name) {
            Some(rename) => renamed.push(Index {
                name: rename.new_name.clone(),
                columns,
                condition,
                ..index.clone()
            }),
            None => kept.push(Index {
                columns,
                condition,
                ..index.clone()
            }),
        }
    }

    kept.extend(renamed);
    kept.extend(diff.added_indexes().iter().filter(|i| !i.primary).cloned());
    Ok(kept)
}

/// Rewrites the column references of a partial index condition.
///
/// Identifier tokens outside string literals that name a column of the
/// original table are replaced by the column's new name. Fails with the first
/// referenced column that did not survive.
fn remap_condition<'c>(
    condition: &'c str,
    from: &Table,
    correspondence: &Correspondence,
    quoter: &Quoter<'_>,
) -> std::result::Result<String, &'c str> {
    let mut remapped = String::with_capacity(condition.len());
    let mut rest = condition;

    while let Some(first) = rest.chars().next() {
        let (len, identifier) = match first {
            '\'' => (delimited_len(rest, '\''), false),
            '"' => (delimited_len(rest, '"'), true),
            '`' => (delimited_len(rest, '`'), true),
            '[' => (delimited_len(rest, ']'), true),
            c if c.is_ascii_alphabetic() || c == '_' => (word_len(rest), true),
            c if c.is_ascii_digit() => (word_len(rest), false),
            c => (c.len_utf8(), false),
        };
        let (token, tail) = rest.split_at(len);
        rest = tail;

        if !identifier || from.column(token).is_none() {
            remapped.push_str(token);
            continue;
        }
        match correspondence.new_name(token) {
            Some(new_name) if unquote(new_name) == unquote(token) => remapped.push_str(token),
            Some(new_name) => remapped.push_str(&quoter.quote(new_name)),
            None => return Err(token),
        }
    }

    Ok(remapped)
}

/// Length of a word token: letters, digits, `_` and `$`.
fn word_len(text: &str) -> usize {
    text.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(text.len())
}

/// Length of a token opened by its first character and closed by `close`.
///
/// A doubled closing quote inside the token is an escaped quote. An
/// unterminated token runs to the end of the text.
fn delimited_len(text: &str, close: char) -> usize {
    let mut chars = text.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c != close {
            continue;
        }
        if close != ']' && chars.peek().map(|&(_, next)| next) == Some(close) {
            chars.next();
            continue;
        }
        return i + c.len_utf8();
    }
    text.len()
}

fn altered_foreign_keys(
    diff: &TableDiff,
    correspondence: &Correspondence,
    policy: DanglingForeignKeyPolicy,
) -> Result<Vec<ForeignKey>> {
    let from = diff.from_table();
    let mut foreign_keys = Vec::new();

    for fk in from.foreign_keys() {
        if diff.removes_foreign_key(&fk.name) {
            continue;
        }

        let local = correspondence.remap(&fk.columns);
        let referenced = if from.is_self_reference(fk) {
            correspondence.remap(&fk.foreign_columns)
        } else {
            Ok(fk.foreign_columns.clone())
        };

        match (local, referenced) {
            (Ok(columns), Ok(foreign_columns)) => foreign_keys.push(ForeignKey {
                columns,
                foreign_columns,
                ..fk.clone()
            }),
            (Err(column), _) | (_, Err(column)) => match policy {
                DanglingForeignKeyPolicy::Reject => {
                    return Err(DdlError::DanglingForeignKey {
                        table: from.name().to_string(),
                        foreign_key: fk.name.clone(),
                        column: column.to_string(),
                    });
                }
                DanglingForeignKeyPolicy::Drop => warn!(
                    table = %from.name(),
                    foreign_key = %fk.name,
                    column = %column,
                    "Dropping foreign key that references a removed column"
                ),
            },
        }
    }

    foreign_keys.extend(diff.added_foreign_keys().iter().cloned());
    Ok(foreign_keys)
}
