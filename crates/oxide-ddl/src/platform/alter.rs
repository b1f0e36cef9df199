//! Table diff compilation.
//!
//! A diff is first analyzed: if every edit maps onto a statement the dialect
//! runs natively, the diff is compiled incrementally. Otherwise the table is
//! rebuilt:
//!
//! 1. copy the surviving columns into a temporary table,
//! 2. drop the table,
//! 3. create it again with the altered definition (indexes excluded),
//! 4. copy the rows back,
//! 5. drop the temporary table,
//! 6. rename the table if the diff renames it,
//! 7. create the indexes against the final name.
//!
//! Steps 1, 4 and 5 are skipped when no column survives.

use tracing::{debug, info, warn};

use super::correspondence::{altered_table, Correspondence};
use super::render::Renderer;
use crate::diff::TableDiff;
use crate::error::{DdlError, Result};
use crate::identifier::{is_quoted, unquote};
use crate::profile::PlatformProfile;
use crate::schema::{Column, DefaultValue, Table, PRIMARY_KEY_NAME};

/// How a diff is turned into statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Native ALTER TABLE, CREATE INDEX and DROP INDEX statements.
    Incremental,
    /// Copy, drop, recreate and copy back.
    Rebuild,
}

impl Strategy {
    /// Returns the strategy name, used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::Rebuild => "rebuild",
        }
    }
}

/// A validated diff: how it compiles and the table it produces.
pub(crate) struct Plan {
    pub(crate) strategy: Strategy,
    pub(crate) altered: Table,
}

/// Validates a diff against the profile and chooses its strategy.
///
/// Every check that can reject a diff runs here, so a diff that plans also
/// compiles.
pub(crate) fn plan(profile: &PlatformProfile, diff: &TableDiff) -> Result<Plan> {
    let table = diff.from_table().name();

    if let Some(column) = diff.added_columns().iter().find(|c| c.autoincrement) {
        return Err(DdlError::unsupported_alteration(
            table,
            format!("cannot add autoincrement column '{}'", column.name),
        ));
    }

    let altered = altered_table(diff, profile)?;
    let strategy = analyze(profile, &Renderer::new(profile), diff);

    if strategy == Strategy::Rebuild {
        for name in std::iter::once(table).chain(diff.new_name()) {
            if is_schema_qualified(name) {
                return Err(DdlError::unsupported_alteration(
                    table,
                    format!("schema-qualified name '{name}' cannot be rebuilt"),
                ));
            }
        }
    }

    Ok(Plan { strategy, altered })
}

/// Compiles a diff into statements.
pub(crate) fn compile(profile: &PlatformProfile, diff: &TableDiff) -> Result<Vec<String>> {
    let Plan { strategy, altered } = plan(profile, diff)?;
    let renderer = Renderer::new(profile);

    let statements = match strategy {
        Strategy::Incremental => incremental(&renderer, diff)?,
        Strategy::Rebuild => rebuild(profile, &renderer, diff, &altered)?,
    };

    info!(
        table = %diff.from_table().name(),
        dialect = %profile.name,
        strategy = strategy.as_str(),
        statements = statements.len(),
        "Compiled table diff"
    );
    Ok(statements)
}

/// Chooses the strategy for a diff.
pub(crate) fn analyze(profile: &PlatformProfile, renderer: &Renderer<'_>, diff: &TableDiff) -> Strategy {
    match rebuild_reason(profile, renderer, diff) {
        Some(reason) => {
            debug!(table = %diff.from_table().name(), reason, "Table requires a rebuild");
            Strategy::Rebuild
        }
        None => Strategy::Incremental,
    }
}

fn rebuild_reason(
    profile: &PlatformProfile,
    renderer: &Renderer<'_>,
    diff: &TableDiff,
) -> Option<&'static str> {
    let capabilities = profile.capabilities;

    if !diff.changed_columns().is_empty() {
        return Some("columns are changed");
    }
    if !diff.renamed_columns().is_empty() {
        return Some("columns are renamed");
    }
    if !diff.removed_columns().is_empty() {
        return Some("columns are removed");
    }
    if !diff.added_foreign_keys().is_empty() || !diff.removed_foreign_keys().is_empty() {
        return Some("foreign keys are edited");
    }
    if !diff.renamed_indexes().is_empty() {
        return Some("indexes are renamed");
    }
    if diff.removes_index(PRIMARY_KEY_NAME) || diff.added_indexes().iter().any(|i| i.primary) {
        return Some("the primary key is edited");
    }
    if diff.new_name().is_some() && !capabilities.rename_table {
        return Some("the dialect cannot rename tables");
    }
    if (!diff.added_indexes().is_empty() || !diff.removed_indexes().is_empty())
        && !capabilities.index_changes
    {
        return Some("the dialect cannot edit indexes in place");
    }
    if !diff.added_columns().is_empty() && !capabilities.add_column {
        return Some("the dialect cannot add columns in place");
    }

    for column in diff.added_columns() {
        if requires_default(column) {
            warn!(
                table = %diff.from_table().name(),
                column = %column.name,
                "NOT NULL column without default cannot be added in place"
            );
            return Some("a NOT NULL column without default is added");
        }
        if renderer.has_keyword_default(column) {
            return Some("a column with a non-constant default is added");
        }
    }

    None
}

fn incremental(renderer: &Renderer<'_>, diff: &TableDiff) -> Result<Vec<String>> {
    let table = diff.from_table().name();
    let mut statements = Vec::new();

    for column in diff.added_columns() {
        statements.push(renderer.add_column_sql(table, column)?);
    }
    for index in diff.removed_indexes() {
        statements.push(renderer.drop_index_sql(index));
    }
    if let Some(new_name) = diff.new_name() {
        statements.push(renderer.rename_table_sql(table, new_name));
    }
    for index in diff.added_indexes() {
        statements.push(renderer.create_index_sql(index, diff.final_name()));
    }

    Ok(statements)
}

fn rebuild(
    profile: &PlatformProfile,
    renderer: &Renderer<'_>,
    diff: &TableDiff,
    altered: &Table,
) -> Result<Vec<String>> {
    let table = diff.from_table().name();
    let correspondence = Correspondence::new(diff);
    let temp_table = format!("{}{}", profile.temp_table_prefix, unquote(table));
    let old_names = renderer.quote_list(&correspondence.old_names());
    let new_names = renderer.quote_list(&correspondence.new_names());
    let copy = !correspondence.is_empty();

    let mut statements = Vec::new();

    if copy {
        statements.push(format!(
            "CREATE TEMPORARY TABLE {} AS SELECT {old_names} FROM {}",
            renderer.quote(&temp_table),
            renderer.quote(table)
        ));
    }
    statements.push(renderer.drop_table_sql(table));
    statements.push(renderer.create_table_statement(&altered.renamed(table))?);
    if copy {
        statements.push(format!(
            "INSERT INTO {} ({new_names}) SELECT {old_names} FROM {}",
            renderer.quote(table),
            renderer.quote(&temp_table)
        ));
        statements.push(renderer.drop_table_sql(&temp_table));
    }
    if let Some(new_name) = diff.new_name() {
        statements.push(renderer.rename_table_sql(table, new_name));
    }
    statements.extend(
        altered
            .indexes()
            .iter()
            .map(|index| renderer.create_index_sql(index, diff.final_name())),
    );

    Ok(statements)
}

fn is_schema_qualified(name: &str) -> bool {
    !is_quoted(name) && name.contains('.')
}

/// Adding such a column in place would violate NOT NULL on existing rows.
fn requires_default(column: &Column) -> bool {
    !column.nullable && matches!(column.default, None | Some(DefaultValue::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Capabilities;
    use crate::schema::Index;
    use crate::types::LogicalType;

    fn table() -> Table {
        Table::builder("user")
            .column(Column::new("id", LogicalType::Integer))
            .primary_key(["id"])
            .build()
            .unwrap()
    }

    fn strategy(profile: &PlatformProfile, diff: &TableDiff) -> Strategy {
        analyze(profile, &Renderer::new(profile), diff)
    }

    #[test]
    fn test_nullable_additions_are_incremental() {
        let profile = PlatformProfile::sqlite();
        let diff = TableDiff::builder(table())
            .add_column(Column::new("count", LogicalType::Integer).nullable().default(1))
            .add_index(Index::new("idx_count", ["count"]))
            .rename_table("client")
            .build()
            .unwrap();
        assert_eq!(strategy(&profile, &diff), Strategy::Incremental);
        assert_eq!(
            compile(&profile, &diff).unwrap(),
            vec![
                "ALTER TABLE user ADD COLUMN count INTEGER DEFAULT 1",
                "ALTER TABLE user RENAME TO client",
                "CREATE INDEX idx_count ON client (count)",
            ]
        );
    }

    #[test]
    fn test_not_null_without_default_rebuilds() {
        let profile = PlatformProfile::sqlite();
        let diff = TableDiff::builder(table())
            .add_column(Column::new("foo", LogicalType::String))
            .build()
            .unwrap();
        assert_eq!(strategy(&profile, &diff), Strategy::Rebuild);
        assert!(requires_default(&diff.added_columns()[0]));
    }

    #[test]
    fn test_not_null_with_default_is_incremental() {
        let profile = PlatformProfile::sqlite();
        let diff = TableDiff::builder(table())
            .add_column(Column::new("foo", LogicalType::String).default("bar"))
            .build()
            .unwrap();
        assert_eq!(
            compile(&profile, &diff).unwrap(),
            vec!["ALTER TABLE user ADD COLUMN foo VARCHAR DEFAULT 'bar' NOT NULL"]
        );
    }

    #[test]
    fn test_keyword_default_rebuilds() {
        let profile = PlatformProfile::sqlite();
        let diff = TableDiff::builder(table())
            .add_column(Column::new("time", LogicalType::Date).nullable().default("CURRENT_DATE"))
            .build()
            .unwrap();
        assert_eq!(strategy(&profile, &diff), Strategy::Rebuild);
    }

    #[test]
    fn test_capabilities_force_rebuild() {
        let mut profile = PlatformProfile::sqlite();
        profile.capabilities = Capabilities {
            rename_table: false,
            ..Capabilities::default()
        };
        let diff = TableDiff::builder(table()).rename_table("client").build().unwrap();
        assert_eq!(strategy(&profile, &diff), Strategy::Rebuild);
        assert_eq!(
            compile(&profile, &diff).unwrap(),
            vec![
                "CREATE TEMPORARY TABLE __temp__user AS SELECT id FROM user",
                "DROP TABLE user",
                "CREATE TABLE user (id INTEGER NOT NULL, PRIMARY KEY(id))",
                "INSERT INTO user (id) SELECT id FROM __temp__user",
                "DROP TABLE __temp__user",
                "ALTER TABLE user RENAME TO client",
            ]
        );
    }

    #[test]
    fn test_empty_diff_emits_nothing() {
        let profile = PlatformProfile::sqlite();
        let diff = TableDiff::builder(table()).build().unwrap();
        assert!(compile(&profile, &diff).unwrap().is_empty());
    }

    #[test]
    fn test_autoincrement_addition_is_unsupported() {
        let profile = PlatformProfile::sqlite();
        let diff = TableDiff::builder(table())
            .add_column(Column::new("seq", LogicalType::Integer).autoincrement())
            .build()
            .unwrap();
        assert!(matches!(
            plan(&profile, &diff),
            Err(DdlError::UnsupportedAlteration { .. })
        ));
        assert!(matches!(
            compile(&profile, &diff),
            Err(DdlError::UnsupportedAlteration { .. })
        ));
    }

    #[test]
    fn test_schema_qualified_rebuild_is_unsupported() {
        let profile = PlatformProfile::sqlite();
        let table = Table::builder("main.user")
            .column(Column::new("id", LogicalType::Integer))
            .column(Column::new("name", LogicalType::String))
            .build()
            .unwrap();
        let diff = TableDiff::builder(table).drop_column("name").build().unwrap();
        assert!(matches!(
            plan(&profile, &diff),
            Err(DdlError::UnsupportedAlteration { .. })
        ));
        assert!(matches!(
            compile(&profile, &diff),
            Err(DdlError::UnsupportedAlteration { .. })
        ));
    }

    #[test]
    fn test_no_surviving_column_skips_copy() {
        let profile = PlatformProfile::sqlite();
        let table = Table::builder("t")
            .column(Column::new("a", LogicalType::Integer))
            .build()
            .unwrap();
        let diff = TableDiff::builder(table)
            .drop_column("a")
            .add_column(Column::new("b", LogicalType::Integer).nullable())
            .build()
            .unwrap();
        assert_eq!(
            compile(&profile, &diff).unwrap(),
            vec!["DROP TABLE t", "CREATE TABLE t (b INTEGER DEFAULT NULL)"]
        );
    }
}
