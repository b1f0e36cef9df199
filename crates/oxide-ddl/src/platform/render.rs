//! SQL fragments for columns, indexes, foreign keys and whole tables.

use crate::error::{DdlError, Result};
use crate::identifier::{same_name, Quoter};
use crate::profile::PlatformProfile;
use crate::schema::{Column, DefaultValue, ForeignKey, Index, Table};

/// Renders statements for one dialect profile.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Renderer<'a> {
    profile: &'a PlatformProfile,
    quoter: Quoter<'a>,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(profile: &'a PlatformProfile) -> Self {
        Self {
            profile,
            quoter: profile.quoter(),
        }
    }

    pub(crate) fn quote(&self, name: &str) -> String {
        self.quoter.quote(name)
    }

    pub(crate) fn quote_list<S: AsRef<str>>(&self, names: &[S]) -> String {
        self.quoter.quote_list(names)
    }

    /// Generates a column definition.
    ///
    /// `<name> <type> [DEFAULT <v>] [NOT NULL] [COLLATE <c>]`, followed by an
    /// inline ` --comment` that runs to the end of the line.
    pub(crate) fn column_definition(&self, column: &Column, primary: bool) -> Result<String> {
        let mut sql = format!(
            "{} {}",
            self.quote(&column.name),
            self.profile
                .types
                .map_type(column.logical_type, &column.type_options(primary))?
        );

        if let Some(default) = self.default_sql(column) {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default);
        }
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(collation) = &column.collation {
            sql.push_str(" COLLATE ");
            sql.push_str(collation);
        }
        if let Some(comment) = column.comment.as_deref().filter(|c| !c.is_empty()) {
            sql.push_str(" --");
            sql.push_str(&comment.replace('\n', "\n--"));
            sql.push('\n');
        }

        Ok(sql)
    }

    /// The DEFAULT expression of a column, if it has one.
    ///
    /// Nullable columns without a default get `NULL`.
    pub(crate) fn default_sql(&self, column: &Column) -> Option<String> {
        let sql = match column.default.as_ref() {
            None | Some(DefaultValue::Null) => {
                return column.nullable.then(|| "NULL".to_string());
            }
            Some(DefaultValue::Bool(value)) => String::from(if *value { "1" } else { "0" }),
            Some(DefaultValue::Integer(value)) => value.to_string(),
            Some(DefaultValue::Float(value)) => value.to_string(),
            Some(DefaultValue::Text(text)) => {
                if let Some(keyword) = self.profile.default_keyword(text, column.logical_type) {
                    keyword.keyword.clone()
                } else if column.logical_type.is_numeric() && is_numeric_literal(text) {
                    text.trim().to_string()
                } else {
                    quote_literal(text)
                }
            }
        };
        Some(sql)
    }

    /// Returns true if the column default is a dialect keyword expression.
    pub(crate) fn has_keyword_default(&self, column: &Column) -> bool {
        matches!(
            &column.default,
            Some(DefaultValue::Text(text))
                if self.profile.default_keyword(text, column.logical_type).is_some()
        )
    }

    /// Generates an inline foreign key constraint.
    pub(crate) fn foreign_key_definition(&self, fk: &ForeignKey) -> String {
        let mut sql = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote(&fk.name),
            self.quote_list(&fk.columns),
            self.quote(&fk.foreign_table),
            self.quote_list(&fk.foreign_columns)
        );

        if let Some(action) = fk.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.to_sql());
        }
        if let Some(action) = fk.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.to_sql());
        }

        // Deferral is meaningless on a non-deferrable constraint.
        if fk.deferrable {
            sql.push_str(" DEFERRABLE INITIALLY ");
            sql.push_str(if fk.deferred { "DEFERRED" } else { "IMMEDIATE" });
        } else {
            sql.push_str(" NOT DEFERRABLE INITIALLY IMMEDIATE");
        }

        sql
    }

    /// Generates the CREATE TABLE statement alone, without its indexes.
    pub(crate) fn create_table_statement(&self, table: &Table) -> Result<String> {
        let autoincrement = self.autoincrement_column(table)?;

        let mut parts = Vec::with_capacity(table.columns().len() + table.foreign_keys().len() + 1);
        for column in table.columns() {
            let primary = table
                .primary_key()
                .is_some_and(|pk| pk.columns.iter().any(|c| same_name(c, &column.name)));
            parts.push(self.column_definition(column, primary)?);
        }

        if let Some(pk) = table.primary_key() {
            // The autoincrement declaration already carries PRIMARY KEY.
            if autoincrement.is_none() {
                parts.push(format!("PRIMARY KEY({})", self.quote_list(&pk.columns)));
            }
        }

        parts.extend(table.foreign_keys().iter().map(|fk| self.foreign_key_definition(fk)));

        Ok(format!(
            "CREATE TABLE {} ({})",
            self.quote(table.name()),
            parts.join(", ")
        ))
    }

    /// Generates CREATE TABLE followed by one CREATE INDEX per index.
    pub(crate) fn create_table_sql(&self, table: &Table) -> Result<Vec<String>> {
        let mut statements = vec![self.create_table_statement(table)?];
        statements.extend(
            table
                .indexes()
                .iter()
                .map(|index| self.create_index_sql(index, table.name())),
        );
        Ok(statements)
    }

    /// Finds the autoincrement column and checks that it is the whole
    /// primary key.
    fn autoincrement_column<'t>(&self, table: &'t Table) -> Result<Option<&'t Column>> {
        let mut columns = table
            .columns()
            .iter()
            .filter(|c| c.autoincrement && c.logical_type.is_integer_family());

        let Some(column) = columns.next() else {
            return Ok(None);
        };
        if let Some(other) = columns.next() {
            return Err(DdlError::invalid_schema(
                table.name(),
                format!(
                    "more than one autoincrement column ('{}', '{}')",
                    column.name, other.name
                ),
            ));
        }

        let is_sole_key = table
            .primary_key()
            .is_some_and(|pk| pk.spans_columns(std::slice::from_ref(&column.name)));
        if !is_sole_key {
            return Err(DdlError::invalid_schema(
                table.name(),
                format!(
                    "autoincrement column '{}' must be the only primary key column",
                    column.name
                ),
            ));
        }

        Ok(Some(column))
    }

    /// Generates SQL for creating an index.
    pub(crate) fn create_index_sql(&self, index: &Index, table: &str) -> String {
        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote(&index.name));
        sql.push_str(" ON ");
        sql.push_str(&self.quote(table));
        sql.push_str(" (");
        sql.push_str(&self.quote_list(&index.columns));
        sql.push(')');

        if let Some(condition) = &index.condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }

        sql
    }

    /// Generates SQL for dropping an index.
    pub(crate) fn drop_index_sql(&self, name: &str) -> String {
        format!("DROP INDEX {}", self.quote(name))
    }

    /// Generates SQL for dropping a table.
    pub(crate) fn drop_table_sql(&self, name: &str) -> String {
        format!("DROP TABLE {}", self.quote(name))
    }

    /// Generates SQL for renaming a table.
    pub(crate) fn rename_table_sql(&self, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote(old_name),
            self.quote(new_name)
        )
    }

    /// Generates SQL for adding a column.
    pub(crate) fn add_column_sql(&self, table: &str, column: &Column) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote(table),
            self.column_definition(column, false)?
        ))
    }
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn is_numeric_literal(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && text.parse::<f64>().is_ok()
}
