//! The platform facade.
//!
//! A [`Platform`] pairs a [`PlatformProfile`] with the renderer and the diff
//! compiler. It holds no other state and can be shared between threads.

mod alter;
mod correspondence;
mod render;

pub use alter::Strategy;
pub use correspondence::{Correspondence, SurvivingColumn};

use crate::comparator::{Comparator, RenameHints};
use crate::diff::TableDiff;
use crate::error::Result;
use crate::profile::PlatformProfile;
use crate::schema::Table;
use crate::types::{LogicalType, TypeOptions};

use render::Renderer;

/// DDL generation for one dialect.
#[derive(Debug, Clone, Default)]
pub struct Platform {
    profile: PlatformProfile,
}

impl Platform {
    /// Creates a platform for a profile.
    #[must_use]
    pub fn new(profile: PlatformProfile) -> Self {
        Self { profile }
    }

    /// Creates the SQLite platform.
    #[must_use]
    pub fn sqlite() -> Self {
        Self::new(PlatformProfile::sqlite())
    }

    /// The dialect profile.
    #[must_use]
    pub fn profile(&self) -> &PlatformProfile {
        &self.profile
    }

    /// Quotes an identifier if the dialect requires it.
    #[must_use]
    pub fn quote_identifier(&self, name: &str) -> String {
        self.profile.quoter().quote(name)
    }

    /// Maps a logical type to the dialect type declaration.
    pub fn map_type(&self, logical_type: LogicalType, options: &TypeOptions) -> Result<String> {
        self.profile.types.map_type(logical_type, options)
    }

    /// Generates `CREATE TABLE` followed by one `CREATE INDEX` per index.
    pub fn render_create_table(&self, table: &Table) -> Result<Vec<String>> {
        Renderer::new(&self.profile).create_table_sql(table)
    }

    /// Compiles a diff into the statements that apply it.
    ///
    /// The statements must run in one transaction; a failure halfway through
    /// a rebuild leaves the table dropped.
    pub fn compile_diff(&self, diff: &TableDiff) -> Result<Vec<String>> {
        alter::compile(&self.profile, diff)
    }

    /// Returns the strategy [`Platform::compile_diff`] uses for a diff.
    pub fn strategy(&self, diff: &TableDiff) -> Result<Strategy> {
        Ok(alter::plan(&self.profile, diff)?.strategy)
    }

    /// Returns the table that results from applying a diff.
    pub fn altered_table(&self, diff: &TableDiff) -> Result<Table> {
        correspondence::altered_table(diff, &self.profile)
    }

    /// Returns the diff that undoes `diff`.
    ///
    /// Renamed and re-declared columns keep their identity in the reverse
    /// direction; everything else is matched by name.
    pub fn reverse_diff(&self, diff: &TableDiff) -> Result<TableDiff> {
        let altered = self.altered_table(diff)?;

        let mut hints = RenameHints::new();
        for change in diff.renamed_columns().iter().chain(diff.changed_columns()) {
            hints = hints.column(change.column.name.clone(), change.old_name.clone());
        }
        for rename in diff.renamed_indexes() {
            hints = hints.index(rename.new_name.clone(), rename.old_name.clone());
        }

        Comparator::new().compare_with_renames(&altered, diff.from_table(), &hints)
    }
}
