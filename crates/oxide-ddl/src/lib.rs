//! Table definitions and table diffs compiled to DDL.
//!
//! `oxide-ddl` turns a platform-neutral description of a table, or the
//! difference between two descriptions, into the statements a SQL dialect
//! needs. The built-in dialect is SQLite, which cannot alter or drop columns
//! and emulates those changes by rebuilding the table.
//!
//! # Architecture
//!
//! - **Schema** - `Table`, `Column`, `Index` and `ForeignKey` values
//! - **Diff** - `TableDiff`, an immutable set of edits against one table
//! - **Comparator** - Derives a `TableDiff` from two tables
//! - **Profile** - Everything dialect-specific, as data
//! - **Platform** - Renders tables and compiles diffs for a profile
//!
//! # Example
//!
//! ```rust
//! use oxide_ddl::prelude::*;
//!
//! let table = Table::builder("user")
//!     .column(Column::new("id", LogicalType::Integer).autoincrement())
//!     .column(Column::new("name", LogicalType::String).length(255))
//!     .primary_key(["id"])
//!     .build()?;
//!
//! let platform = Platform::sqlite();
//! assert_eq!(
//!     platform.render_create_table(&table)?,
//!     vec!["CREATE TABLE user (id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
//!           name VARCHAR(255) NOT NULL)"]
//! );
//!
//! let diff = TableDiff::builder(table)
//!     .rename_column("name", Column::new("login", LogicalType::String).length(255))
//!     .build()?;
//! assert_eq!(platform.compile_diff(&diff)?.len(), 5);
//! # Ok::<(), oxide_ddl::DdlError>(())
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Render a table definition
//! oxide-ddl create-table user.json
//!
//! # Compile a table diff with a custom profile
//! oxide-ddl --profile legacy.toml alter-table user-diff.json
//!
//! # Inspect quoting and type mapping
//! oxide-ddl quote select user
//! oxide-ddl map-type string --length 32 --fixed
//! ```

pub mod comparator;
pub mod diff;
pub mod error;
pub mod identifier;
pub mod platform;
pub mod profile;
pub mod schema;
pub mod types;

pub use error::{DdlError, Result};
pub use platform::Platform;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::comparator::{Comparator, ComparatorOptions, RenameHints};
    pub use crate::diff::{ColumnChange, IndexRename, TableDiff, TableDiffBuilder};
    pub use crate::error::{DdlError, Result};
    pub use crate::platform::{Platform, Strategy};
    pub use crate::profile::{Capabilities, DanglingForeignKeyPolicy, PlatformProfile};
    pub use crate::schema::{
        Column, DefaultValue, ForeignKey, ForeignKeyAction, Index, Table, TableBuilder,
        TableParts,
    };
    pub use crate::types::{LogicalType, TypeOptions};
}
