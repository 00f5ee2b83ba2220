//! Table schema definitions
//!
//! Single source of truth for the user-owned tables. The same definitions
//! drive `CREATE TABLE`, missing-column synchronization and the identifier
//! whitelist the record store checks before building any SQL.

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnDefinition {
    pub name: &'static str,
    /// SQL type (e.g., "TEXT", "INTEGER", "REAL")
    pub sql_type: &'static str,
    pub not_null: bool,
    pub default_value: Option<&'static str>,
    /// Whether clients may write this column through create/update
    pub writable: bool,
}

impl ColumnDefinition {
    const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            not_null: false,
            default_value: None,
            writable: true,
        }
    }

    const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    const fn default(mut self, value: &'static str) -> Self {
        self.default_value = Some(value);
        self
    }

    const fn system(mut self) -> Self {
        self.writable = false;
        self
    }

    fn ddl(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);
        if self.name == ID_COLUMN {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        sql
    }
}

/// Primary key column shared by every user-owned table
pub const ID_COLUMN: &str = "id";
/// Ownership column shared by every user-owned table
pub const USER_COLUMN: &str = "user_id";

/// Definition of one user-owned table
#[derive(Debug, Clone, Copy)]
pub struct TableDefinition {
    pub name: &'static str,
    pub columns: &'static [ColumnDefinition],
}

impl TableDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column exists and clients may write it
    pub fn is_writable(&self, name: &str) -> bool {
        self.column(name).map(|c| c.writable).unwrap_or(false)
    }

    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| c.ddl()).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {},\n    \
             FOREIGN KEY ({}) REFERENCES users(id) ON DELETE CASCADE\n)",
            self.name,
            columns.join(",\n    "),
            USER_COLUMN
        )
    }
}

const ID: ColumnDefinition = ColumnDefinition::new(ID_COLUMN, "TEXT").system();
const USER_ID: ColumnDefinition = ColumnDefinition::new(USER_COLUMN, "TEXT").not_null();
const CREATED_AT: ColumnDefinition =
    ColumnDefinition::new("created_at", "TEXT").not_null().system();
const UPDATED_AT: ColumnDefinition =
    ColumnDefinition::new("updated_at", "TEXT").not_null().system();

pub const NOTES: TableDefinition = TableDefinition {
    name: "notes",
    columns: &[
        ID,
        USER_ID,
        ColumnDefinition::new("title", "TEXT").not_null().default("''"),
        ColumnDefinition::new("content", "TEXT").not_null().default("''"),
        ColumnDefinition::new("meeting_id", "TEXT"),
        CREATED_AT,
        UPDATED_AT,
    ],
};

pub const CONTACTS: TableDefinition = TableDefinition {
    name: "contacts",
    columns: &[
        ID,
        USER_ID,
        ColumnDefinition::new("name", "TEXT").not_null().default("''"),
        ColumnDefinition::new("email", "TEXT"),
        ColumnDefinition::new("company", "TEXT"),
        ColumnDefinition::new("phone", "TEXT"),
        ColumnDefinition::new("notes", "TEXT"),
        CREATED_AT,
        UPDATED_AT,
    ],
};

pub const MEETINGS: TableDefinition = TableDefinition {
    name: "meetings",
    columns: &[
        ID,
        USER_ID,
        ColumnDefinition::new("title", "TEXT").not_null().default("''"),
        ColumnDefinition::new("status", "TEXT").not_null().default("'scheduled'"),
        ColumnDefinition::new("scheduled_at", "TEXT"),
        ColumnDefinition::new("duration_seconds", "INTEGER"),
        ColumnDefinition::new("recording_path", "TEXT"),
        ColumnDefinition::new("transcript", "TEXT"),
        ColumnDefinition::new("summary", "TEXT"),
        CREATED_AT,
        UPDATED_AT,
    ],
};

pub const CALENDAR_EVENTS: TableDefinition = TableDefinition {
    name: "calendar_events",
    columns: &[
        ID,
        USER_ID,
        ColumnDefinition::new("title", "TEXT").not_null().default("''"),
        ColumnDefinition::new("starts_at", "TEXT"),
        ColumnDefinition::new("ends_at", "TEXT"),
        ColumnDefinition::new("location", "TEXT"),
        ColumnDefinition::new("meeting_id", "TEXT"),
        CREATED_AT,
        UPDATED_AT,
    ],
};

/// Every table reachable through the record store
pub const USER_TABLES: &[TableDefinition] = &[NOTES, CONTACTS, MEETINGS, CALENDAR_EVENTS];

/// Look up a user-owned table by name
///
/// Returns `None` for unknown names, including anything that is not a plain
/// identifier, so callers can safely interpolate the returned definition's
/// name into SQL.
///
/// # Examples
///
/// ```
/// use mrec_common::db::schema::table_definition;
///
/// assert!(table_definition("notes").is_some());
/// assert!(table_definition("users").is_none());
/// assert!(table_definition("notes; DROP TABLE notes").is_none());
/// ```
pub fn table_definition(name: &str) -> Option<&'static TableDefinition> {
    USER_TABLES.iter().find(|t| t.name == name)
}

/// Add columns present in the definition but missing from the database
///
/// Only additive changes are applied; a column that changed type is logged
/// and left alone.
pub async fn sync_table_columns(pool: &SqlitePool, table: &TableDefinition) -> Result<()> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table.name))
        .fetch_all(pool)
        .await?;

    let actual: Vec<(String, String)> = rows
        .iter()
        .map(|row| (row.get::<String, _>("name"), row.get::<String, _>("type")))
        .collect();

    for column in table.columns {
        match actual.iter().find(|(name, _)| name == column.name) {
            None => {
                // SQLite only accepts NOT NULL on ADD COLUMN with a default
                let mut sql = format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table.name, column.name, column.sql_type
                );
                if let Some(default) = column.default_value {
                    if column.not_null {
                        sql.push_str(" NOT NULL");
                    }
                    sql.push_str(&format!(" DEFAULT {}", default));
                }
                sqlx::query(&sql).execute(pool).await?;
                info!("Added missing column {}.{}", table.name, column.name);
            }
            Some((_, actual_type)) if !actual_type.eq_ignore_ascii_case(column.sql_type) => {
                warn!(
                    "Type mismatch in {}.{}: expected '{}', found '{}'",
                    table.name, column.name, column.sql_type, actual_type
                );
            }
            Some(_) => {}
        }
    }

    Ok(())
}
