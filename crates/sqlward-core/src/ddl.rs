//! `CREATE TABLE` / `DROP TABLE` rendering from table metadata.
//!
//! Meant for tests and prototypes; real schemas go through migrations.

use sqlward_types::Dialect;

use crate::render::quote_ident;
use crate::schema::{ColumnDef, ColumnDefault, ColumnType, TableMeta};

/// SQL expression producing a random v4-shaped UUID string.
pub fn generate_uuid_sql(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => "(GEN_RANDOM_UUID()::text)",
        Dialect::Sqlite => {
            "(lower(hex(randomblob(4))) || '-' || lower(hex(randomblob(2))) || '-4' || \
             substr(lower(hex(randomblob(2))), 2) || '-' || \
             substr('89ab', abs(random()) % 4 + 1, 1) || \
             substr(lower(hex(randomblob(2))), 2) || '-' || lower(hex(randomblob(6))))"
        }
    }
}

/// SQL expression producing the current UTC time as RFC 3339 text with
/// microsecond precision, matching how timestamp values are bound.
pub fn now_sql(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => {
            "(to_char(now() AT TIME ZONE 'UTC', 'YYYY-MM-DD\"T\"HH24:MI:SS.US\"Z\"'))"
        }
        Dialect::Sqlite => "(strftime('%Y-%m-%dT%H:%M:%f000Z', 'now'))",
    }
}

pub fn column_type_sql(column_type: ColumnType, dialect: Dialect) -> &'static str {
    match (column_type, dialect) {
        (ColumnType::Text, _) => "TEXT",
        (ColumnType::Integer, Dialect::Sqlite) => "INTEGER",
        (ColumnType::Integer, Dialect::Postgres) => "BIGINT",
        (ColumnType::Real, Dialect::Sqlite) => "REAL",
        (ColumnType::Real, Dialect::Postgres) => "DOUBLE PRECISION",
        (ColumnType::Boolean, _) => "BOOLEAN",
        (ColumnType::Uuid, _) => "CHAR(36)",
        (ColumnType::Timestamp, _) => "TEXT",
        (ColumnType::Json, _) => "TEXT",
    }
}

pub fn default_sql(default: &ColumnDefault, dialect: Dialect) -> String {
    match default {
        ColumnDefault::GenerateUuid => generate_uuid_sql(dialect).to_string(),
        ColumnDefault::Now => now_sql(dialect).to_string(),
        ColumnDefault::Int(i) => i.to_string(),
        ColumnDefault::Bool(b) => match dialect {
            Dialect::Postgres => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            Dialect::Sqlite => (if *b { "1" } else { "0" }).to_string(),
        },
        ColumnDefault::Text(s) => format!("'{}'", s.replace('\'', "''")),
        ColumnDefault::Sql(sql) => sql.to_string(),
    }
}

fn column_sql(column: &ColumnDef, dialect: Dialect) -> String {
    let mut sql = format!(
        "{} {}",
        quote_ident(column.name),
        column_type_sql(column.column_type, dialect)
    );
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if column.unique {
        sql.push_str(" UNIQUE");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default_sql(default, dialect));
    }
    sql
}

pub fn create_table_sql(table: &TableMeta, dialect: Dialect) -> String {
    let mut parts: Vec<String> = table.columns.iter().map(|c| column_sql(c, dialect)).collect();
    let pk: Vec<String> = table.primary_key().map(|c| quote_ident(c.name)).collect();
    if !pk.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", pk.join(", ")));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table.name),
        parts.join(", ")
    )
}

pub fn drop_table_sql(table: &TableMeta) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(table.name))
}
