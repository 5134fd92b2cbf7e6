//! Entity and temp database shared by the extractor tests.

use sqlx::Row;
use sqlx::any::AnyRow;
use sqlward_infra::entity::get_guid;
use sqlward_infra::{
    ColumnDef, ColumnDefault, ColumnType, Database, Entity, Guid, TableMeta, Values, values,
};

const NOTES: TableMeta = TableMeta::new(
    "notes",
    &[
        ColumnDef::new("id", ColumnType::Uuid)
            .primary_key()
            .server_default(ColumnDefault::GenerateUuid),
        ColumnDef::new("body", ColumnType::Text).not_null(),
    ],
);

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Note {
    pub id: Guid,
    pub body: String,
}

impl Entity for Note {
    const TABLE: &'static TableMeta = &NOTES;

    fn from_row(row: &AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: get_guid(row, "id")?,
            body: row.try_get("body")?,
        })
    }

    fn values(&self) -> Values {
        values! { "id" => self.id, "body" => &self.body }
    }
}

/// Temp SQLite database with the `notes` table created.
pub(crate) async fn test_db() -> Database {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    // Keep the directory alive for the test
    std::mem::forget(dir);
    let db = Database::connect(&url).await.unwrap();
    db.create_all(&[Note::TABLE]).await.unwrap();
    db
}
