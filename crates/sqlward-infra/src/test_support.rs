//! Entities and temp databases shared by the unit tests.

use std::time::Duration;

use sqlx::Row;
use sqlx::any::AnyRow;
use sqlward_core::{ColumnDef, ColumnDefault, ColumnType, SortOrder, TableMeta, mixins};
use sqlward_types::{Guid, Values, values};

use crate::database::Database;
use crate::entity::{Entity, get_bool, get_datetime, get_guid};

const USERS: TableMeta = TableMeta::new(
    "users",
    &[
        ColumnDef::new("id", ColumnType::Uuid)
            .primary_key()
            .server_default(ColumnDefault::GenerateUuid),
        ColumnDef::new("name", ColumnType::Text).not_null(),
        ColumnDef::new("last_name", ColumnType::Text),
        ColumnDef::new("age", ColumnType::Integer),
    ],
)
.order_by("name", SortOrder::Asc);

const POSTS: TableMeta = TableMeta::new(
    "posts",
    &[
        ColumnDef::new("id", ColumnType::Uuid)
            .primary_key()
            .server_default(ColumnDefault::GenerateUuid),
        ColumnDef::new("user_id", ColumnType::Uuid).not_null(),
        ColumnDef::new("title", ColumnType::Text).not_null(),
        ColumnDef::new("created_at", ColumnType::Timestamp)
            .not_null()
            .server_default(ColumnDefault::Now),
    ],
);

const NOTES: TableMeta = TableMeta::new(
    "notes",
    &[
        mixins::uuid_primary_key("id"),
        ColumnDef::new("body", ColumnType::Text).not_null(),
        mixins::tombstone(),
        mixins::created_at(),
        mixins::updated_at(),
    ],
)
.order_by("body", SortOrder::Asc);

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TestUser {
    pub id: Guid,
    pub name: String,
    pub last_name: Option<String>,
    pub age: Option<i64>,
}

impl Entity for TestUser {
    const TABLE: &'static TableMeta = &USERS;

    fn from_row(row: &AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: get_guid(row, "id")?,
            name: row.try_get("name")?,
            last_name: row.try_get("last_name")?,
            age: row.try_get("age")?,
        })
    }

    fn values(&self) -> Values {
        values! {
            "id" => self.id,
            "name" => &self.name,
            "last_name" => self.last_name.clone(),
            "age" => self.age,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TestPost {
    pub id: Guid,
    pub user_id: Guid,
    pub title: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Entity for TestPost {
    const TABLE: &'static TableMeta = &POSTS;

    fn from_row(row: &AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: get_guid(row, "id")?,
            user_id: get_guid(row, "user_id")?,
            title: row.try_get("title")?,
            created_at: get_datetime(row, "created_at")?,
        })
    }

    fn values(&self) -> Values {
        values! {
            "id" => self.id,
            "user_id" => self.user_id,
            "title" => &self.title,
            "created_at" => self.created_at,
        }
    }
}

/// Entity with timestamps and a soft-delete flag.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TestNote {
    pub id: Guid,
    pub body: String,
    pub tombstone: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Entity for TestNote {
    const TABLE: &'static TableMeta = &NOTES;

    fn from_row(row: &AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: get_guid(row, "id")?,
            body: row.try_get("body")?,
            tombstone: get_bool(row, "tombstone")?,
            created_at: get_datetime(row, "created_at")?,
            updated_at: get_datetime(row, "updated_at")?,
        })
    }

    fn values(&self) -> Values {
        values! {
            "id" => self.id,
            "body" => &self.body,
            "tombstone" => self.tombstone,
            "created_at" => self.created_at,
            "updated_at" => self.updated_at,
        }
    }
}

/// URL of a fresh SQLite file in a temp dir that outlives the test.
pub(crate) fn sqlite_url() -> String {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    // Keep the directory alive for the test
    std::mem::forget(dir);
    url
}

/// Temp database with the `users`, `posts` and `notes` tables created.
pub(crate) async fn test_db() -> Database {
    let db = Database::connect(&sqlite_url()).await.unwrap();
    db.create_all(&[TestUser::TABLE, TestPost::TABLE, TestNote::TABLE])
        .await
        .unwrap();
    db
}

/// Wait until every connection is back in the pool; returns happen on a
/// background task after a session lets go of its connection.
pub(crate) async fn wait_for_idle(db: &Database) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while db.pool_status().checked_out > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connections were not returned to the pool");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_server_defaults_decode() {
        let db = test_db().await;
        let session = db.session();
        let user = session
            .repository::<TestUser>()
            .insert(values! { "name" => "writer" })
            .one()
            .await
            .unwrap();
        let before = chrono::Utc::now() - chrono::Duration::seconds(5);
        let post = session
            .repository::<TestPost>()
            .insert(values! { "user_id" => user.id, "title" => "t" })
            .one()
            .await
            .unwrap();
        assert_eq!(post.user_id, user.id);
        assert_ne!(post.id, user.id);
        assert!(post.created_at > before);
    }

    #[tokio::test]
    async fn test_server_timestamps_match_bound_timestamps() {
        let db = test_db().await;
        let session = db.session();
        let user = session
            .repository::<TestUser>()
            .insert(values! { "name" => "writer" })
            .one()
            .await
            .unwrap();
        let posts = session.repository::<TestPost>();
        let stamped = posts
            .insert(values! { "user_id" => user.id, "title" => "server" })
            .one()
            .await
            .unwrap();

        // The decoded server default, bound back as a parameter, finds its row.
        let found = posts
            .filter_by("created_at", stamped.created_at)
            .one()
            .await
            .unwrap();
        assert_eq!(found.id, stamped.id);

        // Client-written times sort against server-written ones by time.
        let later = stamped.created_at + chrono::Duration::milliseconds(1);
        posts
            .insert(values! { "user_id" => user.id, "title" => "client", "created_at" => later })
            .execute()
            .await
            .unwrap();
        let titles: Vec<String> = posts
            .select()
            .order_by(sqlward_core::col("created_at").asc())
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["server", "client"]);
        assert_eq!(
            posts
                .filter(sqlward_core::col("created_at").gt(stamped.created_at))
                .count()
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_note_defaults_decode() {
        let db = test_db().await;
        let note = db
            .repository::<TestNote>()
            .insert(values! { "body" => "hello" })
            .one()
            .await
            .unwrap();
        assert!(!note.tombstone);
        assert_eq!(note.created_at, note.updated_at);
    }
}
