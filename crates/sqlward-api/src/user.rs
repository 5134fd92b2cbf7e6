//! The `users` entity and its request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use sqlx::any::AnyRow;
use sqlward_infra::entity::{get_datetime, get_guid};
use sqlward_infra::{ColumnDef, ColumnType, Entity, Guid, SortOrder, TableMeta, Values, mixins, values};

/// Mirrors `migrations/0001_users.sql`.
const USERS: TableMeta = TableMeta::new(
    "users",
    &[
        mixins::uuid_primary_key("id"),
        ColumnDef::new("name", ColumnType::Text).not_null(),
        ColumnDef::new("email", ColumnType::Text).unique(),
        ColumnDef::new("age", ColumnType::Integer),
        mixins::created_at(),
        mixins::updated_at(),
    ],
)
.order_by("name", SortOrder::Asc);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Guid,
    pub name: String,
    pub email: Option<String>,
    pub age: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    const TABLE: &'static TableMeta = &USERS;

    fn from_row(row: &AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: get_guid(row, "id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            age: row.try_get("age")?,
            created_at: get_datetime(row, "created_at")?,
            updated_at: get_datetime(row, "updated_at")?,
        })
    }

    fn values(&self) -> Values {
        values! {
            "id" => self.id,
            "name" => &self.name,
            "email" => self.email.clone(),
            "age" => self.age,
            "created_at" => self.created_at,
            "updated_at" => self.updated_at,
        }
    }
}

/// Body of `POST /api/v1/users`.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: Option<String>,
    pub age: Option<i64>,
}

impl CreateUser {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        validate_age(self.age)
    }

    /// Column values; unset optional fields are left to the database.
    pub fn into_values(self) -> Values {
        let mut values = values! { "name" => self.name.trim() };
        if let Some(email) = self.email {
            values.insert("email", email);
        }
        if let Some(age) = self.age {
            values.insert("age", age);
        }
        values
    }
}

/// Body of `PUT /api/v1/users/{id}`; only the fields present are changed.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
}

impl UpdateUser {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err("name must not be empty".to_string());
        }
        validate_age(self.age)
    }

    pub fn into_values(self) -> Values {
        let mut values = Values::new();
        if let Some(name) = self.name {
            values.insert("name", name.trim());
        }
        if let Some(email) = self.email {
            values.insert("email", email);
        }
        if let Some(age) = self.age {
            values.insert("age", age);
        }
        values
    }
}

fn validate_age(age: Option<i64>) -> Result<(), String> {
    match age {
        Some(age) if !(0..=150).contains(&age) => Err(format!("age {age} is out of range")),
        _ => Ok(()),
    }
}
