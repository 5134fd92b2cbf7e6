//! Unit of work: one session shared by several repositories.

use std::future::Future;

use crate::database::Database;
use crate::entity::Entity;
use crate::error::Error;
use crate::repository::Repository;
use crate::session::Session;

/// Groups repositories over one session so their work commits or rolls back
/// together.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    db: Database,
    session: Session,
}

impl UnitOfWork {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            session: db.session(),
        }
    }

    /// Run `f` in a new unit of work: commit when it returns `Ok`, roll back
    /// when it returns `Err`. The session is released either way.
    pub async fn run<F, Fut, T, E>(db: &Database, f: F) -> Result<T, E>
    where
        F: FnOnce(UnitOfWork) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Error>,
    {
        let uow = Self::new(db);
        match f(uow.clone()).await {
            Ok(value) => {
                uow.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback after failed unit of work failed");
                }
                Err(err)
            }
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// A repository for `E` sharing this unit's session.
    pub fn repository<E: Entity>(&self) -> Repository<E> {
        Repository::new(self.session.clone())
    }

    /// Commit. A failed commit is rolled back before the error is returned.
    pub async fn commit(&self) -> Result<(), Error> {
        if let Err(err) = self.session.commit().await {
            if let Err(rollback_err) = self.session.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback after failed commit failed");
            }
            return Err(err);
        }
        Ok(())
    }

    pub async fn rollback(&self) -> Result<(), Error> {
        self.session.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestPost, TestUser, test_db};
    use sqlward_types::values;

    #[tokio::test]
    async fn test_repositories_share_session() {
        let db = test_db().await;
        let uow = UnitOfWork::new(&db);
        let users = uow.repository::<TestUser>();
        let posts = uow.repository::<TestPost>();

        let user = users.insert(values! { "name" => "author" }).one().await.unwrap();
        posts
            .insert(values! { "user_id" => user.id, "title" => "hello" })
            .execute()
            .await
            .unwrap();
        assert!(uow.session().in_transaction().await);

        uow.commit().await.unwrap();
        assert_eq!(db.repository::<TestPost>().select().count().await.unwrap(), 1);
        assert_eq!(db.repository::<TestUser>().select().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_commits_on_ok() {
        let db = test_db().await;
        let name: Result<String, Error> = UnitOfWork::run(&db, |uow| async move {
            let user = uow
                .repository::<TestUser>()
                .insert(values! { "name" => "committed" })
                .one()
                .await?;
            Ok(user.name)
        })
        .await;
        assert_eq!(name.unwrap(), "committed");
        assert_eq!(db.repository::<TestUser>().select().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_rolls_back_on_err() {
        let db = test_db().await;
        let result: Result<(), Error> = UnitOfWork::run(&db, |uow| async move {
            uow.repository::<TestUser>()
                .insert(values! { "name" => "doomed" })
                .execute()
                .await?;
            uow.repository::<TestUser>().filter_by("name", "nobody").one().await?;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        assert_eq!(db.repository::<TestUser>().select().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_explicit_rollback() {
        let db = test_db().await;
        let uow = UnitOfWork::new(&db);
        uow.repository::<TestUser>()
            .insert(values! { "name" => "undone" })
            .execute()
            .await
            .unwrap();
        uow.rollback().await.unwrap();
        assert!(!uow.session().in_transaction().await);
        assert_eq!(db.repository::<TestUser>().select().count().await.unwrap(), 0);
    }
}
