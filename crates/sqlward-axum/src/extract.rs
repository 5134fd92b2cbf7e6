//! Request-scoped sessions and repositories as axum extractors.
//!
//! The first extractor to run in a request opens a [`Session`] on the
//! [`Database`] found in the router state and parks it in the request
//! extensions; later extractors in the same request reuse it. The session
//! is dropped with the request, which rolls back anything not committed.

use std::convert::Infallible;
use std::ops::Deref;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use sqlward_infra::{Database, Entity, Repository, Session};

fn request_session<S>(parts: &mut Parts, state: &S) -> Session
where
    Database: FromRef<S>,
{
    if let Some(session) = parts.extensions.get::<Session>() {
        return session.clone();
    }
    let session = Database::from_ref(state).session();
    tracing::trace!(path = %parts.uri.path(), "opened request session");
    parts.extensions.insert(session.clone());
    session
}

/// Hands out repositories for any entity, all bound to the request session.
#[derive(Debug, Clone)]
pub struct RepositoryProvider {
    session: Session,
}

impl RepositoryProvider {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Repository for `E` on the request session.
    pub fn get<E: Entity>(&self) -> Repository<E> {
        Repository::new(self.session.clone())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl<S> FromRequestParts<S> for RepositoryProvider
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::new(request_session(parts, state)))
    }
}

/// Repository for `E` bound to the request session.
#[derive(Debug, Clone)]
pub struct Repo<E>(pub Repository<E>);

impl<E> Deref for Repo<E> {
    type Target = Repository<E>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, E> FromRequestParts<S> for Repo<E>
where
    Database: FromRef<S>,
    S: Send + Sync,
    E: Entity,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Repo(Repository::new(request_session(parts, state))))
    }
}

/// The raw request session, for handlers that commit or roll back
/// explicitly or run hand-written SQL.
#[derive(Debug, Clone)]
pub struct DbSession(pub Session);

impl Deref for DbSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for DbSession
where
    Database: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(DbSession(request_session(parts, state)))
    }
}
