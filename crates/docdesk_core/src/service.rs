//! Contract with the external auth + storage backend.
//!
//! The backend is reached over a client library; these traits are the only
//! surface the rest of the workspace sees. Two implementations ship with the
//! workspace: [`crate::memory::InMemoryDataService`] and the REST client in
//! `docdesk_client`.
//!
//! Implementations must be `Send + Sync` so one handle can be shared by every
//! component of a session.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::model::{
    AuthUser, Document, NewDocument, NewUserProfile, SignUpOptions, UserUpsert,
};

/// Identity issuance and verification.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// The user owning the active session, if any.
    async fn current_user(&self) -> Result<Option<AuthUser>, ServiceError>;

    /// Start a session with email and password.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, ServiceError>;

    /// Register a new account. The provider may require email verification
    /// before the account can sign in.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        options: &SignUpOptions,
    ) -> Result<AuthUser, ServiceError>;

    /// End the active session. Signing out without a session is not an error.
    async fn sign_out(&self) -> Result<(), ServiceError>;
}

/// Row operations on the `documents` table.
#[async_trait]
pub trait DocumentTable: Send + Sync {
    /// All documents with `created_by == owner_id`, newest `created_at` first.
    async fn list_documents(&self, owner_id: &str) -> Result<Vec<Document>, ServiceError>;

    /// Insert one row and return it as stored, with its assigned id.
    async fn insert_document(&self, document: &NewDocument) -> Result<Document, ServiceError>;

    /// Delete the row with this id. Deleting a missing id succeeds.
    async fn delete_document(&self, id: &str) -> Result<(), ServiceError>;
}

/// Row operations on the `users` table.
#[async_trait]
pub trait UserTable: Send + Sync {
    /// Insert or merge a profile row, keyed on `id`.
    async fn upsert_user(&self, user: &UserUpsert) -> Result<(), ServiceError>;

    /// Insert a fresh profile row. Fails with [`ServiceError::Conflict`] when
    /// the id already exists.
    async fn insert_user(&self, user: &NewUserProfile) -> Result<(), ServiceError>;
}

/// A full backend: auth plus both tables.
pub trait RemoteDataService: AuthService + DocumentTable + UserTable {}

impl<T: AuthService + DocumentTable + UserTable> RemoteDataService for T {}
