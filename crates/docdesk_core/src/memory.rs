//! In-process backend used for development, demos, and tests.
//!
//! Behaves like the hosted service for the calls the workspace makes: ids are
//! assigned on insert, lists are owner-filtered and newest first, and upserts
//! merge on `id`. Failures can be injected per call site with
//! [`InMemoryDataService::fail_on`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::error::ServiceError;
use crate::model::{
    AuthUser, Document, NewDocument, NewUserProfile, SignUpOptions, UserProfile, UserUpsert,
};
use crate::service::{AuthService, DocumentTable, UserTable};

/// Call sites of the in-memory backend, for failure injection and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    /// [`AuthService::current_user`]
    CurrentUser,
    /// [`AuthService::sign_in`]
    SignIn,
    /// [`AuthService::sign_up`]
    SignUp,
    /// [`AuthService::sign_out`]
    SignOut,
    /// [`DocumentTable::list_documents`]
    ListDocuments,
    /// [`DocumentTable::insert_document`]
    InsertDocument,
    /// [`DocumentTable::delete_document`]
    DeleteDocument,
    /// [`UserTable::upsert_user`]
    UpsertUser,
    /// [`UserTable::insert_user`]
    InsertUser,
}

#[derive(Debug, Clone)]
struct Account {
    user: AuthUser,
    password: String,
    full_name: Option<String>,
    email_redirect_to: Option<String>,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    session: Option<AuthUser>,
    documents: Vec<Document>,
    users: HashMap<String, UserProfile>,
    failures: HashMap<Call, ServiceError>,
    calls: HashMap<Call, usize>,
}

/// Backend that keeps accounts, the session, and both tables in memory.
#[derive(Default)]
pub struct InMemoryDataService {
    state: Mutex<State>,
}

impl InMemoryDataService {
    /// Create an empty backend with no accounts and no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account and start a session for it (builder pattern).
    pub fn with_signed_in_user(self, id: &str, email: &str) -> Self {
        self.register_account(id, email, "password");
        self.set_session(Some(AuthUser {
            id: id.to_string(),
            email: Some(email.to_string()),
        }));
        self
    }

    /// Add a document row as-is (builder pattern).
    pub fn with_document(self, document: Document) -> Self {
        self.seed_document(document);
        self
    }

    /// Register an account that can later sign in.
    pub fn register_account(&self, id: &str, email: &str, password: &str) {
        if let Ok(mut state) = self.lock() {
            state.accounts.insert(
                email.to_string(),
                Account {
                    user: AuthUser {
                        id: id.to_string(),
                        email: Some(email.to_string()),
                    },
                    password: password.to_string(),
                    full_name: None,
                    email_redirect_to: None,
                },
            );
        }
    }

    /// Replace the active session directly, bypassing sign-in.
    pub fn set_session(&self, user: Option<AuthUser>) {
        if let Ok(mut state) = self.lock() {
            state.session = user;
        }
    }

    /// Insert a document row without going through [`DocumentTable`].
    pub fn seed_document(&self, document: Document) {
        if let Ok(mut state) = self.lock() {
            state.documents.push(document);
        }
    }

    /// Make every subsequent `call` fail with `error` until cleared.
    pub fn fail_on(&self, call: Call, error: ServiceError) {
        if let Ok(mut state) = self.lock() {
            state.failures.insert(call, error);
        }
    }

    /// Make every call fail with a transport error, as if the service were
    /// unreachable.
    pub fn go_offline(&self) {
        if let Ok(mut state) = self.lock() {
            for call in ALL_CALLS {
                state
                    .failures
                    .insert(call, ServiceError::Transport("service unreachable".to_string()));
            }
        }
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.lock() {
            state.failures.clear();
        }
    }

    /// How many times `call` has been invoked, including failed invocations.
    pub fn call_count(&self, call: Call) -> usize {
        self.lock()
            .map(|state| state.calls.get(&call).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Every stored document row, in insertion order.
    pub fn stored_documents(&self) -> Vec<Document> {
        self.lock()
            .map(|state| state.documents.clone())
            .unwrap_or_default()
    }

    /// The stored profile row for `id`.
    pub fn stored_user(&self, id: &str) -> Option<UserProfile> {
        self.lock().ok().and_then(|state| state.users.get(id).cloned())
    }

    /// Display name recorded for an account at sign-up.
    pub fn account_full_name(&self, email: &str) -> Option<String> {
        self.lock()
            .ok()
            .and_then(|state| state.accounts.get(email).and_then(|a| a.full_name.clone()))
    }

    /// Verification redirect requested for an account at sign-up.
    pub fn account_email_redirect(&self, email: &str) -> Option<String> {
        self.lock().ok().and_then(|state| {
            state
                .accounts
                .get(email)
                .and_then(|a| a.email_redirect_to.clone())
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ServiceError> {
        self.state
            .lock()
            .map_err(|_| ServiceError::Transport("Failed to lock in-memory store".to_string()))
    }

    /// Record the call and return the injected failure, if any.
    fn enter(&self, call: Call) -> Result<MutexGuard<'_, State>, ServiceError> {
        let mut state = self.lock()?;
        *state.calls.entry(call).or_insert(0) += 1;
        if let Some(err) = state.failures.get(&call) {
            debug!(?call, "injected failure");
            return Err(err.clone());
        }
        Ok(state)
    }
}

const ALL_CALLS: [Call; 9] = [
    Call::CurrentUser,
    Call::SignIn,
    Call::SignUp,
    Call::SignOut,
    Call::ListDocuments,
    Call::InsertDocument,
    Call::DeleteDocument,
    Call::UpsertUser,
    Call::InsertUser,
];

#[async_trait]
impl AuthService for InMemoryDataService {
    async fn current_user(&self) -> Result<Option<AuthUser>, ServiceError> {
        let state = self.enter(Call::CurrentUser)?;
        Ok(state.session.clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, ServiceError> {
        let mut state = self.enter(Call::SignIn)?;
        let user = match state.accounts.get(email) {
            Some(account) if account.password == password => account.user.clone(),
            _ => {
                return Err(ServiceError::Rejected {
                    status: 400,
                    message: "Invalid login credentials".to_string(),
                });
            }
        };
        state.session = Some(user.clone());
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        options: &SignUpOptions,
    ) -> Result<AuthUser, ServiceError> {
        let mut state = self.enter(Call::SignUp)?;
        if state.accounts.contains_key(email) {
            return Err(ServiceError::Conflict("User already registered".to_string()));
        }
        let user = AuthUser {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
        };
        state.accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.to_string(),
                full_name: options.full_name.clone(),
                email_redirect_to: options.email_redirect_to.clone(),
            },
        );
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), ServiceError> {
        let mut state = self.enter(Call::SignOut)?;
        state.session = None;
        Ok(())
    }
}

#[async_trait]
impl DocumentTable for InMemoryDataService {
    async fn list_documents(&self, owner_id: &str) -> Result<Vec<Document>, ServiceError> {
        let state = self.enter(Call::ListDocuments)?;
        // Reverse first so equal timestamps list the most recent insert first.
        let mut rows: Vec<Document> = state
            .documents
            .iter()
            .rev()
            .filter(|doc| doc.created_by == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_document(&self, document: &NewDocument) -> Result<Document, ServiceError> {
        let mut state = self.enter(Call::InsertDocument)?;
        let row = document
            .clone()
            .into_document(uuid::Uuid::new_v4().to_string());
        state.documents.push(row.clone());
        Ok(row)
    }

    async fn delete_document(&self, id: &str) -> Result<(), ServiceError> {
        let mut state = self.enter(Call::DeleteDocument)?;
        state.documents.retain(|doc| doc.id != id);
        Ok(())
    }
}

#[async_trait]
impl UserTable for InMemoryDataService {
    async fn upsert_user(&self, user: &UserUpsert) -> Result<(), ServiceError> {
        let mut state = self.enter(Call::UpsertUser)?;
        state
            .users
            .entry(user.id.clone())
            .and_modify(|row| {
                row.email = user.email.clone();
                row.last_login = Some(user.last_login);
            })
            .or_insert_with(|| UserProfile {
                id: user.id.clone(),
                email: user.email.clone(),
                full_name: None,
                avatar_url: None,
                created_at: Utc::now(),
                last_login: Some(user.last_login),
            });
        Ok(())
    }

    async fn insert_user(&self, user: &NewUserProfile) -> Result<(), ServiceError> {
        let mut state = self.enter(Call::InsertUser)?;
        if state.users.contains_key(&user.id) {
            return Err(ServiceError::Conflict(format!(
                "duplicate key value violates unique constraint \"users_pkey\" ({})",
                user.id
            )));
        }
        state.users.insert(
            user.id.clone(),
            UserProfile {
                id: user.id.clone(),
                email: user.email.clone(),
                full_name: user.full_name.clone(),
                avatar_url: None,
                created_at: user.created_at,
                last_login: user.last_login,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentType;
    use chrono::Duration;

    fn draft(title: &str, owner: &str, minutes_ago: i64) -> NewDocument {
        NewDocument::draft(
            title,
            DocumentType::Document,
            owner,
            Utc::now() - Duration::minutes(minutes_ago),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn list_is_owner_scoped_and_newest_first() {
        let service = InMemoryDataService::new();
        service.insert_document(&draft("old", "u1", 30)).await.unwrap();
        service.insert_document(&draft("theirs", "u2", 10)).await.unwrap();
        service.insert_document(&draft("new", "u1", 1)).await.unwrap();

        let titles: Vec<String> = service
            .list_documents("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.title)
            .collect();
        assert_eq!(titles, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn insert_assigns_distinct_ids() {
        let service = InMemoryDataService::new();
        let a = service.insert_document(&draft("a", "u1", 0)).await.unwrap();
        let b = service.insert_document(&draft("b", "u1", 0)).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(service.stored_documents().len(), 2);
    }

    #[tokio::test]
    async fn delete_of_missing_id_succeeds() {
        let service = InMemoryDataService::new();
        service.delete_document("nope").await.unwrap();
        assert_eq!(service.call_count(Call::DeleteDocument), 1);
    }

    #[tokio::test]
    async fn sign_in_checks_password_and_sets_session() {
        let service = InMemoryDataService::new();
        service.register_account("u1", "ada@example.com", "hunter22");

        let err = service.sign_in("ada@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected { status: 400, .. }));
        assert!(service.current_user().await.unwrap().is_none());

        let user = service.sign_in("ada@example.com", "hunter22").await.unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(service.current_user().await.unwrap(), Some(user));

        service.sign_out().await.unwrap();
        assert!(service.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sign_up_rejects_existing_email() {
        let service = InMemoryDataService::new();
        let options = SignUpOptions::default();
        service.sign_up("ada@example.com", "pw123456", &options).await.unwrap();
        let err = service
            .sign_up("ada@example.com", "pw123456", &options)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn upsert_merges_on_id() {
        let service = InMemoryDataService::new();
        let first = Utc::now() - Duration::days(1);
        let second = Utc::now();
        service
            .upsert_user(&UserUpsert {
                id: "u1".to_string(),
                email: "ada@example.com".to_string(),
                last_login: first,
            })
            .await
            .unwrap();
        service
            .upsert_user(&UserUpsert {
                id: "u1".to_string(),
                email: "ada@example.com".to_string(),
                last_login: second,
            })
            .await
            .unwrap();
        assert_eq!(service.stored_user("u1").unwrap().last_login, Some(second));
    }

    #[tokio::test]
    async fn injected_failures_are_counted_and_cleared() {
        let service = InMemoryDataService::new().with_signed_in_user("u1", "ada@example.com");
        service.go_offline();
        assert!(service.list_documents("u1").await.is_err());
        assert_eq!(service.call_count(Call::ListDocuments), 1);

        service.clear_failures();
        assert!(service.list_documents("u1").await.unwrap().is_empty());
        assert_eq!(service.call_count(Call::ListDocuments), 2);
    }
}
