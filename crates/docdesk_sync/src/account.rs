//! Sign-in, sign-up, and sign-out.
//!
//! Besides the auth provider call, each flow keeps the `users` profile table
//! in step: sign-in upserts `last_login`, sign-up inserts the initial row.
//! Profile writes are best effort. A failed write is logged and reported in
//! the outcome, but the auth result stands.

use std::sync::Arc;

use chrono::Utc;
use docdesk_core::error::{DocdeskError, Result};
use docdesk_core::model::{
    AuthUser, NewUserProfile, SignUpOptions, UserUpsert, display_name_from_email,
};
use docdesk_core::service::{AuthService, UserTable};
use tracing::{error, info, warn};

use crate::notify::{Notification, Notifier};
use crate::store::DocumentSyncStore;

/// Result of a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOutcome {
    /// The signed-in user.
    pub user: AuthUser,
    /// Whether the `users` row was updated.
    pub profile_synced: bool,
}

/// Result of a successful sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    /// The registered user. Usually still unverified.
    pub user: AuthUser,
    /// Whether the `users` row was created.
    pub profile_created: bool,
}

/// Account actions behind the login page and the sign-out button.
pub struct AccountFlows {
    auth: Arc<dyn AuthService>,
    users: Arc<dyn UserTable>,
    notifier: Arc<dyn Notifier>,
    email_redirect_to: Option<String>,
}

impl AccountFlows {
    pub fn new(
        auth: Arc<dyn AuthService>,
        users: Arc<dyn UserTable>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            auth,
            users,
            notifier,
            email_redirect_to: None,
        }
    }

    /// Set where the sign-up verification email sends the user.
    pub fn with_email_redirect(mut self, url: impl Into<String>) -> Self {
        self.email_redirect_to = Some(url.into());
        self
    }

    /// Sign in and record the login time on the profile row.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome> {
        let result = self.try_sign_in(email, password).await;
        match &result {
            Ok(_) => self.notifier.notify(Notification::SignedIn),
            Err(err) => self.notifier.notify(Notification::SignInFailed {
                reason: err.to_string(),
            }),
        }
        result
    }

    async fn try_sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome> {
        let email = require_credentials(email, password)?;
        let user = self.auth.sign_in(&email, password).await?;

        let upsert = UserUpsert {
            id: user.id.clone(),
            email: user.email.clone().unwrap_or_else(|| email.clone()),
            last_login: Utc::now(),
        };
        let profile_synced = match self.users.upsert_user(&upsert).await {
            Ok(()) => true,
            Err(err) => {
                warn!(user = %user.id, %err, "Error updating user record on sign-in");
                false
            }
        };

        info!(user = %user.id, "signed in");
        Ok(SignInOutcome {
            user,
            profile_synced,
        })
    }

    /// Register an account and create its profile row.
    ///
    /// The display name defaults to the local part of the email.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let result = self.try_sign_up(email, password).await;
        match &result {
            Ok(_) => self.notifier.notify(Notification::SignedUp),
            Err(err) => {
                error!(%err, "Signup error");
                self.notifier.notify(Notification::SignUpFailed {
                    reason: err.to_string(),
                })
            }
        }
        result
    }

    async fn try_sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let email = require_credentials(email, password)?;
        let full_name = display_name_from_email(&email);
        let options = SignUpOptions {
            email_redirect_to: self.email_redirect_to.clone(),
            full_name: Some(full_name.clone()),
        };
        let user = self.auth.sign_up(&email, password, &options).await?;

        let now = Utc::now();
        let profile = NewUserProfile {
            id: user.id.clone(),
            email: user.email.clone().unwrap_or_else(|| email.clone()),
            full_name: Some(full_name),
            created_at: now,
            last_login: Some(now),
        };
        let profile_created = match self.users.insert_user(&profile).await {
            Ok(()) => true,
            Err(err) => {
                warn!(user = %user.id, %err, "Error creating user record");
                false
            }
        };

        info!(user = %user.id, "account created");
        Ok(SignUpOutcome {
            user,
            profile_created,
        })
    }

    /// End the session and unmount `store`.
    ///
    /// The store is unmounted even when the provider call fails, so no
    /// documents stay visible after the user asked to leave.
    pub async fn sign_out(&self, store: &DocumentSyncStore) -> Result<()> {
        let result = self.auth.sign_out().await;
        store.unmount();
        if let Err(err) = &result {
            warn!(%err, "Error signing out");
            self.notifier.notify(Notification::SignOutFailed {
                reason: err.to_string(),
            });
        }
        result.map_err(DocdeskError::from)
    }
}

/// Trimmed email, after checking both credentials are present.
fn require_credentials(email: &str, password: &str) -> Result<String> {
    let email = email.trim();
    if email.is_empty() {
        return Err(DocdeskError::validation("email must not be empty"));
    }
    if password.is_empty() {
        return Err(DocdeskError::validation("password must not be empty"));
    }
    Ok(email.to_string())
}
