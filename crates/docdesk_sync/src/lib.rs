//! # docdesk sync
//!
//! Client-side state for the docdesk dashboard.
//!
//! This crate provides:
//! - **Store**: [`DocumentSyncStore`], the local mirror of the signed-in user's
//!   documents, updated after each confirmed create or delete
//! - **Notifications**: the [`Notifier`] seam through which user-facing
//!   failure and success messages leave the core
//! - **Accounts**: [`AccountFlows`] for sign-in, sign-up, and sign-out
//!
//! Pages and dialogs sit outside this crate and drive it.

pub mod account;
pub mod notify;
pub mod store;

pub use account::{AccountFlows, SignInOutcome, SignUpOutcome};
pub use notify::{LogNotifier, Notification, NotificationLevel, NotificationLog, Notifier};
pub use store::{CollectionSnapshot, DocumentSyncStore, SyncPhase};
