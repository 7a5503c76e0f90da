//! # `docdesk_core`
//!
//! Shared types for the docdesk clients.
//!
//! The document store and the identity provider live in an external managed
//! service. This crate describes what the clients exchange with it:
//!
//! - [`model`]: documents, user profile rows, and the authenticated user
//! - [`error`]: the error taxonomy shared by every crate in the workspace
//! - [`service`]: the async traits a remote backend implements
//! - [`memory`]: an in-process backend for development and tests
//! - [`search`]: title filtering over a local document list

#![warn(missing_docs)]

/// Error docs
pub mod error;

/// In-memory backend
pub mod memory;

/// Data model
pub mod model;

pub mod search;

/// Remote service traits
pub mod service;

pub use error::{DocdeskError, Result, ServiceError};
pub use model::{
    AuthUser, Document, DocumentStatus, DocumentType, NewDocument, NewUserProfile, SignUpOptions,
    UserProfile, UserUpsert,
};
pub use service::{AuthService, DocumentTable, RemoteDataService, UserTable};
