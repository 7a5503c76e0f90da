//! # docdesk client
//!
//! Backends for the docdesk clients.
//!
//! - [`config`]: environment configuration (`DOCDESK_*` variables, `.env`)
//! - [`rest`]: [`rest::RestDataService`], the HTTP client for the hosted
//!   auth + storage service
//!
//! [`build_data_service`] picks the REST backend when the service URL and
//! anon key are both set, and falls back to the in-memory backend otherwise.
//! [`build_account_flows`] wires a service into the sign-in and sign-up flows
//! with the configured verification redirect.

use std::sync::Arc;

use docdesk_core::error::ServiceError;
use docdesk_core::memory::InMemoryDataService;
use docdesk_core::service::RemoteDataService;
use docdesk_sync::{AccountFlows, Notifier};
use tracing::{debug, info};

pub mod config;
pub mod rest;

pub use config::{ConfigError, ServiceConfig};
pub use rest::RestDataService;

/// Build the data service selected by `config`.
pub fn build_data_service(
    config: &ServiceConfig,
) -> Result<Arc<dyn RemoteDataService>, ServiceError> {
    match (&config.service_url, &config.anon_key) {
        (Some(url), Some(anon_key)) => {
            info!("Using hosted backend at {}", url);
            let service = RestDataService::new(url.clone(), anon_key.clone(), config)?;
            Ok(Arc::new(service))
        }
        _ => {
            info!("Backend not configured, using in-memory data service");
            Ok(Arc::new(InMemoryDataService::new()))
        }
    }
}

/// Account flows over `service`, sending sign-up verification links to
/// `DOCDESK_EMAIL_REDIRECT_URL` when it is set.
pub fn build_account_flows(
    config: &ServiceConfig,
    service: Arc<dyn RemoteDataService>,
    notifier: Arc<dyn Notifier>,
) -> AccountFlows {
    let flows = AccountFlows::new(service.clone(), service, notifier);
    match &config.email_redirect_url {
        Some(url) => {
            debug!(%url, "sign-up verification redirect configured");
            flows.with_email_redirect(url.clone())
        }
        None => flows,
    }
}
