//! REST client for the hosted auth + storage backend.
//!
//! Identity goes through `/auth/v1/*`, rows through `/rest/v1/<table>` with
//! PostgREST-style filters (`created_by=eq.<id>`). The access token returned
//! by sign-in is kept in memory for the life of the client; every request
//! carries the `apikey` header and a bearer token (the session's, or the anon
//! key when signed out).

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use docdesk_core::error::ServiceError;
use docdesk_core::model::{
    AuthUser, Document, NewDocument, NewUserProfile, SignUpOptions, UserUpsert,
};
use docdesk_core::service::{AuthService, DocumentTable, UserTable};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::ServiceConfig;

const DOCUMENTS: &str = "documents";
const USERS: &str = "users";

#[derive(Debug, Clone)]
struct SessionTokens {
    access_token: String,
    user: AuthUser,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

/// Sign-up answers with a bare user when email confirmation is pending and
/// with a full session otherwise.
#[derive(Deserialize)]
struct SignUpResponse {
    access_token: Option<String>,
    user: Option<AuthUser>,
    id: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
}

/// [`docdesk_core::RemoteDataService`] over HTTP.
pub struct RestDataService {
    base_url: Url,
    anon_key: String,
    client: Client,
    session: RwLock<Option<SessionTokens>>,
}

impl RestDataService {
    /// Build a client for `base_url`, authenticating with `anon_key`.
    pub fn new(
        base_url: Url,
        anon_key: String,
        config: &ServiceConfig,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url,
            anon_key,
            client,
            session: RwLock::new(None),
        })
    }

    /// `{base}/auth/v1/{path}`
    pub fn auth_url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("/auth/v1/{}", path.trim_start_matches('/')));
        url
    }

    /// `{base}/rest/v1/{table}?{query}`
    pub fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("/rest/v1/{}", table));
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    fn store_session(&self, tokens: Option<SessionTokens>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = tokens;
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.access_token().unwrap_or_else(|| self.anon_key.clone());
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ServiceError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        warn!("Backend request failed: {} {}", status, body);
        Err(error_for_status(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ServiceError> {
        let resp = self.send(builder).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

/// Map an error response to the matching [`ServiceError`].
fn error_for_status(status: StatusCode, body: &str) -> ServiceError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .unwrap_or_else(|| body.to_string());
    match status {
        StatusCode::NOT_FOUND => ServiceError::NotFound(message),
        StatusCode::CONFLICT => ServiceError::Conflict(message),
        _ => ServiceError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl AuthService for RestDataService {
    async fn current_user(&self) -> Result<Option<AuthUser>, ServiceError> {
        if self.access_token().is_none() {
            return Ok(None);
        }
        let resp = self
            .request(Method::GET, self.auth_url("user"))
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            debug!("session token rejected; treating as signed out");
            self.store_session(None);
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }
        let user: AuthUser = resp
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        Ok(Some(user))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, ServiceError> {
        let mut url = self.auth_url("token");
        url.set_query(Some("grant_type=password"));
        let body = serde_json::json!({ "email": email, "password": password });
        let tokens: TokenResponse = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;
        self.store_session(Some(SessionTokens {
            access_token: tokens.access_token,
            user: tokens.user.clone(),
        }));
        Ok(tokens.user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        options: &SignUpOptions,
    ) -> Result<AuthUser, ServiceError> {
        let mut url = self.auth_url("signup");
        if let Some(redirect) = &options.email_redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect);
        }
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "data": { "full_name": options.full_name },
        });
        let resp: SignUpResponse = self
            .send_json(self.request(Method::POST, url).json(&body))
            .await?;

        let user = match (resp.user, resp.id) {
            (Some(user), _) => user,
            (None, Some(id)) => AuthUser {
                id,
                email: resp.email,
            },
            (None, None) => {
                return Err(ServiceError::Decode(
                    "sign-up response carried no user".to_string(),
                ));
            }
        };
        if let Some(access_token) = resp.access_token {
            self.store_session(Some(SessionTokens {
                access_token,
                user: user.clone(),
            }));
        }
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), ServiceError> {
        if self.access_token().is_none() {
            return Ok(());
        }
        let result = self
            .send(self.request(Method::POST, self.auth_url("logout")))
            .await;
        // The local token is useless either way.
        let previous = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tokens) = previous {
            debug!(user = %tokens.user.id, "session dropped");
        }
        result.map(|_| ())
    }
}

#[async_trait]
impl DocumentTable for RestDataService {
    async fn list_documents(&self, owner_id: &str) -> Result<Vec<Document>, ServiceError> {
        let filter = format!("eq.{}", owner_id);
        let url = self.table_url(
            DOCUMENTS,
            &[
                ("select", "*"),
                ("created_by", filter.as_str()),
                ("order", "created_at.desc"),
            ],
        );
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn insert_document(&self, document: &NewDocument) -> Result<Document, ServiceError> {
        let url = self.table_url(DOCUMENTS, &[]);
        let rows: Vec<Document> = self
            .send_json(
                self.request(Method::POST, url)
                    .header("Prefer", "return=representation")
                    .json(document),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ServiceError::Decode("insert returned no rows".to_string()))
    }

    async fn delete_document(&self, id: &str) -> Result<(), ServiceError> {
        let filter = format!("eq.{}", id);
        let url = self.table_url(DOCUMENTS, &[("id", filter.as_str())]);
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}

#[async_trait]
impl UserTable for RestDataService {
    async fn upsert_user(&self, user: &UserUpsert) -> Result<(), ServiceError> {
        let url = self.table_url(USERS, &[("on_conflict", "id")]);
        self.send(
            self.request(Method::POST, url)
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(user),
        )
        .await?;
        Ok(())
    }

    async fn insert_user(&self, user: &NewUserProfile) -> Result<(), ServiceError> {
        let url = self.table_url(USERS, &[]);
        self.send(
            self.request(Method::POST, url)
                .header("Prefer", "return=minimal")
                .json(user),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(base: &str) -> RestDataService {
        RestDataService::new(
            Url::parse(base).unwrap(),
            "anon".to_string(),
            &ServiceConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn auth_urls_are_rooted_under_auth_v1() {
        let svc = service("https://abc.example.co");
        assert_eq!(
            svc.auth_url("user").as_str(),
            "https://abc.example.co/auth/v1/user"
        );
        assert_eq!(
            svc.auth_url("/logout").as_str(),
            "https://abc.example.co/auth/v1/logout"
        );
    }

    #[test]
    fn list_url_filters_by_owner_and_orders_newest_first() {
        let svc = service("https://abc.example.co/");
        let url = svc.table_url(
            DOCUMENTS,
            &[
                ("select", "*"),
                ("created_by", "eq.u1"),
                ("order", "created_at.desc"),
            ],
        );
        assert_eq!(url.path(), "/rest/v1/documents");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("select".to_string(), "*".to_string()),
                ("created_by".to_string(), "eq.u1".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
            ]
        );
    }

    #[test]
    fn table_url_without_query_has_none() {
        let svc = service("https://abc.example.co");
        assert_eq!(svc.table_url(USERS, &[]).query(), None);
    }

    #[test]
    fn error_bodies_map_to_service_errors() {
        let conflict = error_for_status(
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#,
        );
        assert_eq!(
            conflict,
            ServiceError::Conflict("duplicate key value violates unique constraint".to_string())
        );

        let auth = error_for_status(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(
            auth,
            ServiceError::Rejected {
                status: 400,
                message: "Invalid login credentials".to_string()
            }
        );

        let plain = error_for_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(
            plain,
            ServiceError::Rejected {
                status: 502,
                message: "upstream down".to_string()
            }
        );
    }

    #[tokio::test]
    async fn signed_out_client_reports_no_user_without_a_request() {
        // Port 9 is discard; any request would fail with a transport error.
        let svc = service("http://127.0.0.1:9");
        assert_eq!(svc.current_user().await.unwrap(), None);
        svc.sign_out().await.unwrap();
    }
}
