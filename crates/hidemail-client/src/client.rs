//! Authenticated HTTP client over a captured session.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hidemail_protocol::store::{
    self, KEY_CLIENT_STATE, KEY_POPUP_STATE, KeyValueStore, StoreError,
};

use crate::session::{HEADER_TRUST_TOKEN, Session, WebserviceEndpoint};

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("client_missing_required_headers:{}", .missing.join(","))]
    MissingRequiredHeaders { missing: Vec<String> },
    #[error("client_service_not_found:{name}")]
    ServiceNotFound { name: String },
    #[error("client_request_failed:{message}")]
    Request { message: String },
    #[error("client_read_failed:{message}")]
    Read { message: String },
    #[error("client_http_{status}:{body}")]
    Http { status: StatusCode, body: String },
    #[error("client_json_decode_failed:{message}")]
    Decode { message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Externally visible authorization context, persisted under `clientState`
/// and reconstructed by every context that needs a client. No globals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub setup_url: String,
    #[serde(default)]
    pub webservices: BTreeMap<String, WebserviceEndpoint>,
}

impl ClientConfig {
    #[must_use]
    pub fn new(setup_url: impl Into<String>) -> Self {
        Self {
            setup_url: normalize_base_url(&setup_url.into()),
            webservices: BTreeMap::new(),
        }
    }

    pub async fn from_store(store: &dyn KeyValueStore) -> Result<Option<Self>, StoreError> {
        store::load_json(store, KEY_CLIENT_STATE).await
    }

    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store::save_json(store, KEY_CLIENT_STATE, self).await
    }

    pub async fn clear(store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.remove(KEY_CLIENT_STATE).await
    }
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    webservices: BTreeMap<String, WebserviceEndpoint>,
}

#[derive(Debug, Serialize)]
struct LogoutRequest {
    trust: bool,
}

#[derive(Debug, Clone)]
pub struct HmeClient {
    config: ClientConfig,
    session: Session,
    timeout: Duration,
    http: reqwest::Client,
}

impl HmeClient {
    #[must_use]
    pub fn new(config: ClientConfig, session: Session) -> Self {
        Self {
            config,
            session,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            http: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolve a named webservice endpoint. Session-discovered endpoints win
    /// over the persisted config copy; an unknown name is a typed error, not
    /// a contract panic.
    pub fn webservice_url(&self, name: &str) -> Result<String, ClientError> {
        self.session
            .webservices
            .get(name)
            .or_else(|| self.config.webservices.get(name))
            .map(|endpoint| endpoint.url.trim_end_matches('/').to_string())
            .ok_or_else(|| ClientError::ServiceNotFound {
                name: name.to_string(),
            })
    }

    /// Issue one authorized call. Every stored session header is injected
    /// unless the caller supplied that header explicitly; explicit headers
    /// always win and are never overwritten.
    pub async fn request<Req, Res>(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&Req>,
    ) -> Result<Res, ClientError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let mut request = self
            .http
            .request(method, url)
            .header("x-request-id", format!("req_{}", Uuid::new_v4().simple()))
            .timeout(self.timeout);

        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        for (name, value) in &self.session.headers {
            if headers
                .iter()
                .any(|(given, _)| given.eq_ignore_ascii_case(name))
            {
                debug!(header = name.as_str(), "explicit header wins over session value");
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|error| ClientError::Request {
                message: error.to_string(),
            })?;
        decode_json_response(response).await
    }

    /// Validate the captured session against `{setup}/validate`.
    ///
    /// Fails with [`ClientError::MissingRequiredHeaders`] before any network
    /// call when the header set is incomplete. On success the discovered
    /// webservice map replaces the session's copy; pass a store to persist
    /// session and client state in the same step.
    pub async fn validate_token(
        &mut self,
        persist_to: Option<&dyn KeyValueStore>,
    ) -> Result<&BTreeMap<String, WebserviceEndpoint>, ClientError> {
        let missing = self.session.missing_headers();
        if !missing.is_empty() {
            return Err(ClientError::MissingRequiredHeaders {
                missing: missing.into_iter().map(str::to_string).collect(),
            });
        }

        let url = format!("{}/validate", self.config.setup_url);
        let validated: ValidateResponse =
            self.request(Method::POST, &url, &[], None::<&()>).await?;

        self.session.webservices = validated.webservices.clone();
        self.config.webservices = validated.webservices;
        info!(
            services = self.session.webservices.len(),
            "session token validated"
        );

        if let Some(store) = persist_to {
            self.session.persist(store).await?;
            self.config.persist(store).await?;
        }
        Ok(&self.session.webservices)
    }

    /// Sign out. The logout call is best-effort: its failure is logged and
    /// swallowed. The session reset and state clearing that follow are
    /// unconditional, so a failed logout can never leave the client in an
    /// authenticated-but-unreachable state.
    pub async fn sign_out(
        &mut self,
        trust: bool,
        store: &dyn KeyValueStore,
    ) -> Result<(), ClientError> {
        if self.session.authenticated() {
            let url = format!("{}/logout", self.config.setup_url);
            let logout = self
                .request::<LogoutRequest, serde_json::Value>(
                    Method::POST,
                    &url,
                    &[],
                    Some(&LogoutRequest { trust }),
                )
                .await;
            match logout {
                Ok(_) => info!("logout acknowledged upstream"),
                Err(error) => warn!(%error, "logout call failed; resetting session anyway"),
            }
        }

        // A trusted sign-out keeps the two-factor trust token so the next
        // sign-in can skip the second factor.
        let trust_token = trust
            .then(|| self.session.headers.get(HEADER_TRUST_TOKEN).cloned())
            .flatten();

        self.session.reset(store).await?;
        if let Some(token) = trust_token {
            self.session
                .headers
                .insert(HEADER_TRUST_TOKEN.to_string(), token);
            self.session.persist(store).await?;
        }

        self.config.webservices.clear();
        store.remove(KEY_CLIENT_STATE).await?;
        store.remove(KEY_POPUP_STATE).await?;
        Ok(())
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

async fn decode_json_response<T>(response: reqwest::Response) -> Result<T, ClientError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let bytes = response.bytes().await.map_err(|error| ClientError::Read {
        message: error.to_string(),
    })?;

    if !status.is_success() {
        let body = String::from_utf8_lossy(&bytes).trim().to_string();
        return Err(ClientError::Http {
            status,
            body: if body.is_empty() {
                "<empty>".to_string()
            } else {
                body
            },
        });
    }

    serde_json::from_slice(&bytes).map_err(|error| ClientError::Decode {
        message: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{
        HEADER_ACCOUNT_COUNTRY, HEADER_SCNT, HEADER_SESSION_ID, HEADER_SESSION_TOKEN,
    };

    fn authenticated_session() -> Session {
        let mut session = Session::default();
        session.set_headers([
            (HEADER_ACCOUNT_COUNTRY, "USA"),
            (HEADER_SESSION_ID, "sid-1"),
            (HEADER_SESSION_TOKEN, "tok-1"),
            (HEADER_SCNT, "scnt-1"),
        ]);
        session.webservices.insert(
            "premiummailsettings".to_string(),
            WebserviceEndpoint {
                url: "https://mail.example.com/".to_string(),
                status: "active".to_string(),
            },
        );
        session
    }

    #[test]
    fn config_normalizes_the_setup_url() {
        let config = ClientConfig::new(" https://setup.example.com/ ");
        assert_eq!(config.setup_url, "https://setup.example.com");
    }

    #[test]
    fn webservice_lookup_trims_trailing_slashes() {
        let client = HmeClient::new(
            ClientConfig::new("https://setup.example.com"),
            authenticated_session(),
        );
        let url = client
            .webservice_url("premiummailsettings")
            .expect("endpoint resolved");
        assert_eq!(url, "https://mail.example.com");
    }

    #[test]
    fn unknown_webservice_name_is_a_typed_error() {
        let client = HmeClient::new(
            ClientConfig::new("https://setup.example.com"),
            Session::default(),
        );
        let error = client
            .webservice_url("premiummailsettings")
            .expect_err("no endpoints discovered yet");
        assert!(
            matches!(error, ClientError::ServiceNotFound { name } if name == "premiummailsettings")
        );
    }

    #[tokio::test]
    async fn validate_token_rejects_incomplete_headers_before_any_network_call() {
        let mut session = Session::default();
        session.set_headers([
            (HEADER_ACCOUNT_COUNTRY, "USA"),
            (HEADER_SESSION_ID, "sid-1"),
            (HEADER_SESSION_TOKEN, "tok-1"),
            // scnt deliberately missing
        ]);
        // The setup host does not resolve; reaching the network would fail
        // with a request error instead of the typed header error.
        let mut client = HmeClient::new(ClientConfig::new("https://nonexistent.invalid"), session);

        let error = client
            .validate_token(None)
            .await
            .expect_err("incomplete session");
        assert!(
            matches!(error, ClientError::MissingRequiredHeaders { missing } if missing == vec![HEADER_SCNT.to_string()])
        );
    }

    #[test]
    fn missing_header_error_lists_every_absent_name() {
        let error = ClientError::MissingRequiredHeaders {
            missing: vec!["scnt".to_string(), "session-token".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "client_missing_required_headers:scnt,session-token"
        );
    }
}
