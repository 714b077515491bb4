//! Session header capture and the derived authentication predicate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hidemail_protocol::store::{self, KEY_SESSION, KeyValueStore, StoreError};

pub const HEADER_ACCOUNT_COUNTRY: &str = "account-country";
pub const HEADER_SESSION_ID: &str = "session-id";
pub const HEADER_SESSION_TOKEN: &str = "session-token";
pub const HEADER_SCNT: &str = "scnt";
/// Two-factor trust token. Augments a session but is never required.
pub const HEADER_TRUST_TOKEN: &str = "trust-token";

pub const REQUIRED_HEADERS: [&str; 4] = [
    HEADER_ACCOUNT_COUNTRY,
    HEADER_SESSION_ID,
    HEADER_SESSION_TOKEN,
    HEADER_SCNT,
];
pub const OPTIONAL_HEADERS: [&str; 1] = [HEADER_TRUST_TOKEN];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebserviceEndpoint {
    pub url: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Lower-cased header name to captured value.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Service name to endpoint, discovered via token validation.
    #[serde(default)]
    pub webservices: BTreeMap<String, WebserviceEndpoint>,
}

fn is_session_header(name: &str) -> bool {
    REQUIRED_HEADERS.contains(&name) || OPTIONAL_HEADERS.contains(&name)
}

impl Session {
    /// Copy every session header present in `response_headers` into the
    /// session map. Partial updates accumulate: a header absent from this
    /// response, or present with an empty value, never regresses a value
    /// established earlier.
    pub fn set_headers<'a, I>(&mut self, response_headers: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in response_headers {
            let name = name.trim().to_ascii_lowercase();
            if !is_session_header(&name) {
                continue;
            }
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            self.headers.insert(name, value.to_string());
        }
    }

    /// Derived, never cached: recomputed from the in-memory maps on every
    /// call so the predicate cannot go stale.
    #[must_use]
    pub fn authenticated(&self) -> bool {
        !self.webservices.is_empty() && self.missing_headers().is_empty()
    }

    /// Required header names the session has not captured yet.
    #[must_use]
    pub fn missing_headers(&self) -> Vec<&'static str> {
        REQUIRED_HEADERS
            .iter()
            .copied()
            .filter(|name| {
                self.headers
                    .get(*name)
                    .is_none_or(|value| value.trim().is_empty())
            })
            .collect()
    }

    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        Ok(store::load_json(store, KEY_SESSION)
            .await?
            .unwrap_or_default())
    }

    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store::save_json(store, KEY_SESSION, self).await
    }

    /// Replace the session with the empty value and persist it.
    pub async fn reset(&mut self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        *self = Session::default();
        self.persist(store).await
    }
}
