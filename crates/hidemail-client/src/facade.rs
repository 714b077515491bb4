//! Alias operations against the premium mail settings service.
//!
//! Every operation issues one authenticated call and inspects the upstream
//! `{success, result, error.errorMessage}` envelope. `success=false` maps to
//! an operation-specific error carrying the server message, so callers can
//! branch on the kind without inspecting strings.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::client::{ClientError, HmeClient};

pub const SERVICE_PREMIUM_MAIL_SETTINGS: &str = "premiummailsettings";
pub const DEFAULT_RESERVE_NOTE: &str = "Generated by the hidemail extension";

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error("facade_client_not_authenticated")]
    ClientAuthentication,
    #[error("hme_list_failed:{message}")]
    List { message: String },
    #[error("hme_generate_failed:{message}")]
    Generate { message: String },
    #[error("hme_reserve_failed:{message}")]
    Reserve { message: String },
    #[error("hme_update_metadata_failed:{message}")]
    UpdateMetadata { message: String },
    #[error("hme_deactivate_failed:{message}")]
    Deactivate { message: String },
    #[error("hme_reactivate_failed:{message}")]
    Reactivate { message: String },
    #[error("hme_delete_failed:{message}")]
    Delete { message: String },
    #[error("hme_update_forward_to_failed:{message}")]
    UpdateForwardTo { message: String },
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// One alias record as the upstream service reports it. The extension holds
/// read-through copies only, invalidated by the next list refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HmeEmail {
    pub anonymous_id: String,
    pub hme: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub forward_to_email: String,
    pub is_active: bool,
    #[serde(default)]
    pub create_timestamp: i64,
    #[serde(default)]
    pub origin: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HmeListResult {
    #[serde(default)]
    pub hme_emails: Vec<HmeEmail>,
    #[serde(default)]
    pub selected_forward_to: Option<String>,
    #[serde(default)]
    pub forward_to_emails: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
struct ServiceEnvelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error: Option<ServiceErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceErrorBody {
    #[serde(default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResult {
    hme: String,
}

#[derive(Debug, Deserialize)]
struct ReserveResult {
    hme: HmeEmail,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReserveRequest<'a> {
    hme: &'a str,
    label: &'a str,
    note: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnonymousIdRequest<'a> {
    anonymous_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateMetadataRequest<'a> {
    anonymous_id: &'a str,
    label: &'a str,
    note: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateForwardToRequest<'a> {
    forward_to_email: &'a str,
}

/// Facade over the alias operations. Construction fails fast against a
/// non-authenticated client; there is no lazy retry.
#[derive(Debug)]
pub struct HmeFacade<'a> {
    client: &'a HmeClient,
    base_url: String,
}

impl<'a> HmeFacade<'a> {
    pub fn new(client: &'a HmeClient) -> Result<Self, FacadeError> {
        if !client.session().authenticated() {
            return Err(FacadeError::ClientAuthentication);
        }
        let base_url = client.webservice_url(SERVICE_PREMIUM_MAIL_SETTINGS)?;
        Ok(Self { client, base_url })
    }

    pub async fn list(&self) -> Result<HmeListResult, FacadeError> {
        let url = format!("{}/v2/hme/list", self.base_url);
        let envelope: ServiceEnvelope<HmeListResult> = self
            .client
            .request(Method::GET, &url, &[], None::<&()>)
            .await?;
        unpack(envelope, |message| FacadeError::List { message })
    }

    /// Ask the service for a fresh candidate alias address. The address is
    /// not live until reserved.
    pub async fn generate(&self) -> Result<String, FacadeError> {
        let url = format!("{}/v1/hme/generate", self.base_url);
        let envelope: ServiceEnvelope<GenerateResult> = self
            .client
            .request(Method::POST, &url, &[], Some(&serde_json::json!({})))
            .await?;
        let result = unpack(envelope, |message| FacadeError::Generate { message })?;
        info!(hme = result.hme.as_str(), "generated candidate alias");
        Ok(result.hme)
    }

    /// Reserve a generated address. Label is required; a missing note falls
    /// back to the fixed attribution string.
    pub async fn reserve(
        &self,
        hme: &str,
        label: &str,
        note: Option<&str>,
    ) -> Result<HmeEmail, FacadeError> {
        let url = format!("{}/v1/hme/reserve", self.base_url);
        let request = ReserveRequest {
            hme,
            label,
            note: note.unwrap_or(DEFAULT_RESERVE_NOTE),
        };
        let envelope: ServiceEnvelope<ReserveResult> = self
            .client
            .request(Method::POST, &url, &[], Some(&request))
            .await?;
        let result = unpack(envelope, |message| FacadeError::Reserve { message })?;
        info!(hme = result.hme.hme.as_str(), "reserved alias");
        Ok(result.hme)
    }

    pub async fn update_metadata(
        &self,
        anonymous_id: &str,
        label: &str,
        note: &str,
    ) -> Result<(), FacadeError> {
        let url = format!("{}/v1/hme/updateMetaData", self.base_url);
        let request = UpdateMetadataRequest {
            anonymous_id,
            label,
            note,
        };
        let envelope: ServiceEnvelope<serde_json::Value> = self
            .client
            .request(Method::POST, &url, &[], Some(&request))
            .await?;
        ack(envelope, |message| FacadeError::UpdateMetadata { message })
    }

    pub async fn deactivate(&self, anonymous_id: &str) -> Result<(), FacadeError> {
        let url = format!("{}/v1/hme/deactivate", self.base_url);
        let envelope: ServiceEnvelope<serde_json::Value> = self
            .client
            .request(
                Method::POST,
                &url,
                &[],
                Some(&AnonymousIdRequest { anonymous_id }),
            )
            .await?;
        ack(envelope, |message| FacadeError::Deactivate { message })
    }

    pub async fn reactivate(&self, anonymous_id: &str) -> Result<(), FacadeError> {
        let url = format!("{}/v1/hme/reactivate", self.base_url);
        let envelope: ServiceEnvelope<serde_json::Value> = self
            .client
            .request(
                Method::POST,
                &url,
                &[],
                Some(&AnonymousIdRequest { anonymous_id }),
            )
            .await?;
        ack(envelope, |message| FacadeError::Reactivate { message })
    }

    pub async fn delete(&self, anonymous_id: &str) -> Result<(), FacadeError> {
        let url = format!("{}/v1/hme/delete", self.base_url);
        let envelope: ServiceEnvelope<serde_json::Value> = self
            .client
            .request(
                Method::POST,
                &url,
                &[],
                Some(&AnonymousIdRequest { anonymous_id }),
            )
            .await?;
        ack(envelope, |message| FacadeError::Delete { message })
    }

    pub async fn update_forward_to(&self, forward_to_email: &str) -> Result<(), FacadeError> {
        let url = format!("{}/v1/hme/updateForwardTo", self.base_url);
        let envelope: ServiceEnvelope<serde_json::Value> = self
            .client
            .request(
                Method::POST,
                &url,
                &[],
                Some(&UpdateForwardToRequest { forward_to_email }),
            )
            .await?;
        ack(envelope, |message| FacadeError::UpdateForwardTo { message })
    }
}

fn service_message(error: Option<ServiceErrorBody>) -> String {
    error
        .map(|body| body.error_message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| "unspecified service error".to_string())
}

fn unpack<T>(
    envelope: ServiceEnvelope<T>,
    to_error: impl FnOnce(String) -> FacadeError,
) -> Result<T, FacadeError> {
    if !envelope.success {
        return Err(to_error(service_message(envelope.error)));
    }
    envelope
        .result
        .ok_or_else(|| to_error("missing result payload".to_string()))
}

fn ack<T>(
    envelope: ServiceEnvelope<T>,
    to_error: impl FnOnce(String) -> FacadeError,
) -> Result<(), FacadeError> {
    if !envelope.success {
        return Err(to_error(service_message(envelope.error)));
    }
    Ok(())
}
