//! Cross-context message union.
//!
//! Transport is fire-and-forget with no acknowledgement; request/response
//! pairing for the generate and reserve flows rests entirely on the
//! `element_id` carried in both directions. The id is generated here, per
//! candidate field, when its helper control is created.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::path::ElementPath;

/// Generate a fresh correlation id for a candidate input field.
///
/// Never derived from the field's native DOM id: those are frequently absent
/// and unstable across host-page re-renders.
#[must_use]
pub fn new_element_id() -> String {
    format!("hme-field-{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    Autofill(AutofillPayload),
    GenerateRequest(GenerateRequest),
    GenerateResponse(GenerateResponse),
    ReservationRequest(ReservationRequest),
    ReservationResponse(ReservationResponse),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofillPayload {
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<ElementPath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub element_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hme: Option<String>,
    pub element_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub hme: String,
    pub label: String,
    pub element_id: String,
    pub locator: ElementPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hme: Option<String>,
    pub element_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<ElementPath>,
}

impl Message {
    /// Correlation id of the field this message targets, when it has one.
    /// `Autofill` addresses a locator (or the active element), not a field id.
    #[must_use]
    pub fn element_id(&self) -> Option<&str> {
        match self {
            Message::Autofill(_) => None,
            Message::GenerateRequest(payload) => Some(&payload.element_id),
            Message::GenerateResponse(payload) => Some(&payload.element_id),
            Message::ReservationRequest(payload) => Some(&payload.element_id),
            Message::ReservationResponse(payload) => Some(&payload.element_id),
        }
    }

    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Message::GenerateResponse(_) | Message::ReservationResponse(_)
        )
    }
}

impl GenerateResponse {
    #[must_use]
    pub fn ok(element_id: impl Into<String>, hme: impl Into<String>) -> Self {
        Self {
            hme: Some(hme.into()),
            element_id: element_id.into(),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(element_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            hme: None,
            element_id: element_id.into(),
            error: Some(error.into()),
        }
    }
}

impl ReservationResponse {
    #[must_use]
    pub fn ok(
        element_id: impl Into<String>,
        hme: impl Into<String>,
        locator: Option<ElementPath>,
    ) -> Self {
        Self {
            hme: Some(hme.into()),
            element_id: element_id.into(),
            error: None,
            locator,
        }
    }

    #[must_use]
    pub fn failed(element_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            hme: None,
            element_id: element_id.into(),
            error: Some(error.into()),
            locator: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_ids_are_unique_and_prefixed() {
        let a = new_element_id();
        let b = new_element_id();
        assert!(a.starts_with("hme-field-"));
        assert_ne!(a, b);
    }

    #[test]
    fn wire_shape_is_tag_plus_data() {
        let message = Message::GenerateRequest(GenerateRequest {
            element_id: "hme-field-a1".to_string(),
        });
        let json = serde_json::to_value(&message).expect("serialize message");
        assert_eq!(
            json,
            serde_json::json!({
                "type": "GenerateRequest",
                "data": { "elementId": "hme-field-a1" }
            })
        );
    }

    #[test]
    fn reservation_request_carries_its_locator() {
        let message = Message::ReservationRequest(ReservationRequest {
            hme: "polite.otter@relay.example".to_string(),
            label: "news".to_string(),
            element_id: "hme-field-b2".to_string(),
            locator: ElementPath::new(vec![0, 2]),
        });
        let json = serde_json::to_value(&message).expect("serialize message");
        assert_eq!(json["data"]["locator"], serde_json::json!([0, 2]));
    }

    #[test]
    fn correlation_id_is_exposed_for_every_field_message() {
        let response = Message::GenerateResponse(GenerateResponse::ok("hme-field-a1", "x@y"));
        assert_eq!(response.element_id(), Some("hme-field-a1"));
        assert!(response.is_response());

        let autofill = Message::Autofill(AutofillPayload {
            data: "x@y".to_string(),
            locator: None,
        });
        assert_eq!(autofill.element_id(), None);
        assert!(!autofill.is_response());
    }

    #[test]
    fn optional_response_fields_are_omitted_when_absent() {
        let message = Message::GenerateResponse(GenerateResponse::failed("hme-field-a1", "denied"));
        let json = serde_json::to_value(&message).expect("serialize message");
        assert_eq!(
            json["data"],
            serde_json::json!({ "elementId": "hme-field-a1", "error": "denied" })
        );
    }
}
