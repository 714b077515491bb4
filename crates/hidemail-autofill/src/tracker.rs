//! Live field tracking and response resolution.

use std::collections::HashMap;

use tracing::{debug, warn};

use hidemail_protocol::message::{
    self, GenerateRequest, GenerateResponse, Message, ReservationRequest, ReservationResponse,
};
use hidemail_protocol::path::ElementPath;
use hidemail_protocol::store::{self, KeyValueStore, StoreError, field_path_key};

/// The content script's view of the host page, subscribed to DOM mutation
/// batches by the caller. Implementations must tolerate paths that no longer
/// resolve: `write_value` reports success, and detaching an already-detached
/// helper is a no-op, never a failure.
pub trait FieldSurface {
    fn contains(&self, path: &ElementPath) -> bool;
    /// Write `value` into the field at `path` and synthesize input/change
    /// events so host-page frameworks observe the programmatic edit.
    /// Returns false when the element no longer exists.
    fn write_value(&mut self, path: &ElementPath, value: &str) -> bool;
    /// Write `value` into the currently focused field, if any.
    fn write_active(&mut self, value: &str) -> bool;
    fn attach_helper(&mut self, path: &ElementPath, element_id: &str);
    fn detach_helper(&mut self, element_id: &str);
    /// Show a generated candidate address on the field's helper control.
    fn show_candidate(&mut self, element_id: &str, hme: &str);
    /// Surface a server-side failure on the helper control.
    fn show_error(&mut self, element_id: &str, message: &str);
}

/// Correlation entry for one candidate field with work pending or possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFieldOperation {
    pub element_id: String,
    pub path: ElementPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Value written into the target field; helper detached.
    Filled,
    /// Helper control now shows a generated candidate address.
    HelperUpdated,
    /// Server-side error surfaced on the helper control.
    Rejected,
    /// Target no longer mounted; dropped without effect.
    Stale,
    /// Not addressed to any field this tracker knows.
    Ignored,
}

/// Maps currently mounted candidate fields to helper state and resolves
/// response messages by correlation id. Each field's operation is
/// independent: responses may arrive in any order and touch only the field
/// whose id they carry.
#[derive(Debug, Default)]
pub struct AutofillTracker {
    fields: HashMap<String, PendingFieldOperation>,
}

impl AutofillTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tracked(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn pending_for(&self, element_id: &str) -> Option<&PendingFieldOperation> {
        self.fields.get(element_id)
    }

    /// React to a subtree-add batch: attach helper state to each new
    /// candidate field under a fresh correlation id. Returns the ids in the
    /// order of `paths`.
    pub fn observe_added(
        &mut self,
        surface: &mut dyn FieldSurface,
        paths: &[ElementPath],
    ) -> Vec<String> {
        paths
            .iter()
            .map(|path| {
                let element_id = message::new_element_id();
                surface.attach_helper(path, &element_id);
                self.fields.insert(
                    element_id.clone(),
                    PendingFieldOperation {
                        element_id: element_id.clone(),
                        path: path.clone(),
                    },
                );
                element_id
            })
            .collect()
    }

    /// React to a subtree-remove batch: detach helper state for every
    /// tracked field inside a removed subtree. Idempotent; fields already
    /// gone are skipped without complaint.
    pub fn observe_removed(&mut self, surface: &mut dyn FieldSurface, removed: &[ElementPath]) {
        let detached: Vec<String> = self
            .fields
            .values()
            .filter(|entry| removed.iter().any(|root| entry.path.is_within(root)))
            .map(|entry| entry.element_id.clone())
            .collect();

        for element_id in detached {
            surface.detach_helper(&element_id);
            self.fields.remove(&element_id);
            debug!(element_id = element_id.as_str(), "helper detached");
        }
    }

    /// Build a generate request for a tracked field.
    #[must_use]
    pub fn generate_request(&self, element_id: &str) -> Option<Message> {
        self.fields.get(element_id).map(|entry| {
            Message::GenerateRequest(GenerateRequest {
                element_id: entry.element_id.clone(),
            })
        })
    }

    /// Build a reservation request for a tracked field, embedding its stored
    /// locator so a late response can re-find the element.
    #[must_use]
    pub fn reservation_request(&self, element_id: &str, hme: &str, label: &str) -> Option<Message> {
        self.fields.get(element_id).map(|entry| {
            Message::ReservationRequest(ReservationRequest {
                hme: hme.to_string(),
                label: label.to_string(),
                element_id: entry.element_id.clone(),
                locator: entry.path.clone(),
            })
        })
    }

    /// Resolve an incoming message against the tracked fields.
    ///
    /// A response whose target vanished is a silent no-op by design: a blur
    /// or removal cannot abort the in-flight call, so the handler checks
    /// liveness here instead of erroring.
    pub fn resolve(&mut self, surface: &mut dyn FieldSurface, message: &Message) -> ResolveOutcome {
        match message {
            Message::Autofill(payload) => {
                let written = match &payload.locator {
                    Some(path) => surface.write_value(path, &payload.data),
                    None => surface.write_active(&payload.data),
                };
                if written {
                    ResolveOutcome::Filled
                } else {
                    debug!("autofill target vanished; dropping");
                    ResolveOutcome::Stale
                }
            }
            Message::GenerateResponse(response) => self.resolve_generate(surface, response),
            Message::ReservationResponse(response) => self.resolve_reservation(surface, response),
            Message::GenerateRequest(_) | Message::ReservationRequest(_) => ResolveOutcome::Ignored,
        }
    }

    fn resolve_generate(
        &mut self,
        surface: &mut dyn FieldSurface,
        response: &GenerateResponse,
    ) -> ResolveOutcome {
        let Some(entry) = self.fields.get(&response.element_id) else {
            debug!(
                element_id = response.element_id.as_str(),
                "generate response for unknown field"
            );
            return ResolveOutcome::Ignored;
        };

        if !surface.contains(&entry.path) {
            let element_id = entry.element_id.clone();
            self.fields.remove(&element_id);
            debug!(
                element_id = element_id.as_str(),
                "generate response target vanished; dropping"
            );
            return ResolveOutcome::Stale;
        }

        if let Some(error) = &response.error {
            warn!(
                element_id = response.element_id.as_str(),
                error = error.as_str(),
                "generate rejected upstream"
            );
            surface.show_error(&response.element_id, error);
            return ResolveOutcome::Rejected;
        }
        match &response.hme {
            Some(hme) => {
                surface.show_candidate(&response.element_id, hme);
                ResolveOutcome::HelperUpdated
            }
            None => ResolveOutcome::Ignored,
        }
    }

    fn resolve_reservation(
        &mut self,
        surface: &mut dyn FieldSurface,
        response: &ReservationResponse,
    ) -> ResolveOutcome {
        let Some(entry) = self.fields.get(&response.element_id) else {
            debug!(
                element_id = response.element_id.as_str(),
                "reservation response for unknown field"
            );
            return ResolveOutcome::Ignored;
        };
        let stored_path = entry.path.clone();
        let element_id = entry.element_id.clone();

        if let Some(error) = &response.error {
            if !surface.contains(&stored_path) {
                self.fields.remove(&element_id);
                debug!(
                    element_id = element_id.as_str(),
                    "reservation response target vanished; dropping"
                );
                return ResolveOutcome::Stale;
            }
            warn!(
                element_id = element_id.as_str(),
                error = error.as_str(),
                "reservation rejected upstream"
            );
            surface.show_error(&element_id, error);
            return ResolveOutcome::Rejected;
        }

        let Some(hme) = &response.hme else {
            return ResolveOutcome::Ignored;
        };

        // The stored locator outlives the original node; a locator carried
        // on the response wins over the one captured at attach time.
        let path = response.locator.clone().unwrap_or(stored_path);

        if surface.write_value(&path, hme) {
            surface.detach_helper(&element_id);
            self.fields.remove(&element_id);
            ResolveOutcome::Filled
        } else {
            self.fields.remove(&element_id);
            debug!(
                element_id = element_id.as_str(),
                "reservation response target vanished; dropping"
            );
            ResolveOutcome::Stale
        }
    }
}

/// Persist a field's locator so another context (or a reloaded content
/// script) can resolve a late response for it.
pub async fn cache_field_path(
    store: &dyn KeyValueStore,
    element_id: &str,
    path: &ElementPath,
) -> Result<(), StoreError> {
    store::save_json(store, &field_path_key(element_id), path).await
}

pub async fn cached_field_path(
    store: &dyn KeyValueStore,
    element_id: &str,
) -> Result<Option<ElementPath>, StoreError> {
    store::load_json(store, &field_path_key(element_id)).await
}

pub async fn forget_field_path(
    store: &dyn KeyValueStore,
    element_id: &str,
) -> Result<(), StoreError> {
    store.remove(&field_path_key(element_id)).await
}
