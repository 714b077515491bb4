//! Popup view state machine.
//!
//! Three states, persisted after every transition so a reopened popup
//! resumes the last view. Requesting an action outside the transition table
//! is a programming error and fails loudly.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{self, KEY_POPUP_STATE, KeyValueStore, StoreError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupState {
    #[default]
    SignedOut,
    Authenticated,
    AuthenticatedAndManaging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupAction {
    SignInSuccess,
    Manage,
    Generate,
    SignOut,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PopupStateError {
    #[error("popup_transition_undefined:{state}:{action}")]
    UndefinedTransition {
        state: PopupState,
        action: PopupAction,
    },
}

impl PopupState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignedOut => "signed_out",
            Self::Authenticated => "authenticated",
            Self::AuthenticatedAndManaging => "authenticated_and_managing",
        }
    }

    /// Apply one action from the transition table.
    pub fn apply(self, action: PopupAction) -> Result<PopupState, PopupStateError> {
        match (self, action) {
            (Self::SignedOut, PopupAction::SignInSuccess) => Ok(Self::Authenticated),
            (Self::Authenticated, PopupAction::Manage) => Ok(Self::AuthenticatedAndManaging),
            (Self::Authenticated, PopupAction::SignOut) => Ok(Self::SignedOut),
            (Self::AuthenticatedAndManaging, PopupAction::Generate) => Ok(Self::Authenticated),
            (Self::AuthenticatedAndManaging, PopupAction::SignOut) => Ok(Self::SignedOut),
            (state, action) => Err(PopupStateError::UndefinedTransition { state, action }),
        }
    }

    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        Ok(store::load_json(store, KEY_POPUP_STATE)
            .await?
            .unwrap_or_default())
    }

    pub async fn persist(self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store::save_json(store, KEY_POPUP_STATE, &self).await
    }
}

impl PopupAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignInSuccess => "sign_in_success",
            Self::Manage => "manage",
            Self::Generate => "generate",
            Self::SignOut => "sign_out",
        }
    }
}

impl fmt::Display for PopupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PopupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
