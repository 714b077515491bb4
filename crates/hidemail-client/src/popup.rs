//! Popup lifecycle: mount-time revalidation and state-gated facade access.
//!
//! Persisted UI state is never trusted over live validation. A popup that
//! reopens in an authenticated state re-validates the session upstream and
//! forces itself back to signed-out when validation fails.

use thiserror::Error;
use tracing::{info, warn};

use hidemail_protocol::popup::{PopupAction, PopupState, PopupStateError};
use hidemail_protocol::store::{KeyValueStore, StoreError};

use crate::client::{ClientConfig, ClientError, HmeClient};
use crate::facade::{FacadeError, HmeFacade};
use crate::session::Session;

#[derive(Debug, Error)]
pub enum PopupError {
    #[error(transparent)]
    State(#[from] PopupStateError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct PopupController<'a> {
    store: &'a dyn KeyValueStore,
    state: PopupState,
    client: Option<HmeClient>,
}

impl<'a> PopupController<'a> {
    /// Rebuild the popup's view of the world from persisted state.
    ///
    /// A persisted authenticated state is only honored after the rebuilt
    /// client re-validates upstream; otherwise the controller signs out,
    /// resets the session, and clears the persisted popup and client state.
    pub async fn mount(store: &'a dyn KeyValueStore) -> Result<PopupController<'a>, PopupError> {
        let persisted = PopupState::load(store).await?;
        if persisted == PopupState::SignedOut {
            return Ok(Self {
                store,
                state: PopupState::SignedOut,
                client: None,
            });
        }

        let session = Session::load(store).await?;
        let Some(config) = ClientConfig::from_store(store).await? else {
            warn!("persisted popup state without client state; forcing signed_out");
            return Self::force_signed_out(store, HmeClient::new(ClientConfig::default(), session))
                .await;
        };

        let mut client = HmeClient::new(config, session);
        match client.validate_token(Some(store)).await {
            Ok(_) => {
                info!(state = %persisted, "popup resumed persisted state");
                Ok(Self {
                    store,
                    state: persisted,
                    client: Some(client),
                })
            }
            Err(error) => {
                warn!(%error, "persisted session failed revalidation; forcing signed_out");
                Self::force_signed_out(store, client).await
            }
        }
    }

    async fn force_signed_out(
        store: &'a dyn KeyValueStore,
        mut client: HmeClient,
    ) -> Result<PopupController<'a>, PopupError> {
        client.sign_out(false, store).await?;
        PopupState::SignedOut.persist(store).await?;
        Ok(Self {
            store,
            state: PopupState::SignedOut,
            client: None,
        })
    }

    #[must_use]
    pub fn state(&self) -> PopupState {
        self.state
    }

    #[must_use]
    pub fn client(&self) -> Option<&HmeClient> {
        self.client.as_ref()
    }

    /// Facade access is gated by the state machine: unreachable outside the
    /// authenticated states.
    pub fn facade(&self) -> Result<HmeFacade<'_>, FacadeError> {
        match (self.state, self.client.as_ref()) {
            (PopupState::SignedOut, _) | (_, None) => Err(FacadeError::ClientAuthentication),
            (_, Some(client)) => HmeFacade::new(client),
        }
    }

    /// Record a completed sign-in and persist the transition.
    pub async fn complete_sign_in(&mut self, client: HmeClient) -> Result<PopupState, PopupError> {
        let next = self.state.apply(PopupAction::SignInSuccess)?;
        next.persist(self.store).await?;
        self.client = Some(client);
        self.state = next;
        Ok(next)
    }

    /// Apply a view transition (manage, generate) and persist it.
    pub async fn apply(&mut self, action: PopupAction) -> Result<PopupState, PopupError> {
        let next = self.state.apply(action)?;
        next.persist(self.store).await?;
        self.state = next;
        Ok(next)
    }

    /// Sign out from either authenticated state. The client reset clears the
    /// persisted keys; the signed-out view state is persisted fresh after.
    pub async fn sign_out(&mut self, trust: bool) -> Result<PopupState, PopupError> {
        let next = self.state.apply(PopupAction::SignOut)?;
        if let Some(client) = self.client.as_mut() {
            client.sign_out(trust, self.store).await?;
        }
        next.persist(self.store).await?;
        self.client = None;
        self.state = next;
        Ok(next)
    }
}
