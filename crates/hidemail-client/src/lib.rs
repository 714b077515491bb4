//! Authenticated client core for the hidemail extension.
//!
//! Captures session headers from upstream responses, validates them into a
//! webservice endpoint map, and issues authorized alias operations. State
//! lives in the shared persisted store; every context rebuilds its client
//! from there rather than holding implicit globals.

pub mod client;
pub mod facade;
pub mod popup;
pub mod session;

pub use client::{ClientConfig, ClientError, HmeClient};
pub use facade::{FacadeError, HmeEmail, HmeFacade, HmeListResult};
pub use popup::{PopupController, PopupError};
pub use session::{Session, WebserviceEndpoint};
