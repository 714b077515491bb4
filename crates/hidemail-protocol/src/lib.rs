//! Shared contracts for the hidemail extension contexts.
//!
//! The background process, per-page content scripts, and the popup share no
//! memory. Everything they agree on lives here: the message union and its
//! correlation discipline, the popup state machine, positional element
//! locators, and the persisted key/value store seam.

pub mod message;
pub mod path;
pub mod popup;
pub mod store;

pub use message::Message;
pub use path::ElementPath;
pub use popup::{PopupAction, PopupState, PopupStateError};
pub use store::{KeyValueStore, MemoryStore, StoreError};
