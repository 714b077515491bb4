//! Content-script side of the autofill flow.
//!
//! Tracks live candidate input fields, correlates in-flight generate and
//! reserve operations by element id, and resolves late responses against
//! positional locators because the original DOM node may be long gone.

pub mod tracker;

pub use tracker::{AutofillTracker, FieldSurface, PendingFieldOperation, ResolveOutcome};
