//! Wire models for the Townmeet REST backend.
//!
//! Response shapes are modeled as closed structs and enums at the boundary
//! so downstream logic matches exhaustively instead of poking at untyped
//! payloads.

pub mod decision;
pub mod event;
pub mod profile;

pub use decision::{DecisionKind, PendingDecision};
pub use event::{EventCard, EventDraft, EventSummary, PendingCounts, RequestAck};
pub use profile::Profile;
