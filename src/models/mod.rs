//! Domain models for SimpleLabels.
//!
//! # Core Concepts
//!
//! - [`LabelRecord`]: The in-memory state of one entity's label, including the
//!   local-only scene binding.
//! - [`LabelPayload`]: The wire and disk form of a record. It has no binding field,
//!   so a binding can never leak into a file or a broadcast.
//! - [`ObjectHandle`]: Opaque key into the live scene. It may go stale and is only
//!   ever compared, never dereferenced.
//! - [`ChangeOrigin`]: Where a mutation came from. Only local edits travel outward.

mod input;
mod label;
mod payload;

pub use input::*;
pub use label::*;
pub use payload::*;
