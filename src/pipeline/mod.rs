//! The scan pipeline stages.
//!
//! A scan flows through three stages, each its own module:
//!
//! ```text
//! upload bytes ──▶ normalize ──▶ vision ──▶ lookup ──▶ response
//!                  (resize,      (model     (card
//!                   re-encode)    calls)     database)
//! ```
//!
//! [`crate::scan::Scanner`] orchestrates the stages; each stage stays
//! independently testable with plain inputs and mock trait impls.

pub mod lookup;
pub mod normalize;
pub mod vision;
