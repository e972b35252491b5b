//! Capability implementations
//!
//! What runs on the far side of the process boundary. The `research-capability`
//! executable dispatches to these; [`crate::local::InProcessStore`] reuses the store half.

pub mod generate;
pub mod store;
