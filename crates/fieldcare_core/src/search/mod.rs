//! Offline patient search.
//!
//! # Responsibility
//! - Parse wire requests into typed parameters ([`request`]).
//! - Compose one predicate over patient, address and attribute stores
//!   ([`compose`]).
//! - Execute it in the background and project rows ([`executor`],
//!   [`result`]).

pub mod compose;
pub mod executor;
pub mod request;
pub mod result;
