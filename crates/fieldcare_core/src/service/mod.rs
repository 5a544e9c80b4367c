//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own the write transaction boundary of each use-case.

pub mod import_service;
pub mod ingest_service;
