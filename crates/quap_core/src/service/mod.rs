//! Import use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the content import walk.
//! - Keep the CLI decoupled from storage details.

pub mod deprecation;
pub mod import_service;
pub mod level;
pub mod summary;
