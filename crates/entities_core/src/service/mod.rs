//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce cross-entity rules that a single table constraint cannot
//!   express (active owners, registered foreign ids, task scoping).
//! - Keep callers decoupled from storage details.

pub mod application_service;
pub mod group_service;
pub mod link_service;
pub mod membership_service;
pub mod organization_service;
