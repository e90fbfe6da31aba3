//! Core use-case services.
//!
//! # Responsibility
//! - Own transaction boundaries for multi-step writes.
//! - Orchestrate repositories and the assignment engine into use-case APIs.

pub mod assignment_service;
pub mod propagation;
pub mod task_type_service;
