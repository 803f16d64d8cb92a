//! # Lingo Common Library
//!
//! Shared code for the Lingo services including:
//! - Database bootstrap and row models
//! - Plan tiers, metered features and the entitlement table
//! - Configuration loading
//! - Object storage for generated content
//! - Retry helpers for transient failures

pub mod config;
pub mod db;
pub mod error;
pub mod plans;
pub mod retry;
pub mod storage;

pub use error::{Error, Result};
pub use plans::{Entitlement, Feature, PlanTier};
