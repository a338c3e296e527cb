//! Domain models for cohort.
//!
//! These are the core types shared across all crates.

pub mod group;
pub mod membership;
pub mod permission;
pub mod project;
