//! Concrete wizard definitions used by the marketplace.

pub mod professional;

pub use professional::{onboarding, profile_edit};
