//! Nutri Wizard — multi-step registration and profile-edit engine for the
//! nutrition marketplace.

pub mod answers;
pub mod config;
pub mod error;
pub mod flows;
pub mod store;
pub mod wizard;
