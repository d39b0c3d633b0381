//! API route definitions.

pub mod files;
pub mod health;
