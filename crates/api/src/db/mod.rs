//! Shared database schema, migrations, and query builders.

pub mod dishes;
pub mod memberships;
pub mod migrations;
pub mod restaurants;
pub mod staff;
pub mod tables;
pub mod users;

// Re-export tables for convenience
pub use tables::*;

/// A built statement: SQL with `?` placeholders plus its bound values.
pub type Built = (String, sea_query::Values);
