//! Repository implementations for database access.

pub mod projects;

pub use projects::{PgProjectStore, ProjectStore, ProjectTransaction};
