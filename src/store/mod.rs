//! Persistence layer: table backends for submissions and draft storage.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod rest;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryDraftStore;
pub use rest::RestBackend;
pub use traits::{DataBackend, DraftStore};
