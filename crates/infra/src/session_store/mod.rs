//! Session storage adapters.
//!
//! Each adapter holds the single session slot of one authenticated context.

mod file;
mod in_memory;

pub use file::{FileSessionStorage, SESSION_FILE_ENV};
pub use in_memory::InMemorySessionStorage;

use edugate_auth::SessionError;

fn storage_error(err: anyhow::Error) -> SessionError {
    SessionError::Storage(format!("{err:#}"))
}
