//! Infrastructure layer: storage adapters behind the auth crate's seams.

pub mod directory;
pub mod session_store;

pub use directory::InMemoryUserDirectory;
pub use session_store::{FileSessionStorage, InMemorySessionStorage, SESSION_FILE_ENV};
