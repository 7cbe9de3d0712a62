//! In-memory adapters.
//!
//! Used by the test suites and by the server when no database URL is
//! configured. State lives for the lifetime of the process.

mod access_tokens;
mod resource_store;

pub use access_tokens::MemoryAccessTokens;
pub use resource_store::MemoryResourceStore;
