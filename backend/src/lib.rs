//! Bookshelf JSON:API resource server.
//!
//! The domain mediates JSON:API interactions over four entity kinds; the
//! HTTP and persistence adapters plug into its ports.

pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod settings;

pub use middleware::Trace;
