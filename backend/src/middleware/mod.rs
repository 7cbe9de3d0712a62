//! Request middleware.
//!
//! Purpose: define middleware components for request lifecycle concerns such
//! as trace correlation and completion logging.

pub mod trace;

pub use trace::Trace;
