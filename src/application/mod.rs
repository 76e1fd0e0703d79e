// Application layer - use cases and orchestration.
// Every mutating use case runs in a single storage transaction.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
