//! nscache core
//!
//! Error handling, the cache client port and the small set of types shared
//! by the namespace layer and its backends.

pub mod error;
pub mod ports;
pub mod types;

pub use error::{Error, Result};
pub use ports::CacheClient;
pub use types::StoreOptions;
