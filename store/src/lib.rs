// exported modules
pub mod client;
pub mod entry;
pub mod env;
pub mod error;
pub mod policy;

// re-exports
pub use client::*;
pub use entry::*;
pub use env::StoreEnv;
pub use error::*;
pub use policy::{GenerationPolicy, PolicyOverrides};

/// Extension of encrypted entries in the store.
pub const ENTRY_EXTENSION: &str = "gpg";
