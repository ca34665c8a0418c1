// Public modules
pub mod adapter;
pub mod defaults;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod git;
pub mod hooks;
pub mod layout;
pub mod manager;
pub mod manifest;
pub mod permissions;
pub mod project;
pub mod steps;

// Internal modules - not part of public API
pub(crate) mod paths;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
