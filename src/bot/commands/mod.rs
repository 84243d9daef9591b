//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Server administration commands
pub mod admin;

/// Owner-only maintenance commands
pub mod developer;

/// General utility commands
pub mod general;

// Export commands
pub use admin::*;
pub use developer::*;
pub use general::*;
