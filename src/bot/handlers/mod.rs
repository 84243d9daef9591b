//! Discord interaction handlers
//!
//! This module provides the framework hooks (command lifecycle, errors, gateway events)
//! and the autocomplete handlers used by slash command parameters.

/// Autocomplete handlers for command names
pub mod autocomplete;
/// Gateway event routing
pub mod events;
/// Command lifecycle hooks and error handling
pub mod lifecycle;

pub use autocomplete::*;
pub use events::*;
pub use lifecycle::*;
