//! Core layer - framework-agnostic bot logic
//!
//! Everything here talks to the chat platform through the [`messenger::Messenger`] trait
//! and to the database through sea-orm, so it can be tested without a gateway connection.

/// Yes/no confirmation prompts
pub mod confirm;
/// Shutdown coordination and signal handling
pub mod exit;
/// Fuzzy matching of users and commands
pub mod fuzzy;
/// Typed ids, reaction tokens and outbound message content
pub mod ids;
/// Least-frequently-used cache
pub mod lfu;
/// Outbound messaging collaborator
pub mod messenger;
/// Per-scope command prefixes
pub mod prefix;
/// Reaction routing and waits
pub mod reactions;
/// Command name index
pub mod registry;
