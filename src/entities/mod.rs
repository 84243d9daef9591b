//! Entity module - Contains the SeaORM entity definitions for the database.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod prefix;

pub use prefix::{Column as PrefixColumn, Entity as Prefix, Model as PrefixModel};
