//! Prefix entity - Stores the command prefix configured for each scope.
//! A scope is a guild or a private channel, keyed by its id rendered as text.
//! An empty prefix means the bot only answers to mentions in that scope.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Prefix database model - one row per scope
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "prefixes")]
pub struct Model {
    /// Guild or channel id rendered as text
    #[sea_orm(primary_key, auto_increment = false)]
    pub scope_id: String,
    /// The prefix; empty for mention-only mode
    pub prefix: String,
    /// When this prefix was last written
    pub updated_at: DateTime,
}

/// `Prefix` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
