//! Prefix business logic - the persistent prefix store and the LFU cache in front of it.
//!
//! Reads hit the cache first and fall through to the store on a miss. Writes go to the
//! store and update the cache inside the same critical section, so a read issued after a
//! completed write never sees the old prefix. When the store is disconnected every read
//! degrades to the configured default prefix instead of failing the command pipeline.

use crate::{
    core::{ids::Scope, lfu::LfuCache},
    entities::{Prefix, PrefixColumn, prefix},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*, sea_query::OnConflict};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Longest prefix the store accepts.
pub const MAX_PREFIX_LEN: usize = 32;

/// Persistent prefix storage backed by the `prefixes` table.
///
/// The connection is optional: a bot that failed to reach its database at startup, or
/// that has closed it during shutdown, keeps running on the default prefix.
#[derive(Debug)]
pub struct PrefixStore {
    connection: RwLock<Option<DatabaseConnection>>,
    default_prefix: String,
}

impl PrefixStore {
    /// Wraps an open connection.
    #[must_use]
    pub fn connected(db: DatabaseConnection, default_prefix: impl Into<String>) -> Self {
        Self {
            connection: RwLock::new(Some(db)),
            default_prefix: default_prefix.into(),
        }
    }

    /// A store with no database behind it.
    #[must_use]
    pub fn disconnected(default_prefix: impl Into<String>) -> Self {
        Self {
            connection: RwLock::new(None),
            default_prefix: default_prefix.into(),
        }
    }

    /// The prefix served when nothing else is known.
    #[must_use]
    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    /// Whether a database connection is held.
    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    /// Fetches the prefix for `scope`. A scope without a row gets one holding the default
    /// prefix.
    ///
    /// # Errors
    /// Returns [`Error::NotConnected`] without a connection, or a database error.
    pub async fn get_prefix(&self, scope: &Scope) -> Result<String> {
        let guard = self.connection.read().await;
        let db = guard.as_ref().ok_or(Error::NotConnected)?;
        let key = scope.key();

        if let Some(row) = Prefix::find_by_id(key.clone()).one(db).await? {
            return Ok(row.prefix);
        }

        debug!("No prefix stored for scope {key}, inserting the default");
        let row = prefix::ActiveModel {
            scope_id: Set(key),
            prefix: Set(self.default_prefix.clone()),
            updated_at: Set(chrono::Utc::now().naive_utc()),
        };
        Prefix::insert(row)
            .on_conflict(
                OnConflict::column(PrefixColumn::ScopeId)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(db)
            .await?;
        Ok(self.default_prefix.clone())
    }

    /// Writes the prefix for `scope`, creating the row if needed.
    ///
    /// # Errors
    /// Returns [`Error::NotConnected`] without a connection, or a database error.
    pub async fn set_prefix(&self, scope: &Scope, prefix: &str) -> Result<()> {
        let guard = self.connection.read().await;
        let db = guard.as_ref().ok_or(Error::NotConnected)?;

        let row = prefix::ActiveModel {
            scope_id: Set(scope.key()),
            prefix: Set(prefix.to_string()),
            updated_at: Set(chrono::Utc::now().naive_utc()),
        };
        Prefix::insert(row)
            .on_conflict(
                OnConflict::column(PrefixColumn::ScopeId)
                    .update_columns([PrefixColumn::Prefix, PrefixColumn::UpdatedAt])
                    .to_owned(),
            )
            .exec(db)
            .await?;
        Ok(())
    }

    /// Closes the connection. Later reads fall back to the default prefix.
    ///
    /// # Errors
    /// Returns [`Error::NotConnected`] if the store was already closed.
    pub async fn close(&self) -> Result<()> {
        let db = self
            .connection
            .write()
            .await
            .take()
            .ok_or(Error::NotConnected)?;
        db.close().await?;
        warn!(
            "Closed the database! Falling back to {:?} prefix mode.",
            self.default_prefix
        );
        Ok(())
    }
}

/// LFU-cached view of a [`PrefixStore`].
#[derive(Debug)]
pub struct PrefixCache {
    store: PrefixStore,
    cache: Mutex<LfuCache<String, String>>,
}

impl PrefixCache {
    /// Puts a cache of `capacity` scopes in front of `store`.
    #[must_use]
    pub fn new(store: PrefixStore, capacity: usize) -> Self {
        Self {
            store,
            cache: Mutex::new(LfuCache::new(capacity)),
        }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &PrefixStore {
        &self.store
    }

    /// Resolves the prefix for `scope`.
    ///
    /// Never fails: an unreachable store yields the default prefix, which is not cached so
    /// the real value is picked up once the store is back.
    pub async fn get_prefix(&self, scope: &Scope) -> String {
        let key = scope.key();
        if let Some(prefix) = self.cache.lock().await.get(&key) {
            return prefix;
        }

        match self.store.get_prefix(scope).await {
            // A concurrent set_prefix may have landed while we were fetching; keep its value.
            Ok(prefix) => self.cache.lock().await.insert_if_absent(key, prefix),
            Err(Error::NotConnected) => self.store.default_prefix().to_string(),
            Err(e) => {
                warn!("Failed to fetch prefix for scope {key}: {e}");
                self.store.default_prefix().to_string()
            }
        }
    }

    /// Writes the prefix for `scope` to the store and the cache.
    ///
    /// # Errors
    /// Rejects prefixes longer than [`MAX_PREFIX_LEN`] and propagates store failures; the
    /// cache is left untouched when the write fails.
    pub async fn set_prefix(&self, scope: &Scope, prefix: &str) -> Result<()> {
        if prefix.chars().count() > MAX_PREFIX_LEN {
            return Err(Error::InvalidPrefix {
                reason: format!("prefixes can't be longer than {MAX_PREFIX_LEN} characters"),
            });
        }

        let mut cache = self.cache.lock().await;
        self.store.set_prefix(scope, prefix).await?;
        cache.insert(scope.key(), prefix.to_string());
        Ok(())
    }

    /// Drops `scope` from the cache so the next read goes to the store.
    pub async fn invalidate(&self, scope: &Scope) {
        self.cache.lock().await.remove(&scope.key());
    }

    /// Number of cached scopes.
    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

/// Prefixes longer than this need confirmation.
pub const LONG_PREFIX_LEN: usize = 10;

const MARKDOWN: [&str; 5] = ["*", "\\", "__", "~~", "`"];

/// Verdict on a proposed prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrefixReview {
    /// No prefix was given; the caller should offer mention-only mode.
    Missing,
    /// The prefix can't be used. Holds the explanation for the user.
    Rejected(String),
    /// The prefix is usable once the user has answered each question with yes.
    Accepted {
        /// Normalised prefix
        prefix: String,
        /// Questions to confirm, in order
        confirmations: Vec<String>,
    },
}

/// Whether `text` contains a user, role or channel mention (`<@1>`, `<@!1>`, `<@&1>`, `<#1>`).
fn has_reference(text: &str) -> bool {
    text.match_indices('<').any(|(start, _)| {
        let rest = &text[start + 1..];
        let rest = rest
            .strip_prefix("@!")
            .or_else(|| rest.strip_prefix("@&"))
            .or_else(|| rest.strip_prefix('@'))
            .or_else(|| rest.strip_prefix('#'));
        rest.and_then(|rest| rest.split_once('>'))
            .is_some_and(|(id, _)| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
    })
}

/// Removes matching quotes wrapped around the whole prefix, repeatedly.
fn strip_boundary_quotes(mut prefix: &str) -> &str {
    loop {
        let mut chars = prefix.chars();
        match (chars.next(), chars.next_back()) {
            (Some(first @ ('"' | '\'')), Some(last)) if first == last && prefix.len() >= 2 => {
                prefix = &prefix[1..prefix.len() - 1];
            }
            _ => return prefix,
        }
    }
}

/// Checks a prefix proposed by a user of the bot whose id is `bot_id`.
#[must_use]
pub fn review_prefix(raw: Option<&str>, bot_id: u64) -> PrefixReview {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return PrefixReview::Missing;
    };

    if has_reference(raw) || raw.contains("@everyone") || raw.contains("@here") {
        let mentions = [format!("<@{bot_id}>"), format!("<@!{bot_id}>")];
        let reason = if mentions.iter().any(|mention| raw == mention) {
            format!("I already respond to <@{bot_id}>. No need to set it to the prefix.")
        } else if mentions
            .iter()
            .any(|mention| raw.contains(mention.as_str()))
        {
            format!(
                "I already respond to <@{bot_id}>, adding extra characters just makes it confusing."
            )
        } else {
            "You can't include \"references\" such as @user, #\u{200d}channel, @\u{200d}everyone, \
             or @\u{200d}here in your prefix, sorry."
                .to_string()
        };
        return PrefixReview::Rejected(reason);
    }

    let prefix = strip_boundary_quotes(raw);
    if prefix.is_empty() {
        return PrefixReview::Missing;
    }
    let length = prefix.chars().count();
    if length > MAX_PREFIX_LEN {
        return PrefixReview::Rejected(format!(
            "Your prefix can't be greater than {MAX_PREFIX_LEN} characters, sorry!"
        ));
    }
    if prefix.contains(['"', '\'']) {
        return PrefixReview::Rejected(
            "Quotes can mess with how I parse arguments, so you can't use quotes in your prefix, sorry!"
                .to_string(),
        );
    }

    let mut confirmations = Vec::new();
    if length > LONG_PREFIX_LEN {
        confirmations.push(format!(
            "Your prefix is pretty long. Are you sure you want to set it to \"{prefix}\"?"
        ));
    }
    if MARKDOWN.iter().any(|mark| prefix.contains(mark)) {
        confirmations.push(format!(
            "Markdown can be annoying! Are you sure you want to set the prefix to \"{prefix}\"? \
             It may format stuff in unexpected ways."
        ));
    }

    PrefixReview::Accepted {
        prefix: prefix.to_string(),
        confirmations,
    }
}
