//! Command registry - a name/alias index over the registered commands, built once at startup.

use crate::core::fuzzy::{Candidate, Ranked, best_match};
use std::collections::HashMap;

/// What the help and suggestion paths need to know about a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEntry {
    /// Invocation name
    pub name: String,
    /// Alternative names
    pub aliases: Vec<String>,
    /// One-line description
    pub description: Option<String>,
    /// Help category
    pub category: Option<String>,
    /// Hidden from help and suggestions
    pub hidden: bool,
}

impl CommandEntry {
    /// Reads the metadata of a framework command.
    #[must_use]
    pub fn from_command<U, E>(command: &poise::Command<U, E>) -> Self {
        Self {
            name: command.name.clone(),
            aliases: command.aliases.clone(),
            description: command.description.clone(),
            category: command.category.clone(),
            hidden: command.hide_in_help,
        }
    }
}

/// Case-insensitive lookup of commands by name or alias.
#[derive(Clone, Debug, Default)]
pub struct CommandRegistry {
    entries: Vec<CommandEntry>,
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    /// Indexes `entries`. When two commands claim the same name the first one keeps it.
    #[must_use]
    pub fn new(entries: Vec<CommandEntry>) -> Self {
        let mut index = HashMap::new();
        for (position, entry) in entries.iter().enumerate() {
            for name in std::iter::once(&entry.name).chain(&entry.aliases) {
                index.entry(name.to_lowercase()).or_insert(position);
            }
        }
        Self { entries, index }
    }

    /// Builds the registry from the framework's command list.
    #[must_use]
    pub fn from_commands<U, E>(commands: &[poise::Command<U, E>]) -> Self {
        Self::new(commands.iter().map(CommandEntry::from_command).collect())
    }

    /// Finds a command by name or alias, ignoring case.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&CommandEntry> {
        self.index
            .get(&name.trim().to_lowercase())
            .map(|&position| &self.entries[position])
    }

    /// Every command, in registration order.
    #[must_use]
    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    /// Visible commands, in registration order.
    pub fn visible(&self) -> impl Iterator<Item = &CommandEntry> {
        self.entries.iter().filter(|entry| !entry.hidden)
    }

    /// Fuzzy-match candidates: one per visible name or alias, each yielding the command's
    /// primary name.
    #[must_use]
    pub fn candidates(&self) -> Vec<Candidate<String>> {
        self.visible()
            .flat_map(|entry| {
                std::iter::once(&entry.name)
                    .chain(&entry.aliases)
                    .map(|name| Candidate::new(name.clone(), entry.name.clone()))
            })
            .collect()
    }

    /// The visible command whose name or alias is closest to `query`, if any scores at
    /// least `threshold`. Returns the matched name and the command.
    #[must_use]
    pub fn suggest(&self, query: &str, threshold: u8) -> Option<(String, &CommandEntry)> {
        let candidates = self.candidates();
        let Ranked { index, matched, .. } = best_match(query, &candidates, threshold)?;
        let entry = self.lookup(&candidates[index].value)?;
        Some((matched, entry))
    }
}
