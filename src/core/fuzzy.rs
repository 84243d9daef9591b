//! Fuzzy resolution of free-text input to users or commands.
//!
//! A query that names a candidate exactly (id, mention or name) resolves without asking.
//! Anything else is ranked by string similarity and, when something scores high enough,
//! the author is asked to pick from the best matches with reactions.

use crate::{
    config::settings::FuzzySettings,
    core::{
        ids::{Embed, MessageRef, ReactionToken, Reply},
        messenger::Messenger,
        reactions::Prompter,
    },
    errors::Result,
};
use tracing::debug;

/// Upper bound on listed results, one per keycap token.
pub const MAX_RESULTS: usize = 10;

/// Content of the disambiguation prompt.
pub const PROMPT: &str = "**Do you mean:**";

/// Something a query can resolve to.
#[derive(Clone, Debug)]
pub struct Candidate<T> {
    /// Numeric id, matched exactly and compared as text
    pub id: Option<u64>,
    /// Primary name, shown in prompts
    pub name: String,
    /// Secondary name (nickname, command alias)
    pub alias: Option<String>,
    /// What resolving to this candidate yields
    pub value: T,
}

impl<T> Candidate<T> {
    /// A candidate known only by name.
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            id: None,
            name: name.into(),
            alias: None,
            value,
        }
    }

    /// Sets the numeric id.
    #[must_use]
    pub const fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    fn comparables(&self) -> impl Iterator<Item = String> + '_ {
        self.id
            .map(|id| id.to_string())
            .into_iter()
            .chain(std::iter::once(self.name.clone()))
            .chain(self.alias.clone())
    }
}

/// A candidate that survived ranking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ranked {
    /// Position in the candidate list
    pub index: usize,
    /// Best similarity over the candidate's names (0-100)
    pub score: u8,
    /// The name that produced `score`
    pub matched: String,
}

/// How many results to list and how similar they must be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankOptions {
    /// Listed results, capped at [`MAX_RESULTS`]
    pub result_limit: usize,
    /// Minimum score kept
    pub score_threshold: u8,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            result_limit: 3,
            score_threshold: 50,
        }
    }
}

impl From<&FuzzySettings> for RankOptions {
    fn from(settings: &FuzzySettings) -> Self {
        Self {
            result_limit: settings.result_limit,
            score_threshold: settings.score_threshold,
        }
    }
}

/// Outcome of [`Prompter::resolve`].
#[derive(Debug)]
pub enum Resolution<T> {
    /// The query resolved
    Found {
        /// The chosen candidate's value
        value: T,
        /// The prompt message, if one was used
        message: Option<MessageRef>,
    },
    /// Nothing matched, or the author declined every suggestion
    NotFound {
        /// The query, for the caller's not-found notice
        query: String,
        /// The prompt message, if one was used
        message: Option<MessageRef>,
    },
}

/// Similarity of two strings from 0 to 100, ignoring case.
///
/// `2 * lcs / (len(a) + len(b))` scaled to a percentage and rounded, where `lcs` is the
/// length of the longest common subsequence.
#[must_use]
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100;
    }

    let score = (200 * common_subsequence(&a, &b) + total / 2) / total;
    u8::try_from(score).unwrap_or(100)
}

fn common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut previous = vec![0; b.len() + 1];
    let mut current = vec![0; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            current[j + 1] = if x == y {
                previous[j] + 1
            } else {
                current[j].max(previous[j + 1])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Ranks `candidates` against `query`, best first.
///
/// Each candidate scores its best name. Ties keep candidate order. At most
/// `result_limit` results are returned, none below the threshold.
#[must_use]
pub fn rank<T>(query: &str, candidates: &[Candidate<T>], options: RankOptions) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            candidate
                .comparables()
                .map(|name| (ratio(query, &name), name))
                .fold(
                    None,
                    |best: Option<(u8, String)>, (score, name)| match best {
                        Some((top, _)) if top >= score => best,
                        _ => Some((score, name)),
                    },
                )
                .map(|(score, matched)| Ranked {
                    index,
                    score,
                    matched,
                })
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(options.result_limit.min(MAX_RESULTS));
    ranked.retain(|entry| entry.score >= options.score_threshold);
    ranked
}

/// The single best candidate scoring at least `threshold`.
#[must_use]
pub fn best_match<T>(query: &str, candidates: &[Candidate<T>], threshold: u8) -> Option<Ranked> {
    rank(
        query,
        candidates,
        RankOptions {
            result_limit: 1,
            score_threshold: threshold,
        },
    )
    .pop()
}

fn unescape(query: &str) -> String {
    query.trim().replace("\\<@", "<@")
}

/// The id inside `<@id>` or `<@!id>`.
fn mention_id(query: &str) -> Option<u64> {
    let inner = query.strip_prefix("<@")?.strip_suffix('>')?;
    inner.strip_prefix('!').unwrap_or(inner).parse().ok()
}

/// What gets ranked: a mention is reduced to its id.
fn search_key(query: &str) -> String {
    mention_id(query).map_or_else(|| query.to_string(), |id| id.to_string())
}

/// Finds the candidate `query` names exactly: by id or mention, then by name or alias,
/// then by a case-insensitive name or alias shared by no other candidate.
#[must_use]
pub fn exact_match<T>(query: &str, candidates: &[Candidate<T>]) -> Option<usize> {
    let query = unescape(query);
    if let Some(id) = mention_id(&query).or_else(|| query.parse().ok())
        && let Some(index) = candidates.iter().position(|c| c.id == Some(id))
    {
        return Some(index);
    }

    let names = |c: &Candidate<T>| {
        std::iter::once(c.name.clone())
            .chain(c.alias.clone())
            .collect::<Vec<_>>()
    };
    if let Some(index) = candidates
        .iter()
        .position(|c| names(c).iter().any(|name| *name == query))
    {
        return Some(index);
    }

    let folded = query.to_lowercase();
    let mut matches = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| names(c).iter().any(|name| name.to_lowercase() == folded))
        .map(|(index, _)| index);
    match (matches.next(), matches.next()) {
        (Some(index), None) => Some(index),
        _ => None,
    }
}

fn take<T>(candidates: Vec<Candidate<T>>, index: usize) -> Option<T> {
    candidates.into_iter().nth(index).map(|c| c.value)
}

impl<M: Messenger> Prompter<'_, M> {
    /// Resolves `query` to one of `candidates`, asking the author when the match is fuzzy.
    ///
    /// An exact match resolves silently. A single fuzzy match is offered as a yes/no
    /// question; several are listed with a keycap reaction each plus the decline token.
    /// The prompt is posted, or shown in `existing` when given.
    ///
    /// # Errors
    /// Fails if the multi-choice prompt cannot be posted or its reactions attached.
    pub async fn resolve<T>(
        &self,
        query: &str,
        candidates: Vec<Candidate<T>>,
        existing: Option<MessageRef>,
        options: RankOptions,
    ) -> Result<Resolution<T>> {
        let query = unescape(query);
        let not_found = |message| Resolution::NotFound {
            query: query.clone(),
            message,
        };

        if let Some(index) = exact_match(&query, &candidates) {
            return Ok(take(candidates, index).map_or_else(
                || not_found(existing),
                |value| Resolution::Found {
                    value,
                    message: existing,
                },
            ));
        }

        let ranked = rank(&search_key(&query), &candidates, options);
        debug!(
            "Fuzzy lookup for {query:?} kept {} candidates",
            ranked.len()
        );
        if ranked.is_empty() {
            return Ok(not_found(existing));
        }

        let embed = ranked
            .iter()
            .enumerate()
            .fold(Embed::default(), |embed, (position, entry)| {
                embed.field(
                    format!("{}. {}", position + 1, entry.matched),
                    candidates[entry.index].name.clone(),
                )
            });
        let prompt = Reply::text(PROMPT).with_embed(embed);

        let chosen = if let [only] = ranked.as_slice() {
            let (accepted, message) = self.confirm_action(&prompt, existing, self.timeout).await;
            if !accepted {
                return Ok(not_found(message));
            }
            (only.index, message)
        } else {
            let message = self.send_or_edit(existing, &prompt).await?;
            let numbers: Vec<ReactionToken> = ReactionToken::keycaps()
                .into_iter()
                .take(ranked.len())
                .collect();
            let options = self
                .wait_options()
                .accepting(numbers.iter().cloned().chain([self.answers.no.clone()]));

            let Some(reaction) = self.wait_for_reactions(&message, options).await? else {
                return Ok(not_found(Some(message)));
            };
            let Some(position) = numbers.iter().position(|token| *token == reaction.token) else {
                return Ok(not_found(Some(message)));
            };
            (ranked[position].index, Some(message))
        };

        let (index, message) = chosen;
        Ok(match take(candidates, index) {
            Some(value) => Resolution::Found { value, message },
            None => not_found(message),
        })
    }

    /// Shows `notice` in place of the prompt (dropping its embed), or posts it.
    ///
    /// # Errors
    /// Fails if the notice cannot be delivered.
    pub async fn report_not_found(
        &self,
        message: Option<MessageRef>,
        notice: &str,
    ) -> Result<MessageRef> {
        self.send_or_edit(message, &Reply::text(notice)).await
    }
}

/// Default not-found notice for `query`.
#[must_use]
pub fn not_found_notice(query: &str) -> String {
    format!("Couldn't find \"{query}\".")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::reactions::{Answers, ReactionHub};
    use crate::test_utils::{Call, FIRST_MESSAGE_ID, MockMessenger, event, wait_until_watching};
    use poise::serenity_prelude::{ChannelId, MessageId, UserId};

    const AUTHOR: u64 = 10;

    fn named(names: &[&str]) -> Vec<Candidate<usize>> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Candidate::new(*name, i))
            .collect()
    }

    fn prompter<'a>(
        messenger: &'a MockMessenger,
        hub: &'a ReactionHub,
    ) -> Prompter<'a, MockMessenger> {
        Prompter::new(messenger, hub, ChannelId::new(1), UserId::new(AUTHOR))
    }

    async fn react(hub: &ReactionHub, token: &ReactionToken) {
        wait_until_watching(hub, MessageId::new(FIRST_MESSAGE_ID)).await;
        hub.dispatch(event(FIRST_MESSAGE_ID, AUTHOR, token));
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio("jon", "jon"), 100);
        assert_eq!(ratio("JON", "jon"), 100);
        assert_eq!(ratio("jon", "john"), 86);
        assert_eq!(ratio("jon", "joan"), 86);
        assert_eq!(ratio("abc", "xyz"), 0);
        assert_eq!(ratio("", ""), 100);
    }

    #[test]
    fn test_rank_orders_by_score_with_stable_ties() {
        let candidates = named(&["joan", "jon", "john"]);
        let ranked = rank("jon", &candidates, RankOptions::default());

        let order: Vec<(&str, u8)> = ranked
            .iter()
            .map(|r| (candidates[r.index].name.as_str(), r.score))
            .collect();
        assert_eq!(order, vec![("jon", 100), ("joan", 86), ("john", 86)]);
    }

    #[test]
    fn test_rank_never_lists_below_threshold() {
        let candidates = named(&["jonathan", "zed", "jo", "quanta", "j"]);
        for threshold in [0, 30, 50, 80, 100] {
            let options = RankOptions {
                result_limit: 10,
                score_threshold: threshold,
            };
            assert!(
                rank("jon", &candidates, options)
                    .iter()
                    .all(|r| r.score >= threshold)
            );
        }
    }

    #[test]
    fn test_rank_limit_is_capped() {
        let names: Vec<String> = (0..15).map(|i| format!("user{i}")).collect();
        let candidates: Vec<Candidate<usize>> = names
            .iter()
            .enumerate()
            .map(|(i, name)| Candidate::new(name.as_str(), i))
            .collect();
        let options = RankOptions {
            result_limit: 50,
            score_threshold: 0,
        };
        assert_eq!(rank("user", &candidates, options).len(), MAX_RESULTS);
    }

    #[test]
    fn test_rank_uses_best_name() {
        let candidates = vec![
            Candidate::new("Zephyr", 0).with_alias(Some("jonny".to_string())),
            Candidate::new("Gale", 1).with_id(123_456),
        ];
        let ranked = rank("jonn", &candidates, RankOptions::default());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].matched, "jonny");

        let by_id = rank("123457", &candidates, RankOptions::default());
        assert_eq!(by_id[0].index, 1);
    }

    #[test]
    fn test_best_match() {
        let candidates = named(&["ping", "prefix", "setprefix", "help"]);
        assert_eq!(
            best_match("prefx", &candidates, 80).map(|r| r.index),
            Some(1)
        );
        assert_eq!(best_match("zzz", &candidates, 80), None);
    }

    #[test]
    fn test_exact_match_paths() {
        let candidates = vec![
            Candidate::new("Quanta", 'q').with_id(42),
            Candidate::new("quanta", 'r').with_id(43),
            Candidate::new("Robin", 's')
                .with_id(44)
                .with_alias(Some("Bird".to_string())),
        ];

        assert_eq!(exact_match("42", &candidates), Some(0));
        assert_eq!(exact_match("<@43>", &candidates), Some(1));
        assert_eq!(exact_match("<@!44>", &candidates), Some(2));
        assert_eq!(exact_match("\\<@44>", &candidates), Some(2));
        assert_eq!(exact_match("quanta", &candidates), Some(1));
        assert_eq!(exact_match("robin", &candidates), Some(2));
        assert_eq!(exact_match("bird", &candidates), Some(2));
        assert_eq!(
            exact_match("QUANTA", &candidates),
            None,
            "ambiguous without case"
        );
        assert_eq!(exact_match("<@99>", &candidates), None);
    }

    #[tokio::test]
    async fn test_exact_query_resolves_without_prompt() -> Result<()> {
        let messenger = MockMessenger::new();
        let hub = ReactionHub::new();
        let candidates = named(&["jon", "john", "joan"]);

        let resolution = prompter(&messenger, &hub)
            .resolve("jon", candidates, None, RankOptions::default())
            .await?;

        assert!(matches!(
            resolution,
            Resolution::Found {
                value: 0,
                message: None
            }
        ));
        assert!(messenger.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_single_match_is_confirmed() -> Result<()> {
        let messenger = MockMessenger::new();
        let hub = ReactionHub::new();
        let prompter = prompter(&messenger, &hub);
        let candidates = named(&["zzz", "john"]);

        let answers = Answers::default();
        let (resolution, ()) = tokio::join!(
            prompter.resolve("jonh", candidates, None, RankOptions::default()),
            react(&hub, &answers.yes),
        );

        assert!(matches!(resolution?, Resolution::Found { value: 1, .. }));
        let Call::Send { reply, .. } = &messenger.calls()[0] else {
            panic!("prompt was not sent first");
        };
        assert_eq!(reply.content.as_deref(), Some(PROMPT));
        assert_eq!(
            reply.embed.as_ref().unwrap().fields,
            vec![("1. john".to_string(), "john".to_string())]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_single_match_declined() -> Result<()> {
        let messenger = MockMessenger::new();
        let hub = ReactionHub::new();
        let prompter = prompter(&messenger, &hub);

        let answers = Answers::default();
        let (resolution, ()) = tokio::join!(
            prompter.resolve("jonh", named(&["john"]), None, RankOptions::default()),
            react(&hub, &answers.no),
        );

        let Resolution::NotFound { query, message } = resolution? else {
            panic!("declined suggestion resolved");
        };
        assert_eq!(query, "jonh");
        assert_eq!(message.map(|m| m.message_id.get()), Some(FIRST_MESSAGE_ID));
        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_matches_pick_by_number() -> Result<()> {
        let messenger = MockMessenger::new();
        let hub = ReactionHub::new();
        let prompter = prompter(&messenger, &hub);
        let second = ReactionToken::keycaps()[1].clone();

        let (resolution, ()) = tokio::join!(
            prompter.resolve(
                "jo",
                named(&["john", "joan", "jonas"]),
                None,
                RankOptions::default()
            ),
            react(&hub, &second),
        );

        assert!(matches!(resolution?, Resolution::Found { value: 1, .. }));
        let added = messenger.count(|call| matches!(call, Call::AddReaction { .. }));
        assert_eq!(added, 4, "three numbers and the decline token");
        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_matches_declined() -> Result<()> {
        let messenger = MockMessenger::new();
        let hub = ReactionHub::new();
        let prompter = prompter(&messenger, &hub);

        let answers = Answers::default();
        let (resolution, ()) = tokio::join!(
            prompter.resolve("jo", named(&["john", "joan"]), None, RankOptions::default()),
            react(&hub, &answers.no),
        );

        assert!(matches!(resolution?, Resolution::NotFound { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_nothing_close_enough() -> Result<()> {
        let messenger = MockMessenger::new();
        let hub = ReactionHub::new();

        let resolution = prompter(&messenger, &hub)
            .resolve(
                "quanta",
                named(&["john", "joan"]),
                None,
                RankOptions::default(),
            )
            .await?;

        assert!(
            matches!(resolution, Resolution::NotFound { ref query, message: None } if query == "quanta")
        );
        assert!(messenger.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_report_not_found_replaces_prompt() -> Result<()> {
        let messenger = MockMessenger::new();
        let hub = ReactionHub::new();
        let prompter = prompter(&messenger, &hub);
        let prompt = MessageRef::new(ChannelId::new(1), MessageId::new(5));

        prompter
            .report_not_found(Some(prompt), &not_found_notice("quanta"))
            .await?;

        assert_eq!(
            messenger.calls(),
            vec![Call::Edit {
                message: prompt,
                reply: Reply::text("Couldn't find \"quanta\"."),
            }]
        );
        Ok(())
    }
}
