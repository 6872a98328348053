//! Client-side relevance ranking of entries against a query.
//!
//! The vocabulary counts every token across all entries. Rare tokens weigh
//! more: each token occurrence contributes `(1 / count)²`, and an entry's
//! score is the weight of its tokens matching the expanded query divided by
//! the square root of the weight of all its tokens.
mod tokenizer;
mod trie;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::models::{EntryId, EntryNode};

pub use tokenizer::tokenize;
pub use trie::Trie;

/// Query tokens shorter than this never match anything.
pub const MIN_PREFIX_CHARS: usize = 3;

/// An entry with its relevance to the current query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedEntry {
    pub id: EntryId,
    pub score: f64,
}

/// Vocabulary plus prefix index over a set of entries.
///
/// # Examples
///
/// ```
/// use tagmap::ranker::Ranker;
///
/// let mut ranker = Ranker::new();
/// ranker.create_vocab_from_texts([("Tokio runtime", "spawn tasks"), ("Tokens", "")]);
///
/// assert_eq!(ranker.tokens_from_prefix("tok"), vec!["tokens", "tokio"]);
/// assert!(ranker.tokens_from_prefix("to").is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct Ranker {
    vocab: HashMap<String, usize>,
    trie: Trie,
}

/// Tokens of an entry; title and content are tokenized separately.
fn entry_tokens(title: &str, content: &str) -> Vec<String> {
    let mut tokens = tokenize(title);
    tokens.extend(tokenize(content));
    tokens
}

impl Ranker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the vocabulary and the trie from scratch.
    pub fn create_vocab<'a>(&mut self, entries: impl IntoIterator<Item = &'a EntryNode>) {
        self.create_vocab_from_texts(
            entries
                .into_iter()
                .map(|entry| (entry.title(), entry.content())),
        );
    }

    /// Same as [`create_vocab`](Self::create_vocab) over raw `(title, content)` pairs.
    pub fn create_vocab_from_texts<'a>(
        &mut self,
        texts: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        self.vocab.clear();
        for (title, content) in texts {
            for token in entry_tokens(title, content) {
                *self.vocab.entry(token).or_default() += 1;
            }
        }

        self.trie = Trie::new();
        for token in self.vocab.keys() {
            self.trie.insert(token);
        }
        log::debug!("event=vocab_build tokens={} status=ok", self.vocab.len());
    }

    /// Occurrences of `token` across all entries, if it is known.
    pub fn frequency(&self, token: &str) -> Option<usize> {
        self.vocab.get(token).copied()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Vocabulary tokens starting with `prefix`; empty below three characters.
    pub fn tokens_from_prefix(&self, prefix: &str) -> Vec<String> {
        if prefix.chars().count() < MIN_PREFIX_CHARS {
            return Vec::new();
        }
        self.trie.with_prefix(prefix)
    }

    /// Every vocabulary token some query token is a prefix of.
    fn expand_query(&self, query: &str) -> HashSet<String> {
        tokenize(query)
            .iter()
            .flat_map(|token| self.tokens_from_prefix(token))
            .collect()
    }

    fn score_tokens(&self, tokens: &[String], query: &HashSet<String>) -> f64 {
        let mut score = 0.0;
        let mut norm = 0.0;
        for token in tokens {
            let Some(count) = self.frequency(token) else {
                continue;
            };
            let weight = (1.0 / count as f64).powi(2);
            if query.contains(token) {
                score += weight;
            }
            norm += weight;
        }
        if norm > 0.0 { score / norm.sqrt() } else { 0.0 }
    }

    /// Scores every entry against `query`.
    ///
    /// Entries are never modified; calling twice with the same inputs gives
    /// the same map.
    pub fn score_entries<'a>(
        &self,
        query: &str,
        entries: impl IntoIterator<Item = &'a EntryNode>,
    ) -> HashMap<EntryId, f64> {
        let expanded = self.expand_query(query);
        entries
            .into_iter()
            .map(|entry| {
                let tokens = entry_tokens(entry.title(), entry.content());
                (entry.id(), self.score_tokens(&tokens, &expanded))
            })
            .collect()
    }

    /// Entries with a positive score, best first; ties go to the most
    /// recently modified entry.
    pub fn rank_entries<'a>(
        &self,
        query: &str,
        entries: impl IntoIterator<Item = &'a EntryNode>,
    ) -> Vec<RankedEntry> {
        let expanded = self.expand_query(query);
        let mut ranked: Vec<(RankedEntry, &EntryNode)> = entries
            .into_iter()
            .filter_map(|entry| {
                let tokens = entry_tokens(entry.title(), entry.content());
                let score = self.score_tokens(&tokens, &expanded);
                (score > 0.0).then_some((
                    RankedEntry {
                        id: entry.id(),
                        score,
                    },
                    entry,
                ))
            })
            .collect();
        ranked.sort_by(|(a, a_entry), (b, b_entry)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b_entry.modified_at().cmp(&a_entry.modified_at()))
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.into_iter().map(|(ranked, _)| ranked).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryRecord, TagId};
    use time::OffsetDateTime;
    use time::macros::datetime;

    fn entry(id: i64, title: &str, content: &str, modified: OffsetDateTime) -> EntryNode {
        EntryNode::from(EntryRecord {
            id: EntryId::new(id),
            title: title.to_string(),
            content: content.to_string(),
            created_at: modified,
            modified_at: modified,
            category: TagId::new(1),
        })
    }

    fn corpus() -> Vec<EntryNode> {
        let day = datetime!(2020-01-01 00:00:00 UTC);
        vec![
            entry(1, "Tokio runtime", "spawn async tasks", day),
            entry(2, "Async traits", "boxed futures", day),
            entry(3, "Bread", "flour water salt", day),
        ]
    }

    fn ranker(entries: &[EntryNode]) -> Ranker {
        let mut ranker = Ranker::new();
        ranker.create_vocab(entries);
        ranker
    }

    #[test]
    fn vocab_counts_every_occurrence() {
        let entries = corpus();
        let ranker = ranker(&entries);

        assert_eq!(ranker.frequency("async"), Some(2));
        assert_eq!(ranker.frequency("bread"), Some(1));
        assert_eq!(ranker.frequency("missing"), None);
    }

    #[test]
    fn title_and_content_do_not_fuse() {
        let entries = vec![entry(1, "alpha", "beta", OffsetDateTime::UNIX_EPOCH)];
        let ranker = ranker(&entries);

        assert_eq!(ranker.frequency("alphabeta"), None);
        assert_eq!(ranker.frequency("alpha"), Some(1));
        assert_eq!(ranker.frequency("beta"), Some(1));
    }

    #[test]
    fn rebuilding_forgets_old_tokens() {
        let mut ranker = ranker(&corpus());

        ranker.create_vocab(&[entry(9, "fresh", "", OffsetDateTime::UNIX_EPOCH)]);

        assert_eq!(ranker.vocab_size(), 1);
        assert!(ranker.tokens_from_prefix("tok").is_empty());
    }

    #[test]
    fn short_prefixes_match_nothing() {
        let ranker = ranker(&corpus());

        assert!(ranker.tokens_from_prefix("as").is_empty());
        assert_eq!(ranker.tokens_from_prefix("asy"), vec!["async"]);
    }

    #[test]
    fn score_formula() {
        let entries = corpus();
        let ranker = ranker(&entries);

        let scores = ranker.score_entries("tok", &entries);

        // entry 1: tokio(1) runtime(1) spawn(1) async(2) tasks(1)
        let norm: f64 = 1.0 + 1.0 + 1.0 + 0.25 + 1.0;
        let expected = 1.0 / norm.sqrt();
        assert!((scores[&EntryId::new(1)] - expected).abs() < 1e-12);
        assert_eq!(scores[&EntryId::new(2)], 0.0);
        assert_eq!(scores[&EntryId::new(3)], 0.0);
    }

    #[test]
    fn scoring_is_idempotent() {
        let entries = corpus();
        let ranker = ranker(&entries);

        let first = ranker.score_entries("async fut", &entries);
        let second = ranker.score_entries("async fut", &entries);

        assert_eq!(first, second);
    }

    #[test]
    fn unknown_tokens_are_skipped() {
        let entries = corpus();
        let ranker = ranker(&[]);

        let scores = ranker.score_entries("tokio", &entries);

        assert!(scores.values().all(|&score| score == 0.0));
    }

    #[test]
    fn rank_drops_zero_scores_and_breaks_ties_by_recency() {
        let old = datetime!(2020-01-01 00:00:00 UTC);
        let new = datetime!(2021-01-01 00:00:00 UTC);
        let entries = vec![
            entry(1, "rust", "", old),
            entry(2, "rust", "", new),
            entry(3, "bread", "", new),
        ];
        let ranker = ranker(&entries);

        let ranked = ranker.rank_entries("rust", &entries);

        let ids: Vec<EntryId> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![EntryId::new(2), EntryId::new(1)]);
    }

    #[test]
    fn unmatched_rare_tokens_dilute_the_score() {
        let day = OffsetDateTime::UNIX_EPOCH;
        let entries = vec![
            entry(1, "async", "common common", day),
            entry(2, "async", "unique", day),
            entry(3, "async", "common", day),
        ];
        let ranker = ranker(&entries);

        let ranked = ranker.rank_entries("async", &entries);

        // "unique" outweighs everything else entry 2 holds
        assert_eq!(ranked.last().unwrap().id, EntryId::new(2));
        assert_eq!(ranked.len(), 3);
    }
}
