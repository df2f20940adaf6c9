//! Bounded, most-recent-first log of played rounds.
//!
//! Persisted history may come from older releases that stored one flat entry per
//! submission. [`PersistedEntry`] classifies every stored value explicitly and
//! [`History::from_persisted`] upgrades or drops each one, so loading is total and
//! re-loading already migrated data changes nothing.

use crate::item::Item;
use crate::scoring::Score;
use crate::util::{mean, percent};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub type GameId = u64;

/// Maximum number of game records kept.
pub const MAX_GAMES: usize = 100;
/// Maximum number of attempts kept per game record.
pub const MAX_ATTEMPTS: usize = 100;
/// Largest id accepted from storage; ids above it leave no room for later ones.
pub const MAX_ID: u64 = i64::MAX as u64;

/// Which records a listing keeps, by whether any attempt got every item right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Outcome {
    #[default]
    All,
    Success,
    Fail,
}

/// One scored submission against a round's items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: u64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub provided: Vec<Item>,
    #[serde(default)]
    pub correct: usize,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub percent: u8,
    #[serde(default, alias = "memorizeElapsed")]
    pub memorize_elapsed_ms: u64,
    #[serde(default, alias = "guessElapsed")]
    pub guess_elapsed_ms: u64,
}

impl Attempt {
    pub fn score(&self) -> Score {
        Score {
            correct: self.correct,
            total: self.total,
            percent: self.percent,
        }
    }
}

/// Persisted summary of one round and every attempt made against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: GameId,
    #[serde(alias = "date")]
    pub start_date: DateTime<Utc>,
    #[serde(default, alias = "pairs", alias = "words")]
    pub items: Vec<Item>,
    pub attempts: Vec<Attempt>,
    #[serde(default, alias = "pairsCount", alias = "wordsCount")]
    pub item_count: usize,
    #[serde(default, alias = "memorizeTime")]
    pub memorize_seconds: u32,
    #[serde(default)]
    pub completed: bool,
}

impl GameRecord {
    pub fn new(
        id: GameId,
        start_date: DateTime<Utc>,
        items: Vec<Item>,
        item_count: usize,
        memorize_seconds: u32,
    ) -> Self {
        Self {
            id,
            start_date,
            items,
            attempts: Vec::new(),
            item_count,
            memorize_seconds,
            completed: false,
        }
    }

    /// Most recent attempt goes first; the oldest fall off past [`MAX_ATTEMPTS`].
    pub fn push_attempt(&mut self, attempt: Attempt) {
        self.attempts.insert(0, attempt);
        self.attempts.truncate(MAX_ATTEMPTS);
    }

    pub fn latest_attempt(&self) -> Option<&Attempt> {
        self.attempts.first()
    }

    pub fn has_attempts(&self) -> bool {
        !self.attempts.is_empty()
    }

    /// True once any attempt scored every item.
    pub fn is_success(&self) -> bool {
        self.attempts.iter().any(|a| a.correct == a.total)
    }

    pub fn best_percent(&self) -> u8 {
        self.attempts.iter().map(|a| a.percent).max().unwrap_or(0)
    }

    /// Per item, whether some attempt gave it in the right position (ignoring case).
    pub fn solved_positions(&self) -> Vec<bool> {
        self.items
            .iter()
            .enumerate()
            .map(|(idx, want)| {
                let want = want.to_lowercase();
                self.attempts
                    .iter()
                    .any(|a| a.provided.get(idx).is_some_and(|got| got.to_lowercase() == want))
            })
            .collect()
    }

    fn ids_in_range(&self) -> bool {
        self.id <= MAX_ID && self.attempts.iter().all(|a| a.id <= MAX_ID)
    }

    fn keeps(&self, outcome: Outcome) -> bool {
        match outcome {
            Outcome::All => true,
            Outcome::Success => self.is_success(),
            Outcome::Fail => !self.is_success(),
        }
    }

    /// `needle` must already be lowercased. An empty needle matches everything.
    fn matches_query(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        if self.items.join(" ").to_lowercase().contains(needle) {
            return true;
        }
        if self
            .attempts
            .iter()
            .any(|a| a.provided.join(" ").to_lowercase().contains(needle))
        {
            return true;
        }
        self.start_date.to_rfc3339().to_lowercase().contains(needle)
    }
}

/// Issues unique ids ordered by creation time.
///
/// Ids are milliseconds since the epoch, bumped past the last issued id when two
/// are requested within the same millisecond.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdSequence {
    last: u64,
}

impl IdSequence {
    pub fn issue(&mut self, now: DateTime<Utc>) -> u64 {
        let millis = now.timestamp_millis().max(0) as u64;
        let id = millis.max(self.last.saturating_add(1));
        self.last = id;
        id
    }

    /// Make sure later ids sort after `id`. Ids past [`MAX_ID`] are not tracked.
    pub fn observe(&mut self, id: u64) {
        if id <= MAX_ID {
            self.last = self.last.max(id);
        }
    }

    fn observe_record(&mut self, record: &GameRecord) {
        self.observe(record.id);
        for attempt in &record.attempts {
            self.observe(attempt.id);
        }
    }
}

/// Flat entry written by older releases: one submission, no attempts list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyFlatRecord {
    pub id: Option<u64>,
    pub date: Option<DateTime<Utc>>,
    pub provided: Vec<Item>,
    pub correct: Option<usize>,
    pub total: Option<usize>,
    pub percent: Option<u8>,
    #[serde(alias = "pairs", alias = "words")]
    pub items: Option<Vec<Item>>,
    #[serde(alias = "pairsCount", alias = "wordsCount")]
    pub item_count: Option<usize>,
    #[serde(alias = "memorizeTime")]
    pub memorize_seconds: Option<u32>,
}

impl LegacyFlatRecord {
    fn upgrade(self, ids: &mut IdSequence, now: DateTime<Utc>) -> Option<GameRecord> {
        if self.provided.is_empty() {
            return None;
        }

        let id = match self.id {
            Some(id) if id <= MAX_ID => id,
            _ => ids.issue(now),
        };
        let date = self.date.unwrap_or(now);
        let correct = self.correct.unwrap_or(0);
        let total = self
            .total
            .filter(|&t| t > 0)
            .unwrap_or(self.provided.len());
        let pct = self.percent.unwrap_or_else(|| percent(correct, total));
        let items = self.items.unwrap_or_default();

        let attempt = Attempt {
            id,
            date,
            provided: self.provided,
            correct,
            total,
            percent: pct,
            memorize_elapsed_ms: 0,
            guess_elapsed_ms: 0,
        };

        Some(GameRecord {
            id,
            start_date: date,
            item_count: self.item_count.unwrap_or(items.len()),
            items,
            attempts: vec![attempt],
            memorize_seconds: self.memorize_seconds.unwrap_or(0),
            completed: pct == 100,
        })
    }
}

/// A stored history entry, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedEntry {
    Current(GameRecord),
    LegacyFlat(LegacyFlatRecord),
    Unrecognized(Value),
}

impl PersistedEntry {
    pub fn classify(value: Value) -> Self {
        let attempts = value.get("attempts").and_then(Value::as_array).map(Vec::len);
        let has_provided = value.get("provided").is_some_and(Value::is_array);

        match attempts {
            Some(n) if n > 0 => Self::parse_current(value),
            _ if has_provided => match serde_json::from_value(value.clone()) {
                Ok(legacy) => Self::LegacyFlat(legacy),
                Err(e) => {
                    log::debug!("unreadable legacy history entry: {e}");
                    Self::Unrecognized(value)
                }
            },
            Some(_) => Self::parse_current(value),
            None => Self::Unrecognized(value),
        }
    }

    fn parse_current(value: Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(record) => Self::Current(record),
            Err(e) => {
                log::debug!("unreadable history record: {e}");
                Self::Unrecognized(value)
            }
        }
    }

    fn known_id(&self) -> Option<u64> {
        match self {
            Self::LegacyFlat(legacy) => legacy.id,
            _ => None,
        }
    }

    /// Upgrade into a game record, or `None` when the entry carries no attempt.
    pub fn migrate(self, ids: &mut IdSequence, now: DateTime<Utc>) -> Option<GameRecord> {
        match self {
            Self::Current(record) if !record.ids_in_range() => {
                log::warn!("dropping history record with out-of-range id {}", record.id);
                None
            }
            Self::Current(record) if record.has_attempts() => Some(record),
            Self::Current(record) => {
                log::info!("dropping history record {} without attempts", record.id);
                None
            }
            Self::LegacyFlat(legacy) => legacy.upgrade(ids, now),
            Self::Unrecognized(value) => {
                log::warn!("dropping unrecognized history entry: {value}");
                None
            }
        }
    }
}

impl From<GameRecord> for PersistedEntry {
    fn from(record: GameRecord) -> Self {
        Self::Current(record)
    }
}

impl Serialize for PersistedEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Current(record) => record.serialize(serializer),
            Self::LegacyFlat(legacy) => legacy.serialize(serializer),
            Self::Unrecognized(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for PersistedEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::classify)
    }
}

/// Aggregate view over a history, for listings.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub games: usize,
    pub attempts: usize,
    pub completed: usize,
    pub mean_percent: Option<f64>,
    pub best_percent: Option<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct History {
    games: Vec<GameRecord>,
    ids: IdSequence,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load stored entries, upgrading legacy ones and dropping the rest.
    pub fn from_persisted(entries: Vec<PersistedEntry>, now: DateTime<Utc>) -> Self {
        let mut ids = IdSequence::default();
        for entry in &entries {
            match entry {
                PersistedEntry::Current(record) => ids.observe_record(record),
                other => {
                    if let Some(id) = other.known_id() {
                        ids.observe(id);
                    }
                }
            }
        }

        let games: Vec<GameRecord> = entries
            .into_iter()
            .filter_map(|entry| entry.migrate(&mut ids, now))
            .take(MAX_GAMES)
            .collect();

        Self { games, ids }
    }

    pub fn to_persisted(&self) -> Vec<PersistedEntry> {
        self.games.iter().cloned().map(PersistedEntry::from).collect()
    }

    pub fn issue_id(&mut self, now: DateTime<Utc>) -> u64 {
        self.ids.issue(now)
    }

    /// Newest first; the oldest record falls off past [`MAX_GAMES`].
    pub fn push_front(&mut self, record: GameRecord) {
        self.ids.observe_record(&record);
        self.games.insert(0, record);
        self.games.truncate(MAX_GAMES);
    }

    pub fn find(&self, id: GameId) -> Option<&GameRecord> {
        self.games.iter().find(|g| g.id == id)
    }

    pub fn find_mut(&mut self, id: GameId) -> Option<&mut GameRecord> {
        self.games.iter_mut().find(|g| g.id == id)
    }

    pub fn contains(&self, id: GameId) -> bool {
        self.find(id).is_some()
    }

    /// Remove the record `id` if it has no attempts. Returns whether it was removed.
    pub fn prune_empty(&mut self, id: GameId) -> bool {
        let before = self.games.len();
        self.games.retain(|g| g.id != id || g.has_attempts());
        self.games.len() != before
    }

    pub fn clear(&mut self) {
        self.games.clear();
    }

    pub fn records(&self) -> &[GameRecord] {
        &self.games
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameRecord> {
        self.games.iter()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Records whose items, answers or start date contain `query`, ignoring case.
    pub fn search<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a GameRecord> + 'a {
        let needle = query.trim().to_lowercase();
        self.games.iter().filter(move |g| g.matches_query(&needle))
    }

    /// [`History::search`] narrowed to records with the given outcome.
    pub fn filter<'a>(
        &'a self,
        outcome: Outcome,
        query: &str,
    ) -> impl Iterator<Item = &'a GameRecord> + 'a {
        self.search(query).filter(move |g| g.keeps(outcome))
    }

    pub fn summary(&self) -> HistorySummary {
        let percents: Vec<f64> = self
            .games
            .iter()
            .flat_map(|g| g.attempts.iter())
            .map(|a| a.percent as f64)
            .collect();
        let best_percent = self
            .games
            .iter()
            .flat_map(|g| g.attempts.iter())
            .map(|a| a.percent)
            .max();

        HistorySummary {
            games: self.games.len(),
            attempts: percents.len(),
            completed: self.games.iter().filter(|g| g.completed).count(),
            mean_percent: mean(&percents),
            best_percent,
        }
    }
}
