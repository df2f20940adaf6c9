//! The round state machine shared by every game kind.
//!
//! A [`Session`] owns one game's live round, its history and its high score.
//! Every transition is a synchronous state change; timers live in the host,
//! which reports elapsed time through [`Session::tick`],
//! [`Session::tick_memorize_elapsed`] and [`Session::tick_guess_elapsed`].

use crate::elapsed::ElapsedTracker;
use crate::history::{Attempt, GameId, GameRecord, History, PersistedEntry};
use crate::item::{Generated, Item, ItemKind};
use crate::scoring::{self, update_high_score, HighScore, Score};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source of wall-clock timestamps for records and attempts.
pub trait Clock: fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    #[default]
    Ready,
    Showing,
    Input,
    Result,
}

/// Settings for the next round, validated by the configuration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundConfig {
    pub item_count: usize,
    /// Row size for digit pairs, column count for words.
    pub layout: usize,
    pub memorize_seconds: u32,
    pub timer_enabled: bool,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            item_count: 5,
            layout: 5,
            memorize_seconds: 8,
            timer_enabled: true,
        }
    }
}

/// Comparison detail of the verified attempt that ended a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub score: Score,
    pub expected: Vec<Item>,
    pub provided: Vec<Item>,
    pub is_new_high: bool,
}

/// What happened to a buffer update in the input phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Not accepting input right now.
    Ignored,
    /// The formatted buffer did not change, so nothing was re-checked.
    Unchanged,
    /// Still waiting for `need` input units.
    Pending { have: usize, need: usize },
    /// Complete but wrong; logged as an attempt, still in the input phase.
    Rejected(Score),
    /// Complete and correct; the round moved to the result phase.
    Verified(Score),
}

/// The live part of a session, persisted so a reload resumes mid-round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoundSnapshot {
    pub phase: Phase,
    pub items: Vec<Item>,
    pub chunked: Vec<Vec<Item>>,
    pub input: String,
    pub timer_remaining: u32,
    pub elapsed: ElapsedTracker,
    pub result: Option<RoundResult>,
}

/// Everything a session persists between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub history: Vec<PersistedEntry>,
    pub current_game_id: Option<GameId>,
    pub high_score: Option<HighScore>,
    pub round: Option<RoundSnapshot>,
}

#[derive(Debug)]
pub struct Session<K: ItemKind> {
    kind: K,
    defaults: RoundConfig,
    config: RoundConfig,
    phase: Phase,
    items: Vec<Item>,
    chunked: Vec<Vec<Item>>,
    input: String,
    result: Option<RoundResult>,
    timer_remaining: u32,
    elapsed: ElapsedTracker,
    current_game_id: Option<GameId>,
    history: History,
    high_score: Option<HighScore>,
    clock: Box<dyn Clock>,
}

impl<K: ItemKind> Session<K> {
    pub fn new(kind: K, config: RoundConfig) -> Self {
        Self {
            kind,
            defaults: config,
            config,
            phase: Phase::Ready,
            items: Vec::new(),
            chunked: Vec::new(),
            input: String::new(),
            result: None,
            timer_remaining: 0,
            elapsed: ElapsedTracker::default(),
            current_game_id: None,
            history: History::new(),
            high_score: None,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn chunked(&self) -> &[Vec<Item>] {
        &self.chunked
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn result(&self) -> Option<&RoundResult> {
        self.result.as_ref()
    }

    /// Per-position correctness of the last verified attempt.
    pub fn result_marks(&self) -> Vec<bool> {
        self.result
            .as_ref()
            .map(|r| scoring::marks(&self.kind, &r.expected, &r.provided).collect())
            .unwrap_or_default()
    }

    pub fn timer_remaining(&self) -> u32 {
        self.timer_remaining
    }

    pub fn memorize_elapsed_ms(&self) -> u64 {
        self.elapsed.memorize_ms
    }

    pub fn guess_elapsed_ms(&self) -> u64 {
        self.elapsed.guess_ms
    }

    pub fn current_game_id(&self) -> Option<GameId> {
        self.current_game_id
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn high_score(&self) -> Option<&HighScore> {
        self.high_score.as_ref()
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    /// Replace both the defaults and the working configuration, as after loading or saving config.
    pub fn load_config(&mut self, config: RoundConfig) {
        self.defaults = config;
        self.config = config;
    }

    /// Change the working configuration only; `reset` reverts it to the defaults.
    pub fn configure(&mut self, config: RoundConfig) {
        self.config = config;
    }

    /// False when a new round would have no items (e.g. an empty dictionary).
    pub fn can_start(&self) -> bool {
        self.kind.available(self.config.item_count) > 0
    }

    /// Generate items with the current configuration and start a round with them.
    pub fn new_round<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let generated = self
            .kind
            .generate(rng, self.config.item_count, self.config.layout);
        self.start_round(generated);
    }

    /// Start a round from any phase, abandoning whatever was in progress.
    pub fn start_round(&mut self, generated: Generated) {
        self.abandon_active();

        let now = self.clock.now();
        let id = self.history.issue_id(now);
        self.history.push_front(GameRecord::new(
            id,
            now,
            generated.items.clone(),
            self.config.item_count,
            self.config.memorize_seconds,
        ));
        self.current_game_id = Some(id);

        self.items = generated.items;
        self.chunked = generated.chunked;
        self.phase = Phase::Showing;
        self.timer_remaining = if self.config.timer_enabled {
            self.config.memorize_seconds
        } else {
            0
        };
        self.input.clear();
        self.result = None;
        self.elapsed.reset();

        log::debug!(
            "{} round {} started with {} items",
            self.kind.kind(),
            id,
            self.items.len()
        );
    }

    /// One second of the memorize countdown. Only counts down while showing with time left.
    pub fn tick(&mut self) {
        if self.phase != Phase::Showing || self.timer_remaining == 0 {
            return;
        }
        self.timer_remaining -= 1;
        if self.timer_remaining == 0 {
            self.phase = Phase::Input;
            log::debug!("{} countdown elapsed", self.kind.kind());
        }
    }

    /// Hide the items and start recall immediately.
    pub fn hide_now(&mut self) {
        if self.phase != Phase::Showing {
            return;
        }
        self.phase = Phase::Input;
        self.timer_remaining = 0;
        self.elapsed.reset_guess();
    }

    pub fn tick_memorize_elapsed(&mut self) {
        if self.phase == Phase::Showing {
            self.elapsed.tick_memorize();
        }
    }

    pub fn tick_guess_elapsed(&mut self) {
        if self.phase == Phase::Input {
            self.elapsed.tick_guess();
        }
    }

    /// Replace the input buffer and verify automatically once it is complete.
    ///
    /// A complete, fully correct answer ends the round. A complete wrong answer is
    /// logged with [`Session::record_attempt`] so the user can keep editing.
    pub fn set_input(&mut self, raw: &str) -> InputOutcome {
        if self.phase != Phase::Input {
            return InputOutcome::Ignored;
        }

        let formatted = self.kind.format_buffer(raw, self.items.len());
        if formatted == self.input {
            return InputOutcome::Unchanged;
        }
        self.input = formatted;
        let need = self.kind.expected_len(self.items.len());
        let have = self.kind.measure(&self.input);
        if need == 0 || have != need {
            return InputOutcome::Pending { have, need };
        }

        let provided = self.kind.split(&self.input);
        let all_correct = scoring::score(&self.kind, &self.items, &provided).is_perfect();
        if all_correct {
            self.verify_input(provided)
                .map_or(InputOutcome::Ignored, InputOutcome::Verified)
        } else {
            self.record_attempt(provided)
                .map_or(InputOutcome::Ignored, InputOutcome::Rejected)
        }
    }

    /// Score a final answer, log it on the active record and move to the result phase.
    pub fn verify_input(&mut self, provided: Vec<Item>) -> Option<Score> {
        if self.phase != Phase::Input {
            log::debug!("verify ignored in phase {}", self.phase);
            return None;
        }

        let now = self.clock.now();
        let score = scoring::score(&self.kind, &self.items, &provided);
        let is_new_high = self.kind.tracks_high_score()
            && update_high_score(
                &mut self.high_score,
                HighScore {
                    percent: score.percent,
                    correct: score.correct,
                    total: score.total,
                    item_count: self.config.item_count,
                    memorize_seconds: self.config.memorize_seconds,
                    date: now,
                },
            );
        let attempt = self.new_attempt(&provided, score, now);

        let active = self
            .current_game_id
            .take()
            .and_then(|id| self.history.find_mut(id));
        match active {
            Some(record) => {
                record.push_attempt(attempt);
                record.completed = true;
            }
            None => {
                log::warn!("no active record to verify against; creating one");
                let mut record = self.fallback_record(now);
                record.push_attempt(attempt);
                record.completed = true;
                self.history.push_front(record);
            }
        }

        self.result = Some(RoundResult {
            score,
            expected: self.items.clone(),
            provided,
            is_new_high,
        });
        self.phase = Phase::Result;
        log::debug!(
            "{} verified {}/{} ({}%)",
            self.kind.kind(),
            score.correct,
            score.total,
            score.percent
        );

        Some(score)
    }

    /// Log an interim answer on the active record without leaving the input phase.
    pub fn record_attempt(&mut self, provided: Vec<Item>) -> Option<Score> {
        if self.phase != Phase::Input {
            log::debug!("attempt ignored in phase {}", self.phase);
            return None;
        }

        let now = self.clock.now();
        let score = scoring::score(&self.kind, &self.items, &provided);
        let attempt = self.new_attempt(&provided, score, now);

        let active = self
            .current_game_id
            .and_then(|id| self.history.find_mut(id));
        match active {
            Some(record) => record.push_attempt(attempt),
            None => {
                log::warn!("no active record for attempt; creating one");
                let mut record = self.fallback_record(now);
                record.push_attempt(attempt);
                self.current_game_id = Some(record.id);
                self.history.push_front(record);
            }
        }

        Some(score)
    }

    /// Back to ready. An active record without attempts is discarded.
    pub fn reset(&mut self) {
        self.abandon_active();

        self.phase = Phase::Ready;
        self.items.clear();
        self.chunked.clear();
        self.input.clear();
        self.result = None;
        self.timer_remaining = 0;
        self.elapsed.reset();
        self.config = self.defaults;
    }

    /// Empty the whole history. The high score is kept.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.current_game_id = None;
        log::info!("{} history cleared", self.kind.kind());
    }

    pub fn snapshot(&self) -> Snapshot {
        let round = (self.phase != Phase::Ready).then(|| RoundSnapshot {
            phase: self.phase,
            items: self.items.clone(),
            chunked: self.chunked.clone(),
            input: self.input.clone(),
            timer_remaining: self.timer_remaining,
            elapsed: self.elapsed,
            result: self.result.clone(),
        });

        Snapshot {
            history: self.history.to_persisted(),
            current_game_id: self.current_game_id,
            high_score: self.high_score.clone(),
            round,
        }
    }

    /// Load persisted state, migrating legacy history entries.
    ///
    /// The active record pointer survives only if its record survived migration.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.history = History::from_persisted(snapshot.history, self.clock.now());
        self.current_game_id = snapshot
            .current_game_id
            .filter(|&id| self.history.contains(id));
        self.high_score = snapshot.high_score;

        let round = snapshot.round.unwrap_or_default();
        self.phase = round.phase;
        self.items = round.items;
        self.chunked = round.chunked;
        self.input = round.input;
        self.timer_remaining = round.timer_remaining;
        self.elapsed = round.elapsed;
        self.result = round.result;
    }

    fn abandon_active(&mut self) {
        if let Some(id) = self.current_game_id.take() {
            if self.history.prune_empty(id) {
                log::debug!("discarded abandoned round {id}");
            }
        }
    }

    fn new_attempt(&mut self, provided: &[Item], score: Score, now: DateTime<Utc>) -> Attempt {
        Attempt {
            id: self.history.issue_id(now),
            date: now,
            provided: provided.to_vec(),
            correct: score.correct,
            total: score.total,
            percent: score.percent,
            memorize_elapsed_ms: self.elapsed.memorize_ms,
            guess_elapsed_ms: self.elapsed.guess_ms,
        }
    }

    fn fallback_record(&mut self, now: DateTime<Utc>) -> GameRecord {
        let id = self.history.issue_id(now);
        GameRecord::new(
            id,
            now,
            self.items.clone(),
            self.config.item_count,
            self.config.memorize_seconds,
        )
    }
}
